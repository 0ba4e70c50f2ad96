//! Recursive descent parser for the atom selection language.

use crate::selection::ast::*;
use crate::selection::error::SelectionError;
use crate::selection::token::*;

/// Parser state wrapping a token stream.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    input: String,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>, input: String) -> Self {
        Self {
            tokens,
            pos: 0,
            input,
        }
    }

    pub fn parse(mut self) -> Result<Expr, SelectionError> {
        if self.at_eof() {
            return Err(self.error_here("Empty selection"));
        }
        let expr = self.parse_or()?;
        if !self.at_eof() {
            return Err(self.error_here(format!("Unexpected token {:?}", self.current().token)));
        }
        Ok(expr)
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        self.current().token == Token::Eof
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn error_here(&self, msg: impl Into<String>) -> SelectionError {
        let (start, end) = self.current().span;
        SelectionError::new(msg)
            .with_span(start, end)
            .with_input(self.input.clone())
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SelectionError> {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!(
                "Expected {:?}, found {:?}",
                expected,
                self.current().token
            )))
        }
    }

    // or_expr = and_expr ("or" and_expr)*
    fn parse_or(&mut self) -> Result<Expr, SelectionError> {
        let mut left = self.parse_and()?;
        while self.current().token == Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and_expr = not_expr ("and" not_expr)*
    fn parse_and(&mut self) -> Result<Expr, SelectionError> {
        let mut left = self.parse_not()?;
        while self.current().token == Token::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // not_expr = "not" not_expr | atom_expr
    fn parse_not(&mut self) -> Result<Expr, SelectionError> {
        if self.current().token == Token::Not {
            self.advance();
            let inner = self.parse_not()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.parse_atom()
        }
    }

    // atom_expr = "(" selection ")" | within_expr | field_expr | keyword
    fn parse_atom(&mut self) -> Result<Expr, SelectionError> {
        let keyword = match &self.current().token {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::Within => return self.parse_within(),
            Token::Name => return self.parse_string_kw(StringField::Name),
            Token::Resname => return self.parse_string_kw(StringField::Resname),
            Token::Segid => return self.parse_string_kw(StringField::Segid),
            Token::Mass => return self.parse_numeric_kw(NumericField::Mass),
            Token::Charge => return self.parse_numeric_kw(NumericField::Charge),
            Token::Resid => return self.parse_range_kw(RangeField::Resid),
            Token::Index => return self.parse_range_kw(RangeField::Index),
            Token::Id => return self.parse_range_kw(RangeField::Id),
            Token::Protein => Keyword::Protein,
            Token::Water => Keyword::Water,
            Token::Backbone => Keyword::Backbone,
            Token::Sidechain => Keyword::Sidechain,
            Token::Hydrogen => Keyword::Hydrogen,
            Token::All => Keyword::All,
            Token::None_ => Keyword::None,
            other => {
                return Err(self.error_here(format!(
                    "Expected selection expression, found {:?}",
                    other
                )))
            }
        };
        self.advance();
        Ok(Expr::Keyword(keyword))
    }

    // within NUMBER of atom_expr
    fn parse_within(&mut self) -> Result<Expr, SelectionError> {
        self.advance();
        let distance = self
            .take_number()
            .ok_or_else(|| self.error_here("Expected distance after 'within'"))?;
        if distance < 0.0 {
            return Err(self.error_here("Distance must be non-negative"));
        }
        self.expect(&Token::Of)?;
        let inner = self.parse_atom()?;
        Ok(Expr::Within {
            distance,
            inner: Box::new(inner),
        })
    }

    // string_kw ["==" | "!="] string_arg
    fn parse_string_kw(&mut self, field: StringField) -> Result<Expr, SelectionError> {
        self.advance();
        let negate = match self.current().token {
            Token::Eq => {
                self.advance();
                false
            }
            Token::Ne => {
                self.advance();
                true
            }
            _ => false,
        };
        let pattern = self.parse_string_arg()?;
        let expr = Expr::StringMatch { field, pattern };
        Ok(if negate { Expr::Not(Box::new(expr)) } else { expr })
    }

    fn parse_string_arg(&mut self) -> Result<StringPattern, SelectionError> {
        let pattern = match &self.current().token {
            Token::Ident(s) => StringPattern::parse(s),
            // Quoted text is matched literally, wildcards included.
            Token::Quoted(s) => StringPattern::Exact(s.clone()),
            Token::Integer(i) => StringPattern::Exact(i.to_string()),
            _ => return Err(self.error_here("Expected identifier after keyword")),
        };
        self.advance();
        Ok(pattern)
    }

    // numeric_kw cmp_op ["-"] NUMBER
    fn parse_numeric_kw(&mut self, field: NumericField) -> Result<Expr, SelectionError> {
        self.advance();
        let op = self.parse_cmp_op()?;

        let negative = self.current().token == Token::Dash;
        if negative {
            self.advance();
        }
        let value = self
            .take_number()
            .ok_or_else(|| self.error_here("Expected number after comparison operator"))?;
        let value = if negative { -value } else { value };
        Ok(Expr::NumericCmp { field, op, value })
    }

    fn parse_cmp_op(&mut self) -> Result<CmpOp, SelectionError> {
        let op = match self.current().token {
            Token::Gt => CmpOp::Gt,
            Token::Lt => CmpOp::Lt,
            Token::Ge => CmpOp::Ge,
            Token::Le => CmpOp::Le,
            Token::Eq => CmpOp::Eq,
            Token::Ne => CmpOp::Ne,
            _ => {
                return Err(
                    self.error_here("Expected comparison operator (>, <, >=, <=, ==, !=)")
                )
            }
        };
        self.advance();
        Ok(op)
    }

    fn take_number(&mut self) -> Option<f64> {
        let v = match self.current().token {
            Token::Float(f) => f,
            Token::Integer(i) => i as f64,
            _ => return None,
        };
        self.advance();
        Some(v)
    }

    // range_kw ["=="] range_item ("," range_item)*
    fn parse_range_kw(&mut self, field: RangeField) -> Result<Expr, SelectionError> {
        self.advance();
        if self.current().token == Token::Eq {
            self.advance();
        }
        let mut ranges = vec![self.parse_range_item()?];
        while self.current().token == Token::Comma {
            self.advance();
            ranges.push(self.parse_range_item()?);
        }
        Ok(Expr::RangeSelect { field, ranges })
    }

    // range_item = INT ("-" | ":") INT | INT
    fn parse_range_item(&mut self) -> Result<RangeSpec, SelectionError> {
        let first = self.expect_int()?;
        if matches!(self.current().token, Token::Dash | Token::Colon) {
            self.advance();
            let second = self.expect_int()?;
            if second < first {
                return Err(self.error_here(format!("Empty range {}-{}", first, second)));
            }
            Ok(RangeSpec::Range(first, second))
        } else {
            Ok(RangeSpec::Single(first))
        }
    }

    fn expect_int(&mut self) -> Result<i64, SelectionError> {
        match self.current().token {
            Token::Integer(i) => {
                self.advance();
                Ok(i)
            }
            _ => Err(self.error_here("Expected integer")),
        }
    }
}

/// Parse a selection expression string into an AST.
pub fn parse_selection(input: &str) -> Result<Expr, SelectionError> {
    let mut lexer = Lexer::new(input);
    let tokens = lexer.tokenize()?;
    let parser = Parser::new(tokens, input.to_string());
    parser.parse()
}
