//! Lexer for selection expressions.

use crate::selection::error::SelectionError;

/// A token together with its byte span in the input.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: (usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // string fields
    Name,
    Resname,
    Segid,
    // range fields
    Resid,
    Index,
    Id,
    // numeric fields
    Mass,
    Charge,
    // operators
    And,
    Or,
    Not,
    Within,
    Of,
    // keywords
    Protein,
    Water,
    Backbone,
    Sidechain,
    Hydrogen,
    All,
    None_,
    // literals
    Ident(String),
    Quoted(String),
    Integer(i64),
    Float(f64),
    // punctuation
    LParen,
    RParen,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    Comma,
    Dash,
    Colon,
    Eof,
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn err(&self, msg: impl Into<String>, start: usize) -> SelectionError {
        SelectionError::new(msg)
            .with_span(start, self.pos)
            .with_input(self.input)
    }

    /// Consume `=` after a one-byte operator, choosing between the two forms.
    fn with_eq(&mut self, plain: Option<Token>, with_eq: Token, start: usize) -> Result<Token, SelectionError> {
        self.pos += 1;
        if self.peek() == Some(b'=') {
            self.pos += 1;
            return Ok(with_eq);
        }
        plain.ok_or_else(|| self.err(format!("Expected {:?} operator", with_eq), start))
    }

    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, SelectionError> {
        let mut tokens = Vec::new();
        loop {
            while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            let start = self.pos;
            let Some(ch) = self.peek() else {
                tokens.push(SpannedToken {
                    token: Token::Eof,
                    span: (start, start),
                });
                break;
            };
            let token = match ch {
                b'(' | b')' | b',' | b':' | b'-' => {
                    self.pos += 1;
                    match ch {
                        b'(' => Token::LParen,
                        b')' => Token::RParen,
                        b',' => Token::Comma,
                        b':' => Token::Colon,
                        _ => Token::Dash,
                    }
                }
                b'>' => self.with_eq(Some(Token::Gt), Token::Ge, start)?,
                b'<' => self.with_eq(Some(Token::Lt), Token::Le, start)?,
                b'=' => self.with_eq(None, Token::Eq, start)?,
                b'!' => self.with_eq(None, Token::Ne, start)?,
                b'"' | b'\'' => self.lex_quoted(ch)?,
                b'0'..=b'9' | b'.' => self.lex_number()?,
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'*' | b'?' => self.lex_word(),
                _ => {
                    self.pos += 1;
                    return Err(self.err(format!("Unexpected character '{}'", ch as char), start));
                }
            };
            tokens.push(SpannedToken {
                token,
                span: (start, self.pos),
            });
        }
        Ok(tokens)
    }

    fn lex_quoted(&mut self, quote: u8) -> Result<Token, SelectionError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            if b == quote {
                let text = &self.input[start + 1..self.pos];
                self.pos += 1;
                return Ok(Token::Quoted(text.to_string()));
            }
            self.pos += 1;
        }
        Err(self.err("Unterminated quoted string", start))
    }

    fn lex_number(&mut self) -> Result<Token, SelectionError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_float = self.peek() == Some(b'.');
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let s = &self.input[start..self.pos];
        if is_float {
            s.parse()
                .map(Token::Float)
                .map_err(|_| self.err(format!("Invalid float '{}'", s), start))
        } else {
            s.parse()
                .map(Token::Integer)
                .map_err(|_| self.err(format!("Invalid integer '{}'", s), start))
        }
    }

    fn lex_word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'*' | b'?' | b'\''))
        {
            self.pos += 1;
        }
        let word = &self.input[start..self.pos];
        match word.to_ascii_lowercase().as_str() {
            "name" => Token::Name,
            "resname" => Token::Resname,
            "segid" | "segname" => Token::Segid,
            "resid" => Token::Resid,
            "index" => Token::Index,
            "id" => Token::Id,
            "mass" => Token::Mass,
            "charge" => Token::Charge,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "within" => Token::Within,
            "of" => Token::Of,
            "protein" => Token::Protein,
            "water" => Token::Water,
            "backbone" => Token::Backbone,
            "sidechain" => Token::Sidechain,
            "hydrogen" => Token::Hydrogen,
            "all" => Token::All,
            "none" => Token::None_,
            _ => Token::Ident(word.to_string()),
        }
    }
}
