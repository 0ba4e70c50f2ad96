//! Syntax tree of a parsed selection expression.

#[derive(Debug, Clone)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    StringMatch { field: StringField, pattern: StringPattern },
    NumericCmp { field: NumericField, op: CmpOp, value: f64 },
    RangeSelect { field: RangeField, ranges: Vec<RangeSpec> },
    Within { distance: f64, inner: Box<Expr> },
    Keyword(Keyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringField {
    Name,
    Resname,
    Segid,
}

/// Literal or glob (`*`, `?`) pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPattern {
    Exact(String),
    Glob(String),
}

impl StringPattern {
    pub fn parse(text: &str) -> Self {
        if text.contains('*') || text.contains('?') {
            StringPattern::Glob(text.to_string())
        } else {
            StringPattern::Exact(text.to_string())
        }
    }

    pub fn matches(&self, s: &str) -> bool {
        match self {
            StringPattern::Exact(pat) => s == pat,
            StringPattern::Glob(pat) => glob_match(pat.as_bytes(), s.as_bytes()),
        }
    }
}

/// Backtracking glob match over bytes; `*` matches any run, `?` one byte.
fn glob_match(pat: &[u8], txt: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < txt.len() {
        match pat.get(p) {
            Some(b'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == txt[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }
    pat[p..].iter().all(|&c| c == b'*')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Mass,
    Charge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => (lhs - rhs).abs() < 1e-9,
            CmpOp::Ne => (lhs - rhs).abs() >= 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeField {
    /// Residue number as stored on the atom.
    Resid,
    /// 0-based position within the group being selected from.
    Index,
    /// Atom serial number.
    Id,
}

/// Inclusive integer range or single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    Single(i64),
    Range(i64, i64),
}

impl RangeSpec {
    pub fn contains(&self, value: i64) -> bool {
        match *self {
            RangeSpec::Single(v) => v == value,
            RangeSpec::Range(lo, hi) => (lo..=hi).contains(&value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Protein,
    Water,
    Backbone,
    Sidechain,
    Hydrogen,
    All,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob() {
        assert!(StringPattern::parse("CA").matches("CA"));
        assert!(!StringPattern::parse("CA").matches("CB"));
        assert!(StringPattern::parse("C*").matches("C"));
        assert!(StringPattern::parse("C*").matches("CG2"));
        assert!(!StringPattern::parse("C*").matches("NZ"));
        assert!(StringPattern::parse("C?").matches("CA"));
        assert!(!StringPattern::parse("C?").matches("CAB"));
        assert!(StringPattern::parse("*G*").matches("CG2"));
        assert!(StringPattern::parse("H*1").matches("HB21"));
        assert!(!StringPattern::parse("H*1").matches("HB12"));
    }

    #[test]
    fn test_range_spec() {
        assert!(RangeSpec::Single(5).contains(5));
        assert!(!RangeSpec::Single(5).contains(6));
        assert!(RangeSpec::Range(1, 10).contains(10));
        assert!(!RangeSpec::Range(1, 10).contains(11));
    }
}
