//! Error type shared by every module of the crate.

use thiserror::Error;

use crate::selection::SelectionError;

#[derive(Debug, Error)]
pub enum TrajError {
    #[error("index {index} out of range for sequence of length {len}")]
    OutOfRange { index: isize, len: usize },
    #[error("inconsistent composition: {0}")]
    InconsistentComposition(String),
    #[error(transparent)]
    InvalidSelection(#[from] SelectionError),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("mismatch: {0}")]
    Mismatch(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("alignment failed: {0}")]
    Alignment(String),
}

pub type TrajResult<T> = Result<T, TrajError>;

impl TrajError {
    pub(crate) fn out_of_range(index: impl TryInto<isize>, len: usize) -> Self {
        TrajError::OutOfRange {
            index: index.try_into().unwrap_or(isize::MAX),
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message() {
        let err = TrajError::out_of_range(7usize, 3);
        assert_eq!(
            err.to_string(),
            "index 7 out of range for sequence of length 3"
        );
    }

    #[test]
    fn selection_errors_convert() {
        let err: TrajError = SelectionError::new("bad token").into();
        assert!(matches!(err, TrajError::InvalidSelection(_)));
        assert!(err.to_string().contains("bad token"));
    }
}
