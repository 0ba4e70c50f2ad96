//! Why a selection expression was rejected, and where.

use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionError {
    pub message: String,
    /// Byte range of the offending text within `input`.
    pub span: Option<Range<usize>>,
    pub input: Option<String>,
}

impl SelectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            input: None,
        }
    }

    pub fn with_span(self, start: usize, end: usize) -> Self {
        Self {
            span: Some(start..end),
            ..self
        }
    }

    pub fn with_input(self, input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            ..self
        }
    }

    /// The input followed by a line of carets under the span.
    fn excerpt(&self) -> Option<String> {
        let (span, input) = (self.span.as_ref()?, self.input.as_ref()?);
        let width = span.len().max(1);
        Some(format!(
            "{}\n{:>pad$}",
            input,
            "^".repeat(width),
            pad = span.start + width
        ))
    }
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selection: {}", self.message)?;
        if let Some(excerpt) = self.excerpt() {
            for line in excerpt.lines() {
                write!(f, "\n  {}", line)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for SelectionError {}
