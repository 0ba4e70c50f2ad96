//! Atom selection language.
//!
//! Selections pick atoms out of an [`AtomicGroup`](crate::atoms::AtomicGroup)
//! by identity, numeric properties, residue ranges or proximity:
//!
//! ```ignore
//! use trajseq_core::selection::select;
//!
//! let ca = select(&model, "name == \"CA\" and resid 1-50")?;
//! let shell = select(&model, "water and within 0.5 of protein")?;
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod keywords;
pub mod parser;
pub mod token;

pub use error::SelectionError;
pub use eval::SelectionContext;
pub use parser::parse_selection;

use crate::atoms::AtomicGroup;

/// Positions (sorted) of the atoms in `group` matching `expression`.
pub fn select(group: &AtomicGroup, expression: &str) -> Result<Vec<usize>, SelectionError> {
    SelectionContext::new(group).eval_str(expression)
}
