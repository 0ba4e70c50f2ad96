//! AMBER file format parsers.
//!
//! - PRMTOP: topology files (atom identity records only)
//! - INPCRD/RST7: coordinate/restart files

pub mod inpcrd;
pub mod prmtop;
