//! Core library for trajseq.
//!
//! Pure Rust implementations with no Python dependencies.
//! Provides structure and AMBER file readers, DCD trajectory I/O, an atom
//! selection language, rigid-body alignment, and lazily read, composable
//! frame sequences over one or many trajectories.

pub mod amber;
pub mod atoms;
pub mod error;
pub mod kabsch;
pub mod selection;
pub mod sequence;
pub mod structure;
pub mod trajectory;
pub mod transform;
pub mod util;

pub use atoms::{Atom, AtomicGroup};
pub use error::{TrajError, TrajResult};
pub use kabsch::{iterative_align, AlignOptions, AlignmentResult};
pub use sequence::{
    AlignedVirtualFrameSequence, AlignmentConfig, FrameSelection, FrameSequence, FrameSlice,
    FrameSource, SequenceOptions, VirtualFrameSequence,
};
pub use structure::{create_system, create_system_with_coordinates};
pub use transform::RigidTransform;
