//! Trajectory storage backends.
//!
//! - DCD: CHARMM/NAMD/LAMMPS binary trajectory format (read and write)
//! - in-memory frames, for synthetic data and tests

pub mod dcd;
pub mod memory;
pub mod writer;

use std::path::Path;

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};

pub use dcd::DcdReader;
pub use memory::MemoryTrajectory;
pub use writer::DcdWriter;

/// Random access to the frames of one trajectory file.
pub trait TrajectoryReader: Send {
    fn n_frames(&self) -> usize;

    fn n_atoms(&self) -> usize;

    /// Overwrite the coordinates (and box) of `frame` with frame `index`.
    ///
    /// Fails with `OutOfRange` past the last frame and with `Mismatch` when
    /// `frame` does not have [`n_atoms`](Self::n_atoms) atoms.
    fn read_frame(&mut self, index: usize, frame: &mut AtomicGroup) -> TrajResult<()>;
}

/// Open a trajectory file, choosing the format from its extension, and
/// check that it matches `model`.
pub fn open_trajectory<P: AsRef<Path>>(
    path: P,
    model: &AtomicGroup,
) -> TrajResult<Box<dyn TrajectoryReader>> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let reader: Box<dyn TrajectoryReader> = match ext.as_str() {
        "dcd" => Box::new(DcdReader::open(path)?),
        _ => {
            return Err(TrajError::Unsupported(format!(
                "trajectory format of {}",
                path.display()
            )))
        }
    };
    if reader.n_atoms() != model.len() {
        return Err(TrajError::Mismatch(format!(
            "{} has {} atoms but the model has {}",
            path.display(),
            reader.n_atoms(),
            model.len()
        )));
    }
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::tests::small_model;

    #[test]
    fn open_checks_format_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let model = small_model();

        let xtc = dir.path().join("traj.xtc");
        std::fs::write(&xtc, b"").unwrap();
        assert!(matches!(
            open_trajectory(&xtc, &model),
            Err(TrajError::Unsupported(_))
        ));

        let dcd = dir.path().join("traj.DCD");
        let mut writer = DcdWriter::create(&dcd, 2, false).unwrap();
        writer.finish().unwrap();
        assert!(matches!(
            open_trajectory(&dcd, &model),
            Err(TrajError::Mismatch(_))
        ));

        let mut writer = DcdWriter::create(&dcd, model.len(), false).unwrap();
        writer.write_frame(&model).unwrap();
        writer.finish().unwrap();
        let reader = open_trajectory(&dcd, &model).unwrap();
        assert_eq!(reader.n_frames(), 1);
    }
}
