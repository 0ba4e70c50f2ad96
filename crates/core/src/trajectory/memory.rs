//! Trajectory held entirely in memory.

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::trajectory::TrajectoryReader;

/// Frames of coordinates (nm) kept in a `Vec`, with optional boxes.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrajectory {
    n_atoms: usize,
    frames: Vec<Vec<[f64; 3]>>,
    boxes: Vec<Option<[f64; 6]>>,
}

impl MemoryTrajectory {
    /// All frames must have the same number of atoms.
    pub fn new(frames: Vec<Vec<[f64; 3]>>) -> TrajResult<Self> {
        let n_atoms = frames.first().map_or(0, Vec::len);
        if let Some(k) = frames.iter().position(|f| f.len() != n_atoms) {
            return Err(TrajError::Mismatch(format!(
                "frame {} has {} atoms, frame 0 has {}",
                k,
                frames[k].len(),
                n_atoms
            )));
        }
        let boxes = vec![None; frames.len()];
        Ok(Self {
            n_atoms,
            frames,
            boxes,
        })
    }

    /// Same box on every frame.
    pub fn with_box(mut self, periodic_box: [f64; 6]) -> Self {
        self.boxes.iter_mut().for_each(|b| *b = Some(periodic_box));
        self
    }

    /// Snapshot the coordinates of a series of groups.
    pub fn from_groups<'a, I>(groups: I) -> TrajResult<Self>
    where
        I: IntoIterator<Item = &'a AtomicGroup>,
    {
        let mut frames = Vec::new();
        let mut boxes = Vec::new();
        for g in groups {
            frames.push(g.coords().to_vec());
            boxes.push(g.periodic_box());
        }
        let mut traj = Self::new(frames)?;
        traj.boxes = boxes;
        Ok(traj)
    }
}

impl TrajectoryReader for MemoryTrajectory {
    fn n_frames(&self) -> usize {
        self.frames.len()
    }

    fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    fn read_frame(&mut self, index: usize, frame: &mut AtomicGroup) -> TrajResult<()> {
        let coords = self
            .frames
            .get(index)
            .ok_or_else(|| TrajError::out_of_range(index, self.frames.len()))?;
        frame.set_coords(coords)?;
        frame.set_periodic_box(self.boxes[index]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::tests::small_model;

    #[test]
    fn rejects_ragged_frames() {
        let err = MemoryTrajectory::new(vec![vec![[0.0; 3]; 2], vec![[0.0; 3]; 3]]).unwrap_err();
        assert!(matches!(err, TrajError::Mismatch(_)));
    }

    #[test]
    fn reads_snapshots() {
        let model = small_model();
        let mut moved = model.clone();
        moved.coords_mut()[0] = [4.0, 4.0, 4.0];
        moved.set_periodic_box(Some([5.0, 5.0, 5.0, 90.0, 90.0, 90.0]));
        let mut traj = MemoryTrajectory::from_groups([&model, &moved]).unwrap();
        assert_eq!(traj.n_frames(), 2);
        assert_eq!(traj.n_atoms(), model.len());

        let mut frame = model.clone();
        traj.read_frame(1, &mut frame).unwrap();
        assert_eq!(frame.coords()[0], [4.0, 4.0, 4.0]);
        assert!(frame.periodic_box().is_some());
        traj.read_frame(0, &mut frame).unwrap();
        assert_eq!(frame, model);
        assert!(matches!(
            traj.read_frame(2, &mut frame),
            Err(TrajError::OutOfRange { index: 2, len: 2 })
        ));
    }
}
