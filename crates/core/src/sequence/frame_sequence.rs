//! A single trajectory viewed as a sequence of frames.

use std::path::Path;

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::sequence::{normalize_index, Cursor, FrameSource, SequenceOptions};
use crate::trajectory::{open_trajectory, TrajectoryReader};

/// Atom subset frames are reported through.
#[derive(Debug, Clone)]
struct Subset {
    selection: String,
    /// Position in the model of each subset atom.
    positions: Vec<usize>,
    view: AtomicGroup,
}

/// A trajectory, the model its frames are read into, and the list of
/// physical frames it visits.
///
/// Reading logical frame `k` loads physical frame `frame_list()[k]` into the
/// model. With a subset configured, the frame handed out is the subset view,
/// refreshed from the model after every read.
pub struct FrameSequence {
    reader: Box<dyn TrajectoryReader>,
    model: AtomicGroup,
    subset: Option<Subset>,
    frames: Vec<usize>,
    cursor: Cursor,
}

impl FrameSequence {
    /// Open a trajectory file for `model`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        model: AtomicGroup,
        options: &SequenceOptions,
    ) -> TrajResult<Self> {
        let reader = open_trajectory(path, &model)?;
        Self::new(reader, model, options)
    }

    pub fn new(
        reader: Box<dyn TrajectoryReader>,
        model: AtomicGroup,
        options: &SequenceOptions,
    ) -> TrajResult<Self> {
        if reader.n_atoms() != model.len() {
            return Err(TrajError::Mismatch(format!(
                "trajectory has {} atoms but the model has {}",
                reader.n_atoms(),
                model.len()
            )));
        }
        let frames = options.frame_selection()?.resolve(reader.n_frames());
        log::debug!(
            "frame sequence visits {} of {} frames",
            frames.len(),
            reader.n_frames()
        );

        let mut sequence = Self {
            reader,
            model,
            subset: None,
            frames,
            cursor: Cursor::default(),
        };
        if let Some(selection) = &options.subset {
            sequence.set_subset(selection)?;
        }
        Ok(sequence)
    }

    /// Physical frame index of each logical frame.
    pub fn frame_list(&self) -> &[usize] {
        &self.frames
    }

    pub fn reader(&self) -> &dyn TrajectoryReader {
        self.reader.as_ref()
    }

    /// Physical frames in the underlying trajectory.
    pub fn n_physical_frames(&self) -> usize {
        self.reader.n_frames()
    }

    /// The full model, holding the coordinates of the last frame read.
    pub fn model(&self) -> &AtomicGroup {
        &self.model
    }

    pub fn subset_selection(&self) -> Option<&str> {
        self.subset.as_ref().map(|s| s.selection.as_str())
    }

    /// Report whole-model frames again.
    pub fn clear_subset(&mut self) {
        self.subset = None;
    }

    /// Physical index of the frame most recently produced by iteration.
    pub fn current_physical_index(&self) -> Option<usize> {
        self.cursor
            .last()
            .and_then(|k| self.frames.get(k).copied())
    }

    fn view(&self) -> &AtomicGroup {
        match &self.subset {
            Some(subset) => &subset.view,
            None => &self.model,
        }
    }
}

impl FrameSource for FrameSequence {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn read_at(&mut self, index: isize) -> TrajResult<&AtomicGroup> {
        let k = normalize_index(index, self.frames.len())?;
        self.reader.read_frame(self.frames[k], &mut self.model)?;
        if let Some(subset) = &mut self.subset {
            subset.view.gather_from(&self.model, &subset.positions)?;
            return Ok(&subset.view);
        }
        Ok(&self.model)
    }

    fn set_subset(&mut self, selection: &str) -> TrajResult<()> {
        let positions = self.model.select_positions(selection)?;
        let view = self.model.subgroup(&positions)?;
        self.subset = Some(Subset {
            selection: selection.to_string(),
            positions,
            view,
        });
        Ok(())
    }

    fn current_frame(&self) -> TrajResult<&AtomicGroup> {
        Ok(self.view())
    }

    fn frame_atoms(&self) -> usize {
        self.view().len()
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn current_index(&self) -> Option<usize> {
        self.cursor.last()
    }

    fn next_frame(&mut self) -> Option<TrajResult<&AtomicGroup>> {
        let k = self.cursor.advance(self.frames.len())?;
        Some(self.read_at(k as isize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::tests::small_model;
    use crate::sequence::tests::{scalar, scalar_sequence};
    use crate::sequence::FrameSlice;
    use crate::trajectory::{DcdWriter, MemoryTrajectory};

    fn values(seq: &mut FrameSequence) -> Vec<f64> {
        seq.frames().map(|f| scalar(&f.unwrap())).collect()
    }

    #[test]
    fn stride_and_skip() {
        let data = [10.0, 20.0, 30.0, 40.0, 50.0];
        let mut all = scalar_sequence(&data, &SequenceOptions::default());
        assert_eq!(values(&mut all), data.to_vec());

        let opts = SequenceOptions::default().skip(1).stride(2);
        let mut seq = scalar_sequence(&data, &opts);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frame_list(), &[1, 3]);
        assert_eq!(values(&mut seq), vec![20.0, 40.0]);

        let past_end = scalar_sequence(&data, &SequenceOptions::default().skip(9));
        assert!(past_end.is_empty());
    }

    #[test]
    fn explicit_frame_list() {
        let opts = SequenceOptions::default().frames([2, 0, 2]);
        let mut seq = scalar_sequence(&[10.0, 20.0, 30.0], &opts);
        assert_eq!(values(&mut seq), vec![30.0, 10.0, 30.0]);

        let opts = SequenceOptions::default().frames([0, 7]);
        let mut seq = scalar_sequence(&[10.0, 20.0, 30.0], &opts);
        assert_eq!(seq.len(), 2);
        assert!(matches!(
            seq.read_at(1),
            Err(TrajError::OutOfRange { index: 7, len: 3 })
        ));
    }

    #[test]
    fn random_access_and_negative_indices() {
        let mut seq = scalar_sequence(&[10.0, 20.0, 30.0], &SequenceOptions::default());
        assert_eq!(scalar(seq.read_at(-1).unwrap()), 30.0);
        assert_eq!(scalar(seq.read_at(0).unwrap()), 10.0);
        // Repeated reads of one index produce the same frame.
        let a = seq.read_copy(1).unwrap();
        let b = seq.read_copy(1).unwrap();
        assert_eq!(a, b);
        assert!(matches!(
            seq.read_at(3),
            Err(TrajError::OutOfRange { index: 3, len: 3 })
        ));
        assert!(seq.read_at(-4).is_err());
    }

    #[test]
    fn slices_are_independent_copies() {
        let mut seq = scalar_sequence(&[10.0, 20.0, 30.0, 40.0], &SequenceOptions::default());
        let mut copies = seq.read_slice(FrameSlice::from(1..3)).unwrap();
        assert_eq!(copies.iter().map(scalar).collect::<Vec<_>>(), vec![20.0, 30.0]);
        copies[0].coords_mut()[0][0] = -1.0;
        assert_eq!(scalar(&copies[1]), 30.0);
        assert_eq!(scalar(seq.read_at(1).unwrap()), 20.0);
        assert!(seq.read_slice(FrameSlice::from(0..9)).is_err());
    }

    #[test]
    fn iteration_tracks_position() {
        let mut seq = scalar_sequence(&[10.0, 20.0, 30.0], &SequenceOptions::default().frames([2, 1]));
        assert_eq!(seq.current_index(), None);
        assert_eq!(scalar(seq.next_frame().unwrap().unwrap()), 30.0);
        assert_eq!(seq.current_index(), Some(0));
        assert_eq!(seq.current_physical_index(), Some(2));
        assert_eq!(scalar(seq.current_frame().unwrap()), 30.0);
        seq.next_frame().unwrap().unwrap();
        assert!(seq.next_frame().is_none());
        seq.reset();
        assert_eq!(scalar(seq.next_frame().unwrap().unwrap()), 30.0);
    }

    #[test]
    fn subset_view() {
        let model = small_model();
        let mut moved = model.clone();
        moved.coords_mut()[1] = [9.0, 9.0, 9.0];
        let reader = MemoryTrajectory::from_groups([&model, &moved]).unwrap();
        let opts = SequenceOptions::default().subset("name CA");
        let mut seq = FrameSequence::new(Box::new(reader), model.clone(), &opts).unwrap();

        assert_eq!(seq.frame_atoms(), 2);
        assert_eq!(seq.subset_selection(), Some("name CA"));
        let frame = seq.read_at(1).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.coords()[0], [9.0, 9.0, 9.0]);
        assert_eq!(frame.atoms()[1].resname, "GLY");
        // The full model still tracks every atom.
        assert_eq!(seq.model().coords()[1], [9.0, 9.0, 9.0]);

        seq.clear_subset();
        assert_eq!(seq.read_at(0).unwrap().len(), model.len());
        assert!(matches!(
            seq.set_subset("name =="),
            Err(TrajError::InvalidSelection(_))
        ));
    }

    #[test]
    fn model_must_match_trajectory() {
        let reader = MemoryTrajectory::new(vec![vec![[0.0; 3]; 2]]).unwrap();
        let err = FrameSequence::new(Box::new(reader), small_model(), &SequenceOptions::default());
        assert!(matches!(err, Err(TrajError::Mismatch(_))));

        let reader = MemoryTrajectory::new(vec![vec![[0.0; 3]; 6]]).unwrap();
        let opts = SequenceOptions::default().stride(0);
        let err = FrameSequence::new(Box::new(reader), small_model(), &opts);
        assert!(matches!(err, Err(TrajError::InvalidOptions(_))));
    }

    #[test]
    fn opens_dcd_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.dcd");
        let model = small_model();
        let mut writer = DcdWriter::create(&path, model.len(), false).unwrap();
        for step in 0..4 {
            let mut frame = model.clone();
            frame.coords_mut()[0][0] = step as f64;
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap();

        let opts = SequenceOptions::default().stride(3);
        let mut seq = FrameSequence::open(&path, model, &opts).unwrap();
        assert_eq!(seq.n_physical_frames(), 4);
        assert_eq!(seq.frame_list(), &[0, 3]);
        let last = seq.read_at(-1).unwrap();
        assert!((last.coords()[0][0] - 3.0).abs() < 1e-5);
    }
}
