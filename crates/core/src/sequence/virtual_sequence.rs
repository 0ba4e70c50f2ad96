//! Several frame sources concatenated into one sequence.

use std::cell::OnceCell;

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::sequence::{normalize_index, Cursor, FrameSelection, FrameSource};

/// Where a logical frame of a [`VirtualFrameSequence`] lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePointer {
    /// Member the frame belongs to.
    pub member: usize,
    /// Logical index of the frame inside that member.
    pub local: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Frame(FramePointer),
    /// Requested combined index with no frame behind it.
    Missing(usize),
}

#[derive(Debug, Default)]
struct FlatIndex {
    slots: Vec<Slot>,
    /// Frames across all members before filtering.
    total: usize,
}

/// Concatenation of frame sources, filtered by its own frame selection.
///
/// The combined frames of all members are numbered in member order; the
/// selection then picks which of those the sequence visits. The mapping is
/// built on first use and dropped whenever membership changes.
pub struct VirtualFrameSequence {
    members: Vec<Box<dyn FrameSource>>,
    selection: FrameSelection,
    flat: OnceCell<FlatIndex>,
    cursor: Cursor,
}

impl Default for VirtualFrameSequence {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            selection: FrameSelection::default(),
            flat: OnceCell::new(),
            cursor: Cursor::default(),
        }
    }
}

impl VirtualFrameSequence {
    /// Every frame of every member.
    pub fn new<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn FrameSource>>,
    {
        Self {
            members: members.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_selection<I>(members: I, selection: FrameSelection) -> TrajResult<Self>
    where
        I: IntoIterator<Item = Box<dyn FrameSource>>,
    {
        selection.validate()?;
        Ok(Self {
            selection,
            ..Self::new(members)
        })
    }

    pub fn selection(&self) -> &FrameSelection {
        &self.selection
    }

    pub fn members(&self) -> &[Box<dyn FrameSource>] {
        &self.members
    }

    pub fn n_members(&self) -> usize {
        self.members.len()
    }

    /// Add members at the end. Takes effect on the next access.
    pub fn append<I>(&mut self, members: I)
    where
        I: IntoIterator<Item = Box<dyn FrameSource>>,
    {
        let members: Vec<_> = members.into_iter().collect();
        self.members.extend(members);
        self.invalidate();
    }

    pub fn push<S: FrameSource + 'static>(&mut self, member: S) {
        self.members.push(Box::new(member));
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.flat.take();
        self.cursor.reset();
    }

    /// Frames across all members, before this sequence's own filtering.
    pub fn count_total_raw_frames(&self) -> usize {
        self.members.iter().map(|m| m.len()).sum()
    }

    /// Check that every member produces frames of the same size.
    pub fn verify_models(&self) -> TrajResult<()> {
        let Some(first) = self.members.first() else {
            return Ok(());
        };
        let n_atoms = first.frame_atoms();
        for (i, member) in self.members.iter().enumerate().skip(1) {
            if member.frame_atoms() != n_atoms {
                return Err(TrajError::InconsistentComposition(format!(
                    "member {} produces {} atoms per frame, member 0 produces {}",
                    i,
                    member.frame_atoms(),
                    n_atoms
                )));
            }
        }
        Ok(())
    }

    fn flat(&self) -> &FlatIndex {
        self.flat.get_or_init(|| self.build_flat())
    }

    fn build_flat(&self) -> FlatIndex {
        let mut combined = Vec::new();
        for (member, source) in self.members.iter().enumerate() {
            combined.extend((0..source.len()).map(|local| FramePointer { member, local }));
        }
        let slots: Vec<Slot> = self
            .selection
            .resolve(combined.len())
            .into_iter()
            .map(|i| combined.get(i).map_or(Slot::Missing(i), |&p| Slot::Frame(p)))
            .collect();

        let missing = slots.iter().filter(|s| matches!(s, Slot::Missing(_))).count();
        if missing > 0 {
            log::warn!(
                "{} requested frames lie beyond the {} frames available",
                missing,
                combined.len()
            );
        }
        log::debug!(
            "virtual sequence of {} members maps {} of {} frames",
            self.members.len(),
            slots.len(),
            combined.len()
        );
        FlatIndex {
            slots,
            total: combined.len(),
        }
    }

    fn pointer_at(&self, k: usize) -> TrajResult<FramePointer> {
        let flat = self.flat();
        match flat.slots.get(k) {
            Some(Slot::Frame(p)) => Ok(*p),
            Some(Slot::Missing(i)) => Err(TrajError::out_of_range(*i, flat.total)),
            None => Err(TrajError::out_of_range(k, flat.slots.len())),
        }
    }

    /// Member and local index of logical frame `index`.
    pub fn pointer(&self, index: isize) -> TrajResult<FramePointer> {
        let k = normalize_index(index, self.len())?;
        self.pointer_at(k)
    }
}

impl FrameSource for VirtualFrameSequence {
    fn len(&self) -> usize {
        self.flat().slots.len()
    }

    fn read_at(&mut self, index: isize) -> TrajResult<&AtomicGroup> {
        let p = self.pointer(index)?;
        self.members[p.member].read_at(p.local as isize)
    }

    /// Applied to every member; members already updated keep the new subset
    /// if a later one rejects the selection.
    fn set_subset(&mut self, selection: &str) -> TrajResult<()> {
        for member in self.members.iter_mut() {
            member.set_subset(selection)?;
        }
        Ok(())
    }

    /// Frame at the iteration position, clamped to the last valid frame.
    ///
    /// Random reads through `read_at` do not move the iteration position, so
    /// after one this may report a different member's frame than the one
    /// just read.
    fn current_frame(&self) -> TrajResult<&AtomicGroup> {
        let len = self.len();
        if len == 0 {
            return Err(TrajError::out_of_range(0usize, 0));
        }
        let k = self.cursor.last().unwrap_or(0).min(len - 1);
        let p = self.pointer_at(k)?;
        self.members[p.member].current_frame()
    }

    fn frame_atoms(&self) -> usize {
        self.members.first().map_or(0, |m| m.frame_atoms())
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn current_index(&self) -> Option<usize> {
        self.cursor.last()
    }

    fn next_frame(&mut self) -> Option<TrajResult<&AtomicGroup>> {
        let k = self.cursor.advance(self.len())?;
        Some(self.read_at(k as isize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::tests::{scalar, scalar_sequence};
    use crate::sequence::{FrameSequence, FrameSlice, SequenceOptions};

    fn member(values: &[f64]) -> Box<dyn FrameSource> {
        Box::new(scalar_sequence(values, &SequenceOptions::default()))
    }

    fn a_and_b() -> Vec<Box<dyn FrameSource>> {
        vec![member(&[10.0, 20.0, 30.0]), member(&[40.0, 50.0])]
    }

    fn values<S: FrameSource>(seq: &mut S) -> Vec<f64> {
        seq.frames().map(|f| scalar(&f.unwrap())).collect()
    }

    #[test]
    fn concatenates_members_in_order() {
        let mut seq = VirtualFrameSequence::new(a_and_b());
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.count_total_raw_frames(), 5);
        assert_eq!(values(&mut seq), vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(
            seq.pointer(3).unwrap(),
            FramePointer { member: 1, local: 0 }
        );
    }

    #[test]
    fn stride_applies_to_combined_frames() {
        let sel = FrameSelection::Stride { skip: 0, stride: 2 };
        let mut seq = VirtualFrameSequence::with_selection(a_and_b(), sel).unwrap();
        assert_eq!(values(&mut seq), vec![10.0, 30.0, 50.0]);

        let sel = FrameSelection::Stride { skip: 2, stride: 2 };
        let mut seq = VirtualFrameSequence::with_selection(a_and_b(), sel).unwrap();
        assert_eq!(values(&mut seq), vec![30.0, 50.0]);

        let sel = FrameSelection::Stride { skip: 0, stride: 0 };
        assert!(VirtualFrameSequence::with_selection(a_and_b(), sel).is_err());
    }

    #[test]
    fn explicit_list_is_honoured() {
        let sel = FrameSelection::Explicit(vec![4, 0, 9, 2]);
        let mut seq = VirtualFrameSequence::with_selection(a_and_b(), sel).unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(scalar(seq.read_at(0).unwrap()), 50.0);
        assert_eq!(scalar(seq.read_at(1).unwrap()), 10.0);
        assert!(matches!(
            seq.read_at(2),
            Err(TrajError::OutOfRange { index: 9, len: 5 })
        ));
        assert_eq!(scalar(seq.read_at(-1).unwrap()), 30.0);
    }

    #[test]
    fn member_filters_compose() {
        let strided = scalar_sequence(
            &[1.0, 2.0, 3.0, 4.0],
            &SequenceOptions::default().stride(2),
        );
        let mut seq = VirtualFrameSequence::new(vec![
            Box::new(strided) as Box<dyn FrameSource>,
            member(&[5.0]),
        ]);
        assert_eq!(values(&mut seq), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn append_refreshes_mapping() {
        let mut seq = VirtualFrameSequence::new(vec![member(&[10.0, 20.0, 30.0])]);
        assert_eq!(seq.len(), 3);
        seq.read_at(0).unwrap();
        seq.append(vec![member(&[40.0, 50.0])]);
        assert_eq!(seq.len(), 5);
        assert_eq!(scalar(seq.read_at(-1).unwrap()), 50.0);

        seq.push(scalar_sequence(&[60.0], &SequenceOptions::default()));
        assert_eq!(seq.n_members(), 3);
        assert_eq!(values(&mut seq).last(), Some(&60.0));
    }

    #[test]
    fn nested_sequences() {
        let inner = VirtualFrameSequence::new(a_and_b());
        let mut outer = VirtualFrameSequence::new(vec![
            Box::new(inner) as Box<dyn FrameSource>,
            member(&[60.0]),
        ]);
        assert_eq!(outer.len(), 6);
        assert_eq!(scalar(outer.read_at(4).unwrap()), 50.0);
        assert_eq!(scalar(outer.read_at(5).unwrap()), 60.0);
    }

    #[test]
    fn slices_and_bounds() {
        let mut seq = VirtualFrameSequence::new(a_and_b());
        let frames = seq.read_slice(FrameSlice::new(None, None, -2)).unwrap();
        assert_eq!(
            frames.iter().map(scalar).collect::<Vec<_>>(),
            vec![50.0, 30.0, 10.0]
        );
        assert!(matches!(
            seq.read_at(5),
            Err(TrajError::OutOfRange { index: 5, len: 5 })
        ));
        assert_eq!(
            seq.read_copy(-2).unwrap(),
            seq.read_copy(3).unwrap()
        );
    }

    #[test]
    fn current_frame_clamps() {
        let mut seq = VirtualFrameSequence::new(a_and_b());
        assert_eq!(seq.current_index(), None);
        assert!(seq.current_frame().is_ok());
        while let Some(frame) = seq.next_frame() {
            frame.unwrap();
        }
        assert_eq!(scalar(seq.current_frame().unwrap()), 50.0);

        let empty = VirtualFrameSequence::default();
        assert!(empty.is_empty());
        assert!(empty.current_frame().is_err());
    }

    #[test]
    fn random_reads_leave_iteration_position() {
        let mut seq = VirtualFrameSequence::new(a_and_b());
        assert_eq!(scalar(seq.next_frame().unwrap().unwrap()), 10.0);
        assert_eq!(scalar(seq.read_at(4).unwrap()), 50.0);
        assert_eq!(seq.current_index(), Some(0));
        assert_eq!(scalar(seq.current_frame().unwrap()), 10.0);
    }

    #[test]
    fn verify_models_and_subsets() {
        use crate::atoms::tests::small_model;
        use crate::trajectory::MemoryTrajectory;

        let model = small_model();
        let full = FrameSequence::new(
            Box::new(MemoryTrajectory::from_groups([&model]).unwrap()),
            model.clone(),
            &SequenceOptions::default(),
        )
        .unwrap();
        let cas = FrameSequence::new(
            Box::new(MemoryTrajectory::from_groups([&model]).unwrap()),
            model.clone(),
            &SequenceOptions::default().subset("name CA"),
        )
        .unwrap();
        let mut seq = VirtualFrameSequence::new(vec![
            Box::new(full) as Box<dyn FrameSource>,
            Box::new(cas),
        ]);
        assert!(matches!(
            seq.verify_models(),
            Err(TrajError::InconsistentComposition(_))
        ));
        seq.set_subset("name CA").unwrap();
        seq.verify_models().unwrap();
        assert_eq!(seq.frame_atoms(), 2);
        assert_eq!(seq.read_at(1).unwrap().len(), 2);
    }
}
