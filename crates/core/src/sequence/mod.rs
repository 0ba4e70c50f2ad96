//! Sequence-like access to trajectory frames.
//!
//! Three layers, each usable on its own:
//!
//! - [`FrameSequence`]: one trajectory plus the model its frames apply to,
//!   filtered by skip/stride or an explicit frame list, optionally viewed
//!   through an atom subset.
//! - [`VirtualFrameSequence`]: the concatenation of any number of
//!   [`FrameSource`]s, re-filtered by its own [`FrameSelection`].
//! - [`AlignedVirtualFrameSequence`]: a virtual sequence whose frames are
//!   superimposed by a one-time iterative alignment pass.
//!
//! Reads come in two flavours. [`FrameSource::read_at`] lends out the
//! sequence's own frame buffer, which the next read overwrites;
//! [`FrameSource::read_copy`] and [`FrameSource::read_slice`] hand out owned
//! duplicates.

pub mod aligned;
pub mod frame_sequence;
pub mod virtual_sequence;

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};

pub use aligned::{AlignedVirtualFrameSequence, AlignmentConfig, AlignmentStats};
pub use frame_sequence::FrameSequence;
pub use virtual_sequence::{FramePointer, VirtualFrameSequence};

/// Capability shared by every composable frame sequence.
pub trait FrameSource: Send {
    /// Number of logical frames.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read logical frame `index` (negative counts from the end) and lend out
    /// the resulting frame. The buffer is reused by the next read.
    fn read_at(&mut self, index: isize) -> TrajResult<&AtomicGroup>;

    /// Read logical frame `index` into an owned copy.
    fn read_copy(&mut self, index: isize) -> TrajResult<AtomicGroup> {
        self.read_at(index).cloned()
    }

    /// Owned, independent copies of every frame the slice selects.
    fn read_slice(&mut self, slice: FrameSlice) -> TrajResult<Vec<AtomicGroup>> {
        let indices = slice.indices(self.len())?;
        let mut out = Vec::with_capacity(indices.len());
        for k in indices {
            out.push(self.read_copy(k as isize)?);
        }
        Ok(out)
    }

    /// Re-resolve the atom subset frames are reported through.
    fn set_subset(&mut self, selection: &str) -> TrajResult<()>;

    /// The frame produced by the most recent read.
    fn current_frame(&self) -> TrajResult<&AtomicGroup>;

    /// Atoms per produced frame.
    fn frame_atoms(&self) -> usize;

    /// Rewind sequential iteration.
    fn reset(&mut self);

    /// Logical index of the frame most recently produced by iteration.
    fn current_index(&self) -> Option<usize>;

    /// Next frame of sequential iteration, `None` once exhausted.
    fn next_frame(&mut self) -> Option<TrajResult<&AtomicGroup>>;

    /// Iterate from the start over owned copies of every frame.
    fn frames(&mut self) -> Frames<'_, Self>
    where
        Self: Sized,
    {
        self.reset();
        Frames { source: self }
    }
}

/// Iterator over owned frame copies, see [`FrameSource::frames`].
pub struct Frames<'a, S: FrameSource> {
    source: &'a mut S,
}

impl<S: FrameSource> Iterator for Frames<'_, S> {
    type Item = TrajResult<AtomicGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next_frame().map(|frame| frame.cloned())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let done = self.source.current_index().map_or(0, |k| k + 1);
        let left = self.source.len().saturating_sub(done);
        (left, Some(left))
    }
}

/// Sequential iteration position. Advancing happens before the read, so a
/// failed read does not stall iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cursor {
    next: usize,
}

impl Cursor {
    pub(crate) fn reset(&mut self) {
        self.next = 0;
    }

    pub(crate) fn advance(&mut self, len: usize) -> Option<usize> {
        if self.next >= len {
            return None;
        }
        self.next += 1;
        Some(self.next - 1)
    }

    /// Position most recently handed out; may lie past the end after the
    /// sequence shrank.
    pub(crate) fn last(&self) -> Option<usize> {
        self.next.checked_sub(1)
    }
}

/// Map a possibly negative index onto `0..len`.
pub fn normalize_index(index: isize, len: usize) -> TrajResult<usize> {
    let n = len as isize;
    let k = if index < 0 { index + n } else { index };
    if k < 0 || k >= n {
        return Err(TrajError::OutOfRange { index, len });
    }
    Ok(k as usize)
}

/// Slice of logical frames with optional bounds and a non-zero step.
///
/// Bounds may be negative (counted from the end) but must land inside the
/// sequence; unlike Python slicing they are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl Default for FrameSlice {
    fn default() -> Self {
        Self::all()
    }
}

impl FrameSlice {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    pub fn all() -> Self {
        Self::new(None, None, 1)
    }

    pub fn with_step(mut self, step: isize) -> Self {
        self.step = step;
        self
    }

    /// Logical indices selected in a sequence of `len` frames.
    pub fn indices(&self, len: usize) -> TrajResult<Vec<usize>> {
        if self.step == 0 {
            return Err(TrajError::InvalidOptions("slice step cannot be zero".into()));
        }
        let n = len as isize;
        let bound = |i: isize| -> TrajResult<isize> {
            let j = if i < 0 { i + n } else { i };
            if j < 0 || j > n {
                return Err(TrajError::OutOfRange { index: i, len });
            }
            Ok(j)
        };
        let start = self.start.map(bound).transpose()?;
        let stop = self.stop.map(bound).transpose()?;

        let mut out = Vec::new();
        if self.step > 0 {
            let (start, stop) = (start.unwrap_or(0), stop.unwrap_or(n));
            let mut k = start;
            while k < stop {
                out.push(k as usize);
                k += self.step;
            }
        } else {
            let start = start.map_or(n - 1, |s| s.min(n - 1));
            let stop = stop.unwrap_or(-1);
            let mut k = start;
            while k > stop {
                out.push(k as usize);
                k += self.step;
            }
        }
        Ok(out)
    }
}

impl From<Range<isize>> for FrameSlice {
    fn from(r: Range<isize>) -> Self {
        Self::new(Some(r.start), Some(r.end), 1)
    }
}

impl From<RangeFrom<isize>> for FrameSlice {
    fn from(r: RangeFrom<isize>) -> Self {
        Self::new(Some(r.start), None, 1)
    }
}

impl From<RangeTo<isize>> for FrameSlice {
    fn from(r: RangeTo<isize>) -> Self {
        Self::new(None, Some(r.end), 1)
    }
}

impl From<RangeFull> for FrameSlice {
    fn from(_: RangeFull) -> Self {
        Self::all()
    }
}

/// Which logical frames a sequence visits out of the frames beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSelection {
    /// Every `stride`-th frame starting at `skip`.
    Stride { skip: usize, stride: usize },
    /// Exactly these indices, in this order. Not bounds checked up front.
    Explicit(Vec<usize>),
}

impl Default for FrameSelection {
    fn default() -> Self {
        FrameSelection::Stride { skip: 0, stride: 1 }
    }
}

impl FrameSelection {
    pub fn validate(&self) -> TrajResult<()> {
        if let FrameSelection::Stride { stride: 0, .. } = self {
            return Err(TrajError::InvalidOptions("stride must be at least 1".into()));
        }
        Ok(())
    }

    /// Indices picked from `n` underlying frames.
    pub fn resolve(&self, n: usize) -> Vec<usize> {
        match self {
            FrameSelection::Stride { skip, stride } => {
                (*skip..n).step_by((*stride).max(1)).collect()
            }
            FrameSelection::Explicit(list) => list.clone(),
        }
    }
}

/// Construction options of a [`FrameSequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceOptions {
    pub skip: usize,
    pub stride: usize,
    /// Explicit frame list; overrides `skip` and `stride` when present.
    pub frames: Option<Vec<usize>>,
    /// Selection expression for the atom subset frames are reported through.
    pub subset: Option<String>,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            stride: 1,
            frames: None,
            subset: None,
        }
    }
}

impl SequenceOptions {
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn frames<I: IntoIterator<Item = usize>>(mut self, frames: I) -> Self {
        self.frames = Some(frames.into_iter().collect());
        self
    }

    pub fn subset(mut self, selection: impl Into<String>) -> Self {
        self.subset = Some(selection.into());
        self
    }

    pub fn frame_selection(&self) -> TrajResult<FrameSelection> {
        let selection = match &self.frames {
            Some(list) => FrameSelection::Explicit(list.clone()),
            None => FrameSelection::Stride {
                skip: self.skip,
                stride: self.stride,
            },
        };
        selection.validate()?;
        Ok(selection)
    }
}
