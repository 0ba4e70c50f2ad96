//! Virtual sequences whose frames are superimposed on a common average.

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::kabsch::{iterative_align, AlignOptions};
use crate::sequence::{normalize_index, Cursor, FrameSource, VirtualFrameSequence};
use crate::transform::RigidTransform;

/// Atoms to superimpose on, and when to stop iterating.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentConfig {
    pub selection: String,
    pub options: AlignOptions,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            selection: "name CA".to_string(),
            options: AlignOptions::default(),
        }
    }
}

/// Convergence summary of the last alignment pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentStats {
    /// Movement of the average structure in the final iteration (nm).
    pub rmsd: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone)]
enum AlignmentState {
    Unaligned,
    Aligned {
        transforms: Vec<RigidTransform>,
        stats: AlignmentStats,
    },
}

/// A [`VirtualFrameSequence`] that reports every frame superimposed on the
/// iteratively refined average of all frames.
///
/// The alignment pass runs lazily on the first read, reading every logical
/// frame once. Membership, subset and selection changes discard it.
pub struct AlignedVirtualFrameSequence {
    inner: VirtualFrameSequence,
    config: AlignmentConfig,
    state: AlignmentState,
    view: Option<AtomicGroup>,
    cursor: Cursor,
}

impl From<VirtualFrameSequence> for AlignedVirtualFrameSequence {
    fn from(inner: VirtualFrameSequence) -> Self {
        Self {
            inner,
            config: AlignmentConfig::default(),
            state: AlignmentState::Unaligned,
            view: None,
            cursor: Cursor::default(),
        }
    }
}

impl AlignedVirtualFrameSequence {
    /// Align every frame of `members` on their C-alpha atoms.
    pub fn new<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn FrameSource>>,
    {
        VirtualFrameSequence::new(members).into()
    }

    pub fn with_config(inner: VirtualFrameSequence, config: AlignmentConfig) -> TrajResult<Self> {
        config.options.validate()?;
        Ok(Self {
            config,
            ..Self::from(inner)
        })
    }

    pub fn inner(&self) -> &VirtualFrameSequence {
        &self.inner
    }

    pub fn alignment_selection(&self) -> &str {
        &self.config.selection
    }

    pub fn is_aligned(&self) -> bool {
        matches!(self.state, AlignmentState::Aligned { .. })
    }

    /// One transform per logical frame, once aligned.
    pub fn transforms(&self) -> Option<&[RigidTransform]> {
        match &self.state {
            AlignmentState::Aligned { transforms, .. } => Some(transforms),
            AlignmentState::Unaligned => None,
        }
    }

    pub fn alignment_stats(&self) -> Option<AlignmentStats> {
        match &self.state {
            AlignmentState::Aligned { stats, .. } => Some(*stats),
            AlignmentState::Unaligned => None,
        }
    }

    pub fn count_total_raw_frames(&self) -> usize {
        self.inner.count_total_raw_frames()
    }

    pub fn verify_models(&self) -> TrajResult<()> {
        self.inner.verify_models()
    }

    pub fn append<I>(&mut self, members: I)
    where
        I: IntoIterator<Item = Box<dyn FrameSource>>,
    {
        self.inner.append(members);
        self.invalidate();
    }

    pub fn push<S: FrameSource + 'static>(&mut self, member: S) {
        self.inner.push(member);
        self.invalidate();
    }

    /// Superimpose on a different set of atoms from now on.
    pub fn align_with(&mut self, selection: &str) {
        self.config.selection = selection.to_string();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.state = AlignmentState::Unaligned;
        self.cursor.reset();
    }

    /// Run the alignment pass now, replacing any earlier result.
    ///
    /// The alignment atoms are re-resolved whenever the member changes, so
    /// members with different models may be mixed as long as the selection
    /// picks the same number of atoms in each.
    pub fn align(&mut self) -> TrajResult<()> {
        let len = self.inner.len();
        let mut ensemble = Vec::with_capacity(len);
        // Member, alignment atom positions within its frames, and a template
        // refreshed for each of its frames.
        let mut current: Option<(usize, Vec<usize>, AtomicGroup)> = None;

        for k in 0..len {
            let member = self.inner.pointer(k as isize)?.member;
            let frame = self.inner.read_at(k as isize)?;
            match current.as_mut() {
                Some((m, positions, template)) if *m == member => {
                    template.gather_from(frame, positions)?;
                    ensemble.push(template.clone());
                }
                _ => {
                    let positions = frame.select_positions(&self.config.selection)?;
                    let template = frame.subgroup(&positions)?;
                    ensemble.push(template.clone());
                    current = Some((member, positions, template));
                }
            }
        }

        let result = iterative_align(&mut ensemble, &self.config.options)?;
        log::info!(
            "aligned {} frames on '{}': final rmsd {:.3e} nm after {} iterations",
            result.transforms.len(),
            self.config.selection,
            result.rmsd,
            result.iterations
        );
        self.state = AlignmentState::Aligned {
            transforms: result.transforms,
            stats: AlignmentStats {
                rmsd: result.rmsd,
                iterations: result.iterations,
            },
        };
        Ok(())
    }

    fn transform_at(&mut self, k: usize) -> TrajResult<RigidTransform> {
        if !self.is_aligned() {
            self.align()?;
        }
        match &self.state {
            AlignmentState::Aligned { transforms, .. } => transforms
                .get(k)
                .copied()
                .ok_or_else(|| TrajError::out_of_range(k, transforms.len())),
            AlignmentState::Unaligned => {
                Err(TrajError::Alignment("alignment pass did not run".into()))
            }
        }
    }
}

impl FrameSource for AlignedVirtualFrameSequence {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn read_at(&mut self, index: isize) -> TrajResult<&AtomicGroup> {
        let k = normalize_index(index, self.inner.len())?;
        let transform = self.transform_at(k)?;
        let frame = self.inner.read_at(k as isize)?;
        let view = self.view.get_or_insert_with(AtomicGroup::default);
        view.copy_from(frame);
        view.apply_transform(&transform);
        Ok(view)
    }

    /// Transforms a copy of the inner frame, leaving [`current_frame`] as it
    /// was.
    ///
    /// [`current_frame`]: FrameSource::current_frame
    fn read_copy(&mut self, index: isize) -> TrajResult<AtomicGroup> {
        let k = normalize_index(index, self.inner.len())?;
        let transform = self.transform_at(k)?;
        let mut frame = self.inner.read_copy(k as isize)?;
        frame.apply_transform(&transform);
        Ok(frame)
    }

    fn set_subset(&mut self, selection: &str) -> TrajResult<()> {
        self.invalidate();
        self.inner.set_subset(selection)
    }

    /// Last frame produced by `read_at` or iteration, or the unaligned
    /// current frame before either.
    fn current_frame(&self) -> TrajResult<&AtomicGroup> {
        match &self.view {
            Some(view) => Ok(view),
            None => self.inner.current_frame(),
        }
    }

    fn frame_atoms(&self) -> usize {
        self.inner.frame_atoms()
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn current_index(&self) -> Option<usize> {
        self.cursor.last()
    }

    fn next_frame(&mut self) -> Option<TrajResult<&AtomicGroup>> {
        let k = self.cursor.advance(self.inner.len())?;
        Some(self.read_at(k as isize))
    }
}
