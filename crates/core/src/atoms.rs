//! Atoms and atomic groups.
//!
//! An [`AtomicGroup`] pairs an ordered list of atom identity records with one
//! coordinate set. Identity is reference counted, so duplicating a group only
//! copies coordinates; a subgroup gets its own (smaller) identity list.

use std::sync::Arc;

use crate::error::{TrajError, TrajResult};
use crate::selection::SelectionContext;
use crate::transform::RigidTransform;
use crate::util;

/// Identity of a single atom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Atom {
    /// Serial number as found in the source file (1-based by convention).
    pub id: i64,
    pub name: String,
    pub resname: String,
    pub resid: i64,
    pub segid: String,
    /// Mass in amu.
    pub mass: f64,
    /// Partial charge in elementary charge units.
    pub charge: f64,
}

impl Atom {
    pub fn new(id: i64, name: impl Into<String>, resname: impl Into<String>, resid: i64) -> Self {
        Self {
            id,
            name: name.into(),
            resname: resname.into(),
            resid,
            ..Self::default()
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_segid(mut self, segid: impl Into<String>) -> Self {
        self.segid = segid.into();
        self
    }
}

/// Ordered atoms plus one set of coordinates (nm) and an optional box.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomicGroup {
    atoms: Arc<Vec<Atom>>,
    coords: Vec<[f64; 3]>,
    periodic_box: Option<[f64; 6]>,
}

impl AtomicGroup {
    pub fn new(atoms: Vec<Atom>, coords: Vec<[f64; 3]>) -> TrajResult<Self> {
        if atoms.len() != coords.len() {
            return Err(TrajError::Mismatch(format!(
                "{} atoms but {} coordinates",
                atoms.len(),
                coords.len()
            )));
        }
        Ok(Self {
            atoms: Arc::new(atoms),
            coords,
            periodic_box: None,
        })
    }

    /// Group with every coordinate at the origin.
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        let coords = vec![[0.0; 3]; atoms.len()];
        Self {
            atoms: Arc::new(atoms),
            coords,
            periodic_box: None,
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn coords(&self) -> &[[f64; 3]] {
        &self.coords
    }

    pub fn coords_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.coords
    }

    /// Box as `[a, b, c, alpha, beta, gamma]` (nm, degrees).
    pub fn periodic_box(&self) -> Option<[f64; 6]> {
        self.periodic_box
    }

    pub fn set_periodic_box(&mut self, periodic_box: Option<[f64; 6]>) {
        self.periodic_box = periodic_box;
    }

    /// True when both groups hold the very same identity list.
    pub fn shares_atoms_with(&self, other: &AtomicGroup) -> bool {
        Arc::ptr_eq(&self.atoms, &other.atoms)
    }

    /// Overwrite coordinates from a raw buffer. The length must match.
    pub fn set_coords(&mut self, coords: &[[f64; 3]]) -> TrajResult<()> {
        if coords.len() != self.coords.len() {
            return Err(TrajError::Mismatch(format!(
                "cannot load {} coordinates into a group of {} atoms",
                coords.len(),
                self.coords.len()
            )));
        }
        self.coords.copy_from_slice(coords);
        Ok(())
    }

    /// Become a duplicate of `other`, reusing this group's coordinate buffer.
    pub fn copy_from(&mut self, other: &AtomicGroup) {
        if !Arc::ptr_eq(&self.atoms, &other.atoms) {
            self.atoms = Arc::clone(&other.atoms);
        }
        self.coords.clear();
        self.coords.extend_from_slice(&other.coords);
        self.periodic_box = other.periodic_box;
    }

    /// New group made of the atoms at `positions` (in that order).
    pub fn subgroup(&self, positions: &[usize]) -> TrajResult<AtomicGroup> {
        let mut atoms = Vec::with_capacity(positions.len());
        let mut coords = Vec::with_capacity(positions.len());
        for &p in positions {
            let atom = self
                .atoms
                .get(p)
                .ok_or_else(|| TrajError::out_of_range(p, self.len()))?;
            atoms.push(atom.clone());
            coords.push(self.coords[p]);
        }
        Ok(AtomicGroup {
            atoms: Arc::new(atoms),
            coords,
            periodic_box: self.periodic_box,
        })
    }

    /// Refresh this group's coordinates from `source`, where `positions[i]`
    /// is the position in `source` of this group's atom `i`.
    pub(crate) fn gather_from(&mut self, source: &AtomicGroup, positions: &[usize]) -> TrajResult<()> {
        if positions.len() != self.coords.len() {
            return Err(TrajError::Mismatch(format!(
                "subset map has {} entries for a group of {} atoms",
                positions.len(),
                self.coords.len()
            )));
        }
        for (dst, &p) in self.coords.iter_mut().zip(positions) {
            *dst = *source
                .coords
                .get(p)
                .ok_or_else(|| TrajError::out_of_range(p, source.len()))?;
        }
        self.periodic_box = source.periodic_box;
        Ok(())
    }

    /// Positions (sorted) of the atoms matching a selection expression.
    pub fn select_positions(&self, expression: &str) -> TrajResult<Vec<usize>> {
        let ctx = SelectionContext::new(self);
        Ok(ctx.eval_str(expression)?)
    }

    /// Subgroup of the atoms matching a selection expression.
    pub fn select(&self, expression: &str) -> TrajResult<AtomicGroup> {
        let positions = self.select_positions(expression)?;
        self.subgroup(&positions)
    }

    pub fn centroid(&self) -> [f64; 3] {
        util::centroid(&self.coords)
    }

    pub fn center_of_mass(&self) -> [f64; 3] {
        let total: f64 = self.atoms.iter().map(|a| a.mass).sum();
        if total <= 0.0 {
            return self.centroid();
        }
        let mut sum = [0.0; 3];
        for (atom, c) in self.atoms.iter().zip(&self.coords) {
            sum[0] += atom.mass * c[0];
            sum[1] += atom.mass * c[1];
            sum[2] += atom.mass * c[2];
        }
        [sum[0] / total, sum[1] / total, sum[2] / total]
    }

    /// Axis-aligned bounds as `(min, max)`; `None` for an empty group.
    pub fn bounding_box(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.coords.first()?;
        let mut min = first;
        let mut max = first;
        for c in &self.coords[1..] {
            for d in 0..3 {
                min[d] = min[d].min(c[d]);
                max[d] = max[d].max(c[d]);
            }
        }
        Some((min, max))
    }

    /// Translate so the centroid sits at the origin; returns the old centroid.
    pub fn center_at_origin(&mut self) -> [f64; 3] {
        let c = self.centroid();
        self.apply_transform(&RigidTransform::from_translation([-c[0], -c[1], -c[2]]));
        c
    }

    pub fn apply_transform(&mut self, transform: &RigidTransform) {
        transform.apply_all(&mut self.coords);
    }

    /// Plain RMSD against another group of the same size (no fitting).
    pub fn rmsd(&self, other: &AtomicGroup) -> TrajResult<f64> {
        if self.len() != other.len() {
            return Err(TrajError::Mismatch(format!(
                "cannot compare groups of {} and {} atoms",
                self.len(),
                other.len()
            )));
        }
        Ok(util::rmsd(&self.coords, &other.coords))
    }
}
