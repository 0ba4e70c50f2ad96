//! Kabsch superposition and iterative ensemble alignment.

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::atoms::AtomicGroup;
use crate::error::{TrajError, TrajResult};
use crate::transform::{matrix_to_rows, RigidTransform};
use crate::util::{self, centroid};

/// Compute Kabsch rotation matrix.
/// Takes mobile points, mobile centroid, and pre-centered reference points.
#[inline]
pub fn compute_kabsch_rotation(
    mobile: &[[f64; 3]],
    mobile_centroid: &[f64; 3],
    ref_centered: &[[f64; 3]],
) -> TrajResult<Matrix3<f64>> {
    let mut h = Matrix3::<f64>::zeros();
    for (m, r) in mobile.iter().zip(ref_centered) {
        let m_centered = Vector3::new(
            m[0] - mobile_centroid[0],
            m[1] - mobile_centroid[1],
            m[2] - mobile_centroid[2],
        );
        h += m_centered * Vector3::new(r[0], r[1], r[2]).transpose();
    }

    let svd = nalgebra::SVD::new(h, true, true);
    let u = svd
        .u
        .ok_or_else(|| TrajError::Alignment("SVD decomposition failed: no U matrix".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| TrajError::Alignment("SVD decomposition failed: no V^T matrix".into()))?;
    let v = v_t.transpose();
    let mut r = v * u.transpose();

    if r.determinant() < 0.0 {
        // Flip the axis belonging to the smallest singular value.
        let weakest = svd.singular_values.imin();
        let mut v_corrected = v;
        for i in 0..3 {
            v_corrected[(i, weakest)] *= -1.0;
        }
        r = v_corrected * u.transpose();
    }
    Ok(r)
}

/// Least-squares rigid transform carrying `mobile` onto `reference`.
pub fn superposition(mobile: &[[f64; 3]], reference: &[[f64; 3]]) -> TrajResult<RigidTransform> {
    if mobile.len() != reference.len() {
        return Err(TrajError::Mismatch(format!(
            "cannot superimpose {} points onto {}",
            mobile.len(),
            reference.len()
        )));
    }
    if mobile.is_empty() {
        return Err(TrajError::Alignment("no atoms to superimpose".into()));
    }

    let ref_centroid = centroid(reference);
    let ref_centered: Vec<[f64; 3]> = reference
        .iter()
        .map(|p| {
            [
                p[0] - ref_centroid[0],
                p[1] - ref_centroid[1],
                p[2] - ref_centroid[2],
            ]
        })
        .collect();
    let mobile_centroid = centroid(mobile);
    let r = compute_kabsch_rotation(mobile, &mobile_centroid, &ref_centered)?;

    let t = Vector3::from(ref_centroid) - r * Vector3::from(mobile_centroid);
    Ok(RigidTransform {
        rotation: matrix_to_rows(&r),
        translation: [t[0], t[1], t[2]],
    })
}

/// Convergence controls for [`iterative_align`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignOptions {
    /// Stop once the average structure moves less than this (nm RMSD).
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
        }
    }
}

impl AlignOptions {
    pub fn validate(&self) -> TrajResult<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(TrajError::InvalidOptions(format!(
                "alignment tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(TrajError::InvalidOptions(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of an ensemble alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    /// One transform per member, mapping its original coordinates onto the
    /// converged average.
    pub transforms: Vec<RigidTransform>,
    /// Change of the average structure in the final iteration.
    pub rmsd: f64,
    pub iterations: usize,
}

fn average_structure(ensemble: &[AtomicGroup]) -> Vec<[f64; 3]> {
    let n_atoms = ensemble[0].len();
    let mut avg = vec![[0.0; 3]; n_atoms];
    for group in ensemble {
        for (a, c) in avg.iter_mut().zip(group.coords()) {
            a[0] += c[0];
            a[1] += c[1];
            a[2] += c[2];
        }
    }
    let scale = 1.0 / ensemble.len() as f64;
    for a in avg.iter_mut() {
        a[0] *= scale;
        a[1] *= scale;
        a[2] *= scale;
    }
    avg
}

/// Align every member of `ensemble` onto their common average, in place.
///
/// Starts from the first member as target. Each pass superimposes all
/// members onto the current target, recomputes the average, and stops when
/// the average moves by less than `options.tolerance` or after
/// `options.max_iterations` passes.
pub fn iterative_align(
    ensemble: &mut [AtomicGroup],
    options: &AlignOptions,
) -> TrajResult<AlignmentResult> {
    options.validate()?;
    let Some(first) = ensemble.first() else {
        return Ok(AlignmentResult {
            transforms: Vec::new(),
            rmsd: 0.0,
            iterations: 0,
        });
    };
    let n_atoms = first.len();
    if n_atoms == 0 {
        return Err(TrajError::Alignment(
            "alignment subset selects no atoms".into(),
        ));
    }
    if let Some((i, g)) = ensemble.iter().enumerate().find(|(_, g)| g.len() != n_atoms) {
        return Err(TrajError::InconsistentComposition(format!(
            "ensemble member {} has {} atoms, expected {}",
            i,
            g.len(),
            n_atoms
        )));
    }

    let mut transforms = vec![RigidTransform::identity(); ensemble.len()];
    let mut target: Vec<[f64; 3]> = first.coords().to_vec();
    let mut iterations = 0;
    let rmsd = loop {
        ensemble
            .par_iter_mut()
            .zip(transforms.par_iter_mut())
            .try_for_each(|(group, total)| -> TrajResult<()> {
                let step = superposition(group.coords(), &target)?;
                group.apply_transform(&step);
                *total = total.then(&step);
                Ok(())
            })?;

        let avg = average_structure(ensemble);
        let change = util::rmsd(&avg, &target);
        target = avg;
        iterations += 1;
        log::debug!("alignment iteration {}: average moved {:.3e} nm", iterations, change);

        if change < options.tolerance || iterations >= options.max_iterations {
            break change;
        }
    };

    Ok(AlignmentResult {
        transforms,
        rmsd,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::Atom;

    fn points() -> Vec<[f64; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 3.0],
            [1.0, 1.0, 1.0],
        ]
    }

    fn group(coords: Vec<[f64; 3]>) -> AtomicGroup {
        let atoms = (0..coords.len())
            .map(|i| Atom::new(i as i64 + 1, "CA", "ALA", i as i64 + 1))
            .collect();
        AtomicGroup::new(atoms, coords).unwrap()
    }

    fn moved(transform: &RigidTransform) -> Vec<[f64; 3]> {
        points().iter().map(|p| transform.apply(p)).collect()
    }

    #[test]
    fn superposition_recovers_rigid_motion() {
        let motion = RigidTransform::rotation_z(0.7).then(&RigidTransform::from_translation([
            3.0, -1.0, 2.0,
        ]));
        let mobile = moved(&motion);
        let fit = superposition(&mobile, &points()).unwrap();
        let back: Vec<[f64; 3]> = mobile.iter().map(|p| fit.apply(p)).collect();
        assert!(util::rmsd(&back, &points()) < 1e-9);
    }

    #[test]
    fn superposition_never_reflects() {
        let mirrored: Vec<[f64; 3]> = points().iter().map(|p| [p[0], p[1], -p[2]]).collect();
        let fit = superposition(&mirrored, &points()).unwrap();
        assert!((fit.rotation_matrix().determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn superposition_rejects_bad_input() {
        assert!(matches!(
            superposition(&points()[..2], &points()),
            Err(TrajError::Mismatch(_))
        ));
        assert!(matches!(
            superposition(&[], &[]),
            Err(TrajError::Alignment(_))
        ));
    }

    #[test]
    fn iterative_align_superimposes_rigid_copies() {
        let mut ensemble = vec![
            group(points()),
            group(moved(&RigidTransform::rotation_z(0.4))),
            group(moved(&RigidTransform::from_translation([5.0, 5.0, 5.0]))),
        ];
        let originals: Vec<AtomicGroup> = ensemble.clone();
        let result = iterative_align(&mut ensemble, &AlignOptions::default()).unwrap();

        assert_eq!(result.transforms.len(), 3);
        assert!(result.iterations >= 1);
        assert!(result.rmsd < 1e-6);
        for g in &ensemble[1..] {
            assert!(g.rmsd(&ensemble[0]).unwrap() < 1e-6);
        }
        // Transforms map the untouched members onto their aligned coordinates.
        for ((orig, aligned), t) in originals.iter().zip(&ensemble).zip(&result.transforms) {
            let mut copy = orig.clone();
            copy.apply_transform(t);
            assert!(copy.rmsd(aligned).unwrap() < 1e-9);
        }
    }

    #[test]
    fn iterative_align_edge_cases() {
        let empty = iterative_align(&mut [], &AlignOptions::default()).unwrap();
        assert!(empty.transforms.is_empty());

        let mut single = vec![group(points())];
        let result = iterative_align(&mut single, &AlignOptions::default()).unwrap();
        assert_eq!(result.iterations, 1);
        assert!(single[0].rmsd(&group(points())).unwrap() < 1e-12);

        let mut uneven = vec![group(points()), group(points()[..3].to_vec())];
        assert!(matches!(
            iterative_align(&mut uneven, &AlignOptions::default()),
            Err(TrajError::InconsistentComposition(_))
        ));

        let bad = AlignOptions {
            max_iterations: 0,
            ..AlignOptions::default()
        };
        assert!(matches!(
            iterative_align(&mut single, &bad),
            Err(TrajError::InvalidOptions(_))
        ));
    }
}
