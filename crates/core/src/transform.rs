//! Rigid-body transforms (rotation followed by translation).

use nalgebra::{Matrix3, Vector3};

/// A proper rigid transform `x' = R x + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Rotation about the origin.
    pub fn from_rotation(rotation: [[f64; 3]; 3]) -> Self {
        Self {
            rotation,
            translation: [0.0; 3],
        }
    }

    /// Rotation by `angle` radians about the z axis; handy for tests and benches.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rotation([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    #[inline]
    pub fn apply(&self, p: &[f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + t[0],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + t[1],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + t[2],
        ]
    }

    pub fn apply_all(&self, points: &mut [[f64; 3]]) {
        for p in points.iter_mut() {
            *p = self.apply(p);
        }
    }

    /// Transform equivalent to applying `self` first, then `next`.
    pub fn then(&self, next: &RigidTransform) -> RigidTransform {
        let r1 = self.rotation_matrix();
        let r2 = next.rotation_matrix();
        let t1 = Vector3::from(self.translation);
        let t2 = Vector3::from(next.translation);
        let r = r2 * r1;
        let t = r2 * t1 + t2;
        RigidTransform {
            rotation: matrix_to_rows(&r),
            translation: [t[0], t[1], t[2]],
        }
    }

    pub(crate) fn rotation_matrix(&self) -> Matrix3<f64> {
        let r = &self.rotation;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        )
    }
}

pub(crate) fn matrix_to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}
