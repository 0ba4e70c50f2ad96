//! Small geometric helpers shared across modules.

/// Squared distance between two 3D points.
#[inline(always)]
pub fn distance_squared(p1: &[f64; 3], p2: &[f64; 3]) -> f64 {
    let dx = p1[0] - p2[0];
    let dy = p1[1] - p2[1];
    let dz = p1[2] - p2[2];
    dx * dx + dy * dy + dz * dz
}

/// Unweighted centroid of a set of points. Empty input gives the origin.
#[inline]
pub fn centroid(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let n = points.len() as f64;
    let mut sum = [0.0; 3];
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// Root mean square deviation between two equally sized point sets,
/// without any fitting.
pub fn rmsd(a: &[[f64; 3]], b: &[[f64; 3]]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a.iter().zip(b).map(|(p, q)| distance_squared(p, q)).sum();
    (sum / a.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_squared() {
        let p1 = [0.0, 0.0, 0.0];
        let p2 = [1.0, 0.0, 0.0];
        assert!((distance_squared(&p1, &p2) - 1.0).abs() < 1e-10);

        let p3 = [1.0, 1.0, 1.0];
        assert!((distance_squared(&p1, &p3) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&[[0.0, 0.0, 0.0], [2.0, 4.0, -2.0]]);
        assert_eq!(c, [1.0, 2.0, -1.0]);
        assert_eq!(centroid(&[]), [0.0; 3]);
    }

    #[test]
    fn test_rmsd_of_shifted_points() {
        let a = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let b = [[0.0, 0.0, 2.0], [1.0, 0.0, 2.0]];
        assert!((rmsd(&a, &b) - 2.0).abs() < 1e-12);
        assert_eq!(rmsd(&[], &[]), 0.0);
    }
}
