//! Area-weighted covariance statistics for planar fitting.
//!
//! `CovAccum` keeps the raw sums Σw·x and Σw·xxᵀ rather than centered
//! moments, so that adding and subtracting accumulators are exact inverses
//! up to floating point. The planar-fit energy of a set of triangles is the
//! smallest eigenvalue of the centered covariance scaled by the face count.

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Running second-moment accumulator over area-weighted triangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CovAccum {
    /// Σ w·x over the corners of every accumulated triangle
    sum: Vector3<f64>,
    /// Σ w·x xᵀ over the same corners
    moment: Matrix3<f64>,
    /// Total triangle area
    area: f64,
    /// Number of accumulated triangles
    count: isize,
}

impl Default for CovAccum {
    fn default() -> Self {
        Self {
            sum: Vector3::zeros(),
            moment: Matrix3::zeros(),
            area: 0.0,
            count: 0,
        }
    }
}

impl CovAccum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator for a single triangle. Each corner contributes with
    /// weight area/3. A degenerate (zero-area) triangle yields an empty
    /// accumulator.
    pub fn from_triangle(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Self {
        let area = triangle_area(p0, p1, p2);
        if area <= f64::EPSILON {
            return Self::default();
        }
        let w = area / 3.0;
        let mut sum = Vector3::zeros();
        let mut moment = Matrix3::zeros();
        for p in [p0, p1, p2] {
            sum += w * p.coords;
            moment += w * p.coords * p.coords.transpose();
        }
        Self {
            sum,
            moment,
            area,
            count: 1,
        }
    }

    pub fn count(&self) -> usize {
        self.count.max(0) as usize
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn is_empty(&self) -> bool {
        self.count <= 0 || self.area <= f64::EPSILON
    }

    /// Area-weighted centroid of the accumulated triangles.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(Point3::from(self.sum / self.area))
    }

    /// Centered covariance matrix: Σw·xxᵀ/W − c cᵀ.
    pub fn centered(&self) -> Matrix3<f64> {
        if self.is_empty() {
            return Matrix3::zeros();
        }
        let c = self.sum / self.area;
        self.moment / self.area - c * c.transpose()
    }

    /// L2 planar-fit energy: smallest eigenvalue of the centered covariance
    /// times the face count. Exactly zero for a single triangle.
    pub fn energy(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        (smallest_eigenvalue(&self.centered()) * self.count as f64).max(0.0)
    }

    /// Best-fit plane as (unit normal, d) with n·x + d = 0, oriented
    /// arbitrarily. None when the accumulator is empty.
    pub fn plane(&self) -> Option<(Vector3<f64>, f64)> {
        let centroid = self.centroid()?;
        let normal = smallest_eigenvector(&self.centered());
        let d = -normal.dot(&centroid.coords);
        Some((normal, d))
    }

    /// Energy of `self + other` without mutating either accumulator.
    pub fn merged_energy(&self, other: &CovAccum) -> f64 {
        (*self + *other).energy()
    }
}

impl Add for CovAccum {
    type Output = CovAccum;
    fn add(self, rhs: CovAccum) -> CovAccum {
        CovAccum {
            sum: self.sum + rhs.sum,
            moment: self.moment + rhs.moment,
            area: self.area + rhs.area,
            count: self.count + rhs.count,
        }
    }
}

impl AddAssign for CovAccum {
    fn add_assign(&mut self, rhs: CovAccum) {
        *self = *self + rhs;
    }
}

impl Sub for CovAccum {
    type Output = CovAccum;
    fn sub(self, rhs: CovAccum) -> CovAccum {
        CovAccum {
            sum: self.sum - rhs.sum,
            moment: self.moment - rhs.moment,
            area: self.area - rhs.area,
            count: self.count - rhs.count,
        }
    }
}

impl SubAssign for CovAccum {
    fn sub_assign(&mut self, rhs: CovAccum) {
        *self = *self - rhs;
    }
}

/// Unsigned area of a triangle.
pub fn triangle_area(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> f64 {
    0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
}

/// Smallest eigenvalue of a symmetric 3×3 matrix via the closed-form
/// trigonometric method (no iteration).
pub fn smallest_eigenvalue(m: &Matrix3<f64>) -> f64 {
    symmetric_eigenvalues(m)[2]
}

/// Eigenvalues of a symmetric 3×3 matrix in descending order.
pub fn symmetric_eigenvalues(m: &Matrix3<f64>) -> [f64; 3] {
    let p1 = m[(0, 1)].powi(2) + m[(0, 2)].powi(2) + m[(1, 2)].powi(2);
    if p1 <= f64::EPSILON * m.norm().max(1.0) {
        // Already diagonal
        let mut d = [m[(0, 0)], m[(1, 1)], m[(2, 2)]];
        d.sort_by(|a, b| b.total_cmp(a));
        return d;
    }
    let q = m.trace() / 3.0;
    let p2 = (m[(0, 0)] - q).powi(2)
        + (m[(1, 1)] - q).powi(2)
        + (m[(2, 2)] - q).powi(2)
        + 2.0 * p1;
    let p = (p2 / 6.0).sqrt();
    let b = (m - Matrix3::identity() * q) / p;
    let r = (b.determinant() / 2.0).clamp(-1.0, 1.0);
    let phi = r.acos() / 3.0;

    let e1 = q + 2.0 * p * phi.cos();
    let e3 = q + 2.0 * p * (phi + 2.0 * std::f64::consts::FRAC_PI_3).cos();
    let e2 = 3.0 * q - e1 - e3;
    [e1, e2, e3]
}

/// Unit eigenvector for the smallest eigenvalue of a symmetric 3×3 matrix.
///
/// Uses the classical product trick: for distinct eigenvalues, the columns
/// of (A − λ₁I)(A − λ₂I) span the λ₃ eigenspace. Falls back to +z when the
/// matrix is (near-)spherical.
pub fn smallest_eigenvector(m: &Matrix3<f64>) -> Vector3<f64> {
    let [e1, e2, _e3] = symmetric_eigenvalues(m);
    let prod = (m - Matrix3::identity() * e1) * (m - Matrix3::identity() * e2);
    let mut best = Vector3::zeros();
    let mut best_norm = 0.0;
    for c in 0..3 {
        let col: Vector3<f64> = prod.column(c).into_owned();
        let n = col.norm();
        if n > best_norm {
            best_norm = n;
            best = col;
        }
    }
    if best_norm <= f64::EPSILON {
        return Vector3::z();
    }
    best / best_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_pair() -> (CovAccum, CovAccum) {
        let a = CovAccum::from_triangle(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        let b = CovAccum::from_triangle(
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(1.0, 1.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        (a, b)
    }

    #[test]
    fn test_single_triangle_energy_is_zero() {
        let (a, _) = flat_pair();
        assert_eq!(a.count(), 1);
        assert_relative_eq!(a.area(), 0.5);
        assert_eq!(a.energy(), 0.0);
    }

    #[test]
    fn test_coplanar_triangles_have_zero_energy() {
        let (a, b) = flat_pair();
        let both = a + b;
        assert_eq!(both.count(), 2);
        assert_relative_eq!(both.area(), 1.0);
        assert!(both.energy() < 1e-12, "energy = {}", both.energy());
    }

    #[test]
    fn test_bent_triangles_have_positive_energy() {
        let a = CovAccum::from_triangle(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        let b = CovAccum::from_triangle(
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(1.0, 1.0, 1.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        let both = a + b;
        assert!(both.energy() > 1e-6);
        // Energy is λ_min of the centered covariance scaled by the count.
        let expected = smallest_eigenvalue(&both.centered()) * 2.0;
        assert_relative_eq!(both.energy(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_sub_is_inverse_of_add() {
        let (a, b) = flat_pair();
        let both = a + b;
        let back = both - b;
        assert_relative_eq!(back.area(), a.area(), epsilon = 1e-12);
        assert_eq!(back.count(), a.count());
        assert_relative_eq!((back.centered() - a.centered()).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_triangle_is_empty() {
        let d = CovAccum::from_triangle(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 1.0, 1.0),
            &Point3::new(2.0, 2.0, 2.0),
        );
        assert!(d.is_empty());
        assert_eq!(d.energy(), 0.0);
    }

    #[test]
    fn test_plane_fit_recovers_xy_plane() {
        let (a, b) = flat_pair();
        let (n, d) = (a + b).plane().unwrap();
        assert_relative_eq!(n.z.abs(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(d, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_eigenvalues_of_diagonal_matrix() {
        let m = Matrix3::from_diagonal(&Vector3::new(3.0, 1.0, 2.0));
        let e = symmetric_eigenvalues(&m);
        assert_relative_eq!(e[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(e[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(e[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_eigenvalues_of_full_matrix() {
        // Symmetric with known spectrum {2 - sqrt2, 2, 2 + sqrt2}
        let m = Matrix3::new(2.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0);
        let e = symmetric_eigenvalues(&m);
        let s = 2.0_f64.sqrt();
        assert_relative_eq!(e[0], 2.0 + s, epsilon = 1e-9);
        assert_relative_eq!(e[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(e[2], 2.0 - s, epsilon = 1e-9);
    }

    #[test]
    fn test_smallest_eigenvector_matches_eigenvalue() {
        let m = Matrix3::new(2.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0);
        let v = smallest_eigenvector(&m);
        let lambda = smallest_eigenvalue(&m);
        assert_relative_eq!((m * v - lambda * v).norm(), 0.0, epsilon = 1e-9);
    }
}
