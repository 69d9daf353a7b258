//! Quadric error metrics for edge contraction.
//!
//! A quadric is a symmetric 4×4 matrix Q such that for a homogeneous point
//! p = (x, y, z, 1), the form pᵀQp is the weighted sum of squared distances
//! from p to the accumulated planes.

use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use std::ops::{Add, AddAssign};

/// Accumulated plane quadric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    m: Matrix4<f64>,
}

impl Default for Quadric {
    fn default() -> Self {
        Self {
            m: Matrix4::zeros(),
        }
    }
}

impl Quadric {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Quadric of a single plane n·x + d = 0 scaled by `weight`.
    /// `normal` is assumed unit length.
    pub fn from_plane(normal: &Vector3<f64>, d: f64, weight: f64) -> Self {
        let p = Vector4::new(normal.x, normal.y, normal.z, d);
        Self {
            m: p * p.transpose() * weight,
        }
    }

    /// Quadric of the plane through `point` with the given unit `normal`.
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>, weight: f64) -> Self {
        Self::from_plane(normal, -normal.dot(&point.coords), weight)
    }

    /// Evaluate pᵀQp, clamped at zero against FP round-off.
    pub fn eval(&self, p: &Point3<f64>) -> f64 {
        let v = Vector4::new(p.x, p.y, p.z, 1.0);
        (v.transpose() * self.m * v)[(0, 0)].max(0.0)
    }

    /// Point minimizing pᵀQp with the last coordinate fixed to 1, solving
    /// the leading 3×3 system. Falls back to the midpoint of (a, b) when
    /// the system is singular or the solution is not finite.
    pub fn optimal_point(&self, a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
        let q3 = self.m.fixed_view::<3, 3>(0, 0).into_owned();
        let q1 = self.m.fixed_view::<3, 1>(0, 3).into_owned();
        if let Some(inv) = q3.try_inverse() {
            let p = -inv * q1;
            if p.iter().all(|x| x.is_finite()) {
                return Point3::from(p);
            }
        }
        Point3::from((a.coords + b.coords) * 0.5)
    }
}

impl Add for Quadric {
    type Output = Quadric;
    fn add(self, rhs: Quadric) -> Quadric {
        Quadric { m: self.m + rhs.m }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Quadric) {
        self.m += rhs.m;
    }
}

impl std::iter::Sum for Quadric {
    fn sum<I: Iterator<Item = Quadric>>(iter: I) -> Quadric {
        iter.fold(Quadric::zero(), |acc, q| acc + q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_eval_measures_plane_distance() {
        // Unit quadric of the z = 0 plane: cost is z².
        let q = Quadric::from_plane(&Vector3::z(), 0.0, 1.0);
        assert_relative_eq!(q.eval(&Point3::new(5.0, -3.0, 2.0)), 4.0, epsilon = 1e-12);
        assert_relative_eq!(q.eval(&Point3::new(1.0, 1.0, 0.0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weight_scales_cost() {
        let q = Quadric::from_plane(&Vector3::z(), 0.0, 3.0);
        assert_relative_eq!(q.eval(&Point3::new(0.0, 0.0, 2.0)), 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_optimal_point_of_three_planes() {
        // x = 1, y = 2, z = 3 intersect at a single point.
        let q = Quadric::from_plane(&Vector3::x(), -1.0, 1.0)
            + Quadric::from_plane(&Vector3::y(), -2.0, 1.0)
            + Quadric::from_plane(&Vector3::z(), -3.0, 1.0);
        let p = q.optimal_point(&Point3::origin(), &Point3::new(10.0, 10.0, 10.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-9);
        assert_relative_eq!(q.eval(&p), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_quadric_falls_back_to_midpoint() {
        // A single plane constrains only one direction.
        let q = Quadric::from_plane(&Vector3::z(), 0.0, 1.0);
        let a = Point3::new(0.0, 0.0, 1.0);
        let b = Point3::new(2.0, 0.0, -1.0);
        let p = q.optimal_point(&a, &b);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_quadric_is_free() {
        let q = Quadric::zero();
        assert_eq!(q.eval(&Point3::new(1.0, 2.0, 3.0)), 0.0);
    }
}
