//! Symmetric traceless 2x2 tensors.
//!
//! A tensor `R * [[cos 2θ, sin 2θ], [sin 2θ, -cos 2θ]]` is stored as the
//! magnitude `R` and the pair `(cos 2θ, sin 2θ)`. Its major eigenvector points
//! along θ and the minor one along θ + π/2; both are sign-ambiguous.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::geometry::{Vector, EPSILON};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tensor {
    r: f64,
    m: [f64; 2],
}

impl Tensor {
    /// Degenerate tensor with no preferred direction.
    pub fn zero() -> Self {
        Self { r: 0.0, m: [0.0, 0.0] }
    }

    /// Unit tensor whose major eigenvector points along `angle`.
    pub fn from_angle(angle: f64) -> Self {
        let (sin, cos) = (2.0 * angle).sin_cos();
        Self { r: 1.0, m: [cos, sin] }
    }

    /// Tensor whose major eigenvector is parallel to `v`, weighted by `|v|^2`.
    pub fn from_vector(v: Vector) -> Self {
        let t1 = v.x * v.x - v.y * v.y;
        let t2 = 2.0 * v.x * v.y;
        let r = t1.hypot(t2);
        if r < EPSILON {
            return Self::zero();
        }
        Self { r, m: [t1 / r, t2 / r] }
    }

    pub fn magnitude(&self) -> f64 {
        self.r
    }

    pub fn is_degenerate(&self) -> bool {
        self.r < EPSILON
    }

    pub fn scale(&self, s: f64) -> Self {
        Self { r: self.r * s, m: self.m }
    }

    /// Component-wise sum, renormalised so the direction pair stays unit length.
    pub fn add(&self, other: &Tensor) -> Self {
        let m0 = self.m[0] * self.r + other.m[0] * other.r;
        let m1 = self.m[1] * self.r + other.m[1] * other.r;
        let r = m0.hypot(m1);
        if r < EPSILON || !r.is_finite() {
            return Self::zero();
        }
        Self { r, m: [m0 / r, m1 / r] }
    }

    /// Angle of the major eigenvector in `(-π/2, π/2]`.
    pub fn theta(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        self.m[1].atan2(self.m[0]) / 2.0
    }

    pub fn rotate(&self, angle: f64) -> Self {
        if self.is_degenerate() {
            return *self;
        }
        let mut theta = self.theta() + angle;
        while theta < 0.0 {
            theta += PI;
        }
        while theta >= PI {
            theta -= PI;
        }
        let (sin, cos) = (2.0 * theta).sin_cos();
        Self { r: self.r, m: [cos, sin] }
    }

    pub fn major(&self) -> Option<Vector> {
        if self.is_degenerate() {
            return None;
        }
        Some(Vector::from_angle(self.theta()))
    }

    pub fn minor(&self) -> Option<Vector> {
        if self.is_degenerate() {
            return None;
        }
        Some(Vector::from_angle(self.theta() + FRAC_PI_2))
    }

    /// Major or minor eigenvector depending on `major`.
    pub fn eigenvector(&self, major: bool) -> Option<Vector> {
        if major {
            self.major()
        } else {
            self.minor()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parallel(a: Vector, b: Vector) -> bool {
        a.cross(b).abs() < 1e-9
    }

    #[test]
    fn test_from_angle_eigenvectors() {
        let t = Tensor::from_angle(0.3);
        let major = t.major().unwrap();
        let minor = t.minor().unwrap();
        assert!(parallel(major, Vector::from_angle(0.3)));
        assert!(major.dot(minor).abs() < 1e-9);
    }

    #[test]
    fn test_opposite_tensors_cancel() {
        let a = Tensor::from_angle(0.0);
        let b = Tensor::from_angle(FRAC_PI_2);
        let sum = a.add(&b);
        assert!(sum.is_degenerate());
        assert!(sum.major().is_none());
    }

    #[test]
    fn test_add_averages_directions() {
        let a = Tensor::from_angle(0.0);
        let b = Tensor::from_angle(0.4);
        let sum = a.add(&b);
        assert!((sum.theta() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_and_from_vector() {
        let t = Tensor::from_vector(Vector::new(0.0, 2.0));
        assert!(parallel(t.major().unwrap(), Vector::new(0.0, 1.0)));
        let rotated = Tensor::from_angle(0.0).rotate(FRAC_PI_2);
        assert!(parallel(rotated.major().unwrap(), Vector::new(0.0, 1.0)));
        assert!(Tensor::zero().rotate(1.0).is_degenerate());
    }
}
