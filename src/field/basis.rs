//! Basis fields: localised tensor contributions summed by the vector field.

use serde::{Deserialize, Serialize};

use super::tensor::Tensor;
use crate::geometry::{Vector, EPSILON};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BasisKind {
    /// Uniform orthogonal grid rotated by `theta` radians.
    Grid { theta: f64 },
    /// Concentric rings around the centre.
    Radial,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasisField {
    pub center: Vector,
    pub size: f64,
    pub decay: f64,
    pub kind: BasisKind,
}

impl BasisField {
    pub fn grid(center: Vector, size: f64, decay: f64, theta: f64) -> Self {
        Self { center, size, decay, kind: BasisKind::Grid { theta } }
    }

    pub fn radial(center: Vector, size: f64, decay: f64) -> Self {
        Self { center, size, decay, kind: BasisKind::Radial }
    }

    /// Unweighted tensor of this field at `point`.
    pub fn tensor(&self, point: Vector) -> Tensor {
        match self.kind {
            BasisKind::Grid { theta } => Tensor::from_angle(theta),
            BasisKind::Radial => {
                let t = point - self.center;
                if t.length_sq() < EPSILON {
                    return Tensor::zero();
                }
                Tensor::from_angle(t.angle() + std::f64::consts::FRAC_PI_2)
            }
        }
    }

    /// Falloff with normalised distance `d = |p - center| / size`.
    ///
    /// Smooth fields never reach zero (`d^-decay`). Otherwise the weight is
    /// `(1 - d)^decay`, zero from `d = 1` on.
    pub fn weight(&self, point: Vector, smooth: bool) -> f64 {
        let d = point.distance_to(self.center) / self.size.max(EPSILON);
        if smooth {
            return d.max(EPSILON).powf(-self.decay);
        }
        if d >= 1.0 {
            return 0.0;
        }
        (1.0 - d).powf(self.decay)
    }

    pub fn weighted_tensor(&self, point: Vector, smooth: bool) -> Tensor {
        self.tensor(point).scale(self.weight(point, smooth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_falloff() {
        let field = BasisField::grid(Vector::ZERO, 10.0, 2.0, 0.0);
        assert_eq!(field.weight(Vector::ZERO, false), 1.0);
        assert!((field.weight(Vector::new(5.0, 0.0), false) - 0.25).abs() < 1e-12);
        assert_eq!(field.weight(Vector::new(10.0, 0.0), false), 0.0);
        assert_eq!(field.weight(Vector::new(20.0, 0.0), false), 0.0);
        assert!(field.weight(Vector::new(20.0, 0.0), true) > 0.0);
    }

    #[test]
    fn test_zero_decay_is_flat_inside_size() {
        let field = BasisField::grid(Vector::ZERO, 10.0, 0.0, 0.0);
        assert_eq!(field.weight(Vector::new(9.0, 0.0), false), 1.0);
        assert_eq!(field.weight(Vector::new(11.0, 0.0), false), 0.0);
    }

    #[test]
    fn test_radial_is_tangential() {
        let field = BasisField::radial(Vector::ZERO, 100.0, 1.0);
        let major = field.tensor(Vector::new(10.0, 0.0)).major().unwrap();
        assert!(major.x.abs() < 1e-9);
        assert!((major.y.abs() - 1.0).abs() < 1e-9);
    }
}
