//! Field integrators: turn tensor samples into a unit step direction.
//!
//! Eigenvectors carry no sign, so every sample is flipped to agree with a
//! reference direction before the samples are combined.

use serde::{Deserialize, Serialize};

use super::VectorField;
use crate::geometry::Vector;

/// Which integrator a streamline generator traces with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorKind {
    #[default]
    Rk4,
    Euler,
}

pub trait FieldIntegrator {
    /// Unit direction to step in from `point`, following the major or minor
    /// eigenvector field. `None` when any sample is degenerate.
    fn integrate(
        &self,
        field: &VectorField,
        point: Vector,
        previous: Option<Vector>,
        major: bool,
    ) -> Option<Vector>;
}

/// Eigenvector at `point`, oriented to agree with `reference` when given.
fn sample_aligned(
    field: &VectorField,
    point: Vector,
    reference: Option<Vector>,
    major: bool,
) -> Option<Vector> {
    let v = field.sample(point).eigenvector(major)?;
    match reference {
        Some(r) if v.dot(r) < 0.0 => Some(-v),
        _ => Some(v),
    }
}

/// Single sample at the current point.
#[derive(Clone, Copy, Debug, Default)]
pub struct EulerIntegrator;

impl FieldIntegrator for EulerIntegrator {
    fn integrate(
        &self,
        field: &VectorField,
        point: Vector,
        previous: Option<Vector>,
        major: bool,
    ) -> Option<Vector> {
        sample_aligned(field, point, previous, major)
    }
}

/// Classic fourth-order Runge-Kutta over `step`-sized increments.
#[derive(Clone, Copy, Debug)]
pub struct Rk4Integrator {
    pub step: f64,
}

impl Rk4Integrator {
    pub fn new(step: f64) -> Self {
        Self { step }
    }
}

impl FieldIntegrator for Rk4Integrator {
    fn integrate(
        &self,
        field: &VectorField,
        point: Vector,
        previous: Option<Vector>,
        major: bool,
    ) -> Option<Vector> {
        let h = self.step;
        let k1 = sample_aligned(field, point, previous, major)?;
        let k2 = sample_aligned(field, point + k1 * (h / 2.0), Some(k1), major)?;
        let k3 = sample_aligned(field, point + k2 * (h / 2.0), Some(k1), major)?;
        let k4 = sample_aligned(field, point + k3 * h, Some(k1), major)?;

        let sum = k1 + k2 * 2.0 + k3 * 2.0 + k4;
        let dir = sum.normalize();
        if dir == Vector::ZERO {
            None
        } else {
            Some(dir)
        }
    }
}

/// Integrator chosen at runtime from configuration.
#[derive(Clone, Copy, Debug)]
pub enum Integrator {
    Rk4(Rk4Integrator),
    Euler(EulerIntegrator),
}

impl Integrator {
    pub fn new(kind: IntegratorKind, step: f64) -> Self {
        match kind {
            IntegratorKind::Rk4 => Integrator::Rk4(Rk4Integrator::new(step)),
            IntegratorKind::Euler => Integrator::Euler(EulerIntegrator),
        }
    }
}

impl FieldIntegrator for Integrator {
    fn integrate(
        &self,
        field: &VectorField,
        point: Vector,
        previous: Option<Vector>,
        major: bool,
    ) -> Option<Vector> {
        match self {
            Integrator::Rk4(i) => i.integrate(field, point, previous, major),
            Integrator::Euler(i) => i.integrate(field, point, previous, major),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::NoiseParams;

    fn grid_field(theta: f64) -> VectorField {
        let mut field = VectorField::new(NoiseParams::default(), 1, false);
        field.add_grid(Vector::new(50.0, 50.0), 1000.0, 0.0, theta);
        field
    }

    #[test]
    fn test_rk4_follows_grid() {
        let field = grid_field(0.0);
        let rk4 = Rk4Integrator::new(1.0);
        let major = rk4.integrate(&field, Vector::new(10.0, 10.0), None, true).unwrap();
        assert!((major.x.abs() - 1.0).abs() < 1e-9);
        let minor = rk4.integrate(&field, Vector::new(10.0, 10.0), None, false).unwrap();
        assert!((minor.y.abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sign_follows_previous_direction() {
        let field = grid_field(0.0);
        let rk4 = Rk4Integrator::new(1.0);
        let back = rk4
            .integrate(&field, Vector::new(10.0, 10.0), Some(Vector::new(-1.0, 0.1)), true)
            .unwrap();
        assert!(back.x < 0.0);
        let forward = EulerIntegrator
            .integrate(&field, Vector::new(10.0, 10.0), Some(Vector::new(1.0, 0.1)), true)
            .unwrap();
        assert!(forward.x > 0.0);
    }

    #[test]
    fn test_off_land_is_degenerate() {
        let mut field = grid_field(0.0);
        field.sea = vec![
            Vector::new(0.0, 0.0),
            Vector::new(20.0, 0.0),
            Vector::new(20.0, 20.0),
            Vector::new(0.0, 20.0),
        ];
        let rk4 = Integrator::new(IntegratorKind::Rk4, 1.0);
        assert!(rk4.integrate(&field, Vector::new(10.0, 10.0), None, true).is_none());
        assert!(rk4.integrate(&field, Vector::new(40.0, 10.0), None, true).is_some());
    }
}
