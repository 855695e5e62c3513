//! Tensor field guiding road directions.
//!
//! The field is the weighted sum of basis fields, with optional angular noise
//! inside parks and across the whole map. Land is everything outside the sea
//! polygon and the river polygon.

pub mod basis;
pub mod integrator;
pub mod tensor;

pub use basis::{BasisField, BasisKind};
pub use integrator::{EulerIntegrator, FieldIntegrator, Integrator, IntegratorKind, Rk4Integrator};
pub use tensor::Tensor;

use noise::{NoiseFn, Perlin, Seedable};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, Vector};
use crate::polygon::contains_point;

/// Angular noise applied to the field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Rotate the whole field by global noise
    pub global_noise: bool,
    /// Noise wavelength inside parks (world units)
    pub park_noise_size: f64,
    /// Maximum park rotation (degrees)
    pub park_noise_angle: f64,
    pub global_noise_size: f64,
    /// Maximum global rotation (degrees)
    pub global_noise_angle: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            global_noise: false,
            park_noise_size: 20.0,
            park_noise_angle: 90.0,
            global_noise_size: 30.0,
            global_noise_angle: 20.0,
        }
    }
}

/// Placement of the default basis fields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldParams {
    /// Grid fields sit at the corners of a centred rectangle this fraction of
    /// the world
    pub spawn_scale: f64,
    /// Upper bound of the random basis field decay
    pub max_decay: f64,
    /// Number of randomly placed radial fields
    pub radial_fields: usize,
    /// Smooth basis falloff (never reaches zero)
    pub smooth: bool,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            spawn_scale: 0.7,
            max_decay: 50.0,
            radial_fields: 1,
            smooth: false,
        }
    }
}

pub struct VectorField {
    basis_fields: Vec<BasisField>,
    noise: NoiseParams,
    smooth: bool,
    perlin: Perlin,
    global_perlin: Perlin,
    global_seed: u32,
    /// Sea polygon; empty until the coastline has been traced
    pub sea: Vec<Vector>,
    /// River polygon; empty until the river has been traced
    pub river: Vec<Vector>,
    pub parks: Vec<Vec<Vector>>,
    /// Treat the river as land, so main roads bridge it
    pub ignore_river: bool,
}

impl VectorField {
    /// `seed` drives park noise. Global noise starts from a neighbouring seed
    /// and can be reseeded with [`VectorField::set_global_noise_seed`].
    pub fn new(noise: NoiseParams, seed: u32, smooth: bool) -> Self {
        let global_seed = seed.wrapping_add(1);
        Self {
            basis_fields: Vec::new(),
            noise,
            smooth,
            perlin: Perlin::new(1).set_seed(seed),
            global_perlin: Perlin::new(1).set_seed(global_seed),
            global_seed,
            sea: Vec::new(),
            river: Vec::new(),
            parks: Vec::new(),
            ignore_river: false,
        }
    }

    /// Four grids around a centred sub-rectangle plus randomly placed radials.
    pub fn with_default_layout<R: Rng>(
        bounds: &Bounds,
        layout: &FieldParams,
        noise: NoiseParams,
        seed: u32,
        rng: &mut R,
    ) -> Self {
        let mut field = Self::new(noise, seed, layout.smooth);
        let size = bounds.size;
        let span = size * layout.spawn_scale;
        let origin = bounds.origin + (size - span) * 0.5;
        let max_decay = layout.max_decay.max(0.0);

        let corners = [
            origin,
            origin + Vector::new(span.x, 0.0),
            origin + Vector::new(0.0, span.y),
            origin + span,
        ];
        for corner in corners {
            let grid_size = rng.gen_range(size.x / 4.0..size.x);
            let decay = rng.gen_range(0.0..=max_decay);
            let theta = rng.gen_range(0.0..std::f64::consts::FRAC_PI_2);
            field.add_grid(corner, grid_size, decay, theta);
        }

        for _ in 0..layout.radial_fields {
            let center = origin + Vector::new(rng.gen::<f64>() * span.x, rng.gen::<f64>() * span.y);
            let radial_size = rng.gen_range(size.x / 10.0..size.x / 5.0);
            let decay = rng.gen_range(0.0..=max_decay);
            field.add_radial(center, radial_size, decay);
        }

        field
    }

    pub fn add_grid(&mut self, center: Vector, size: f64, decay: f64, theta: f64) {
        self.basis_fields.push(BasisField::grid(center, size, decay, theta));
    }

    pub fn add_radial(&mut self, center: Vector, size: f64, decay: f64) {
        self.basis_fields.push(BasisField::radial(center, size, decay));
    }

    pub fn basis_fields(&self) -> &[BasisField] {
        &self.basis_fields
    }

    pub fn noise_params(&self) -> &NoiseParams {
        &self.noise
    }

    pub fn enable_global_noise(&mut self, angle: f64, size: f64) {
        self.noise.global_noise = true;
        self.noise.global_noise_angle = angle;
        self.noise.global_noise_size = size;
    }

    pub fn set_noise_params(&mut self, noise: NoiseParams) {
        self.noise = noise;
    }

    /// Reseeds only the global noise; park noise keeps its seed.
    pub fn set_global_noise_seed(&mut self, seed: u32) {
        self.global_seed = seed;
        self.global_perlin = Perlin::new(1).set_seed(seed);
    }

    pub fn global_noise_seed(&self) -> u32 {
        self.global_seed
    }

    /// Tensor at `point`. Zero off land.
    pub fn sample(&self, point: Vector) -> Tensor {
        if !self.on_land(point) {
            return Tensor::zero();
        }

        let mut tensor = if self.basis_fields.is_empty() {
            Tensor::from_angle(0.0)
        } else {
            let sum = self
                .basis_fields
                .iter()
                .fold(Tensor::zero(), |acc, f| acc.add(&f.weighted_tensor(point, self.smooth)));
            if sum.is_degenerate() {
                Tensor::from_angle(0.0)
            } else {
                sum
            }
        };

        if self.in_parks(point) {
            tensor = tensor.rotate(rotational_noise(
                &self.perlin,
                point,
                self.noise.park_noise_size,
                self.noise.park_noise_angle,
            ));
        }

        if self.noise.global_noise {
            tensor = tensor.rotate(rotational_noise(
                &self.global_perlin,
                point,
                self.noise.global_noise_size,
                self.noise.global_noise_angle,
            ));
        }

        tensor
    }

    pub fn on_land(&self, point: Vector) -> bool {
        if contains_point(&self.sea, point) {
            return false;
        }
        if !self.ignore_river && contains_point(&self.river, point) {
            return false;
        }
        true
    }

    pub fn in_parks(&self, point: Vector) -> bool {
        self.parks.iter().any(|park| contains_point(park, point))
    }
}

/// Rotation in radians from coherent noise, within `[-angle, angle]` degrees.
fn rotational_noise(perlin: &Perlin, point: Vector, size: f64, angle_degrees: f64) -> f64 {
    let size = size.max(1e-6);
    perlin.get([point.x / size, point.y / size]) * angle_degrees.to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square(min: f64, max: f64) -> Vec<Vector> {
        vec![
            Vector::new(min, min),
            Vector::new(max, min),
            Vector::new(max, max),
            Vector::new(min, max),
        ]
    }

    #[test]
    fn test_empty_field_is_canonical_grid() {
        let field = VectorField::new(NoiseParams::default(), 3, false);
        let major = field.sample(Vector::new(12.0, 7.0)).major().unwrap();
        assert!((major.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_land_excludes_sea_and_river() {
        let mut field = VectorField::new(NoiseParams::default(), 3, false);
        field.sea = square(0.0, 10.0);
        field.river = square(20.0, 30.0);
        assert!(!field.on_land(Vector::new(5.0, 5.0)));
        assert!(!field.on_land(Vector::new(25.0, 25.0)));
        assert!(field.on_land(Vector::new(15.0, 15.0)));
        assert!(field.sample(Vector::new(5.0, 5.0)).is_degenerate());

        field.ignore_river = true;
        assert!(field.on_land(Vector::new(25.0, 25.0)));
    }

    #[test]
    fn test_park_noise_only_inside_parks() {
        let mut field = VectorField::new(NoiseParams::default(), 11, false);
        field.add_grid(Vector::ZERO, 1000.0, 0.0, 0.0);
        field.parks.push(square(0.0, 100.0));

        let outside = field.sample(Vector::new(150.3, 150.7));
        assert!(outside.theta().abs() < 1e-9);

        let rotated = (0..20)
            .map(|i| field.sample(Vector::new(3.3 + i as f64 * 4.1, 50.7)).theta())
            .any(|theta| theta.abs() > 1e-6);
        assert!(rotated);
    }

    #[test]
    fn test_default_layout() {
        let bounds = Bounds::new(Vector::ZERO, Vector::new(800.0, 800.0));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let field = VectorField::with_default_layout(
            &bounds,
            &FieldParams::default(),
            NoiseParams::default(),
            42,
            &mut rng,
        );
        let fields = field.basis_fields();
        assert_eq!(fields.len(), 5);
        let grids = fields
            .iter()
            .filter(|f| matches!(f.kind, BasisKind::Grid { .. }))
            .count();
        assert_eq!(grids, 4);
        assert!(fields[0].center.distance_to(Vector::new(120.0, 120.0)) < 1e-6);
        assert!(fields.iter().all(|f| bounds.contains(f.center)));
    }

    #[test]
    fn test_global_noise_independent_of_park_noise() {
        let noise = NoiseParams {
            park_noise_size: 30.0,
            park_noise_angle: 20.0,
            ..NoiseParams::default()
        };
        let mut park_field = VectorField::new(noise, 17, false);
        park_field.parks.push(vec![
            Vector::new(-1000.0, -1000.0),
            Vector::new(1000.0, -1000.0),
            Vector::new(1000.0, 1000.0),
            Vector::new(-1000.0, 1000.0),
        ]);
        let mut global_field = VectorField::new(noise, 17, false);
        global_field.enable_global_noise(20.0, 30.0);
        assert_ne!(global_field.global_noise_seed(), 17);

        let differs = (0..20)
            .map(|i| Vector::new(3.3 + i as f64 * 7.9, 41.7 + i as f64 * 2.3))
            .any(|p| (park_field.sample(p).theta() - global_field.sample(p).theta()).abs() > 1e-6);
        assert!(differs);

        global_field.set_global_noise_seed(99);
        assert_eq!(global_field.global_noise_seed(), 99);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let make = || {
            let mut field = VectorField::new(NoiseParams::default(), 9, false);
            field.add_radial(Vector::new(50.0, 50.0), 200.0, 1.0);
            field.enable_global_noise(20.0, 30.0);
            field
        };
        let a = make();
        let b = make();
        let p = Vector::new(71.3, 12.9);
        assert_eq!(a.sample(p), b.sample(p));
    }
}
