//! Coastline and river tracing.
//!
//! Water is traced as two long noisy streamlines that must cross the whole
//! map. The coastline cuts the world rectangle into land and sea; the river
//! follows the other eigenvector family and is flanked by two bank roads.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Streamline, StreamlineGenerator, StreamlineParams};
use crate::field::{FieldIntegrator, Integrator, VectorField};
use crate::geometry::{Bounds, Vector};
use crate::polygon::{
    buffer_polyline, complexify, contains_point, offset_polyline, simplify, slice_rectangle,
};

/// Attempts at tracing a line that reaches the map edges.
const WATER_TRIES: usize = 100;

/// Global noise applied while a water line is traced.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterNoiseParams {
    pub noise_enabled: bool,
    pub noise_size: f64,
    /// Degrees
    pub noise_angle: f64,
}

impl Default for WaterNoiseParams {
    fn default() -> Self {
        Self {
            noise_enabled: true,
            noise_size: 30.0,
            noise_angle: 20.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterParams {
    pub streamline: StreamlineParams,
    pub coast_noise: WaterNoiseParams,
    pub river_noise: WaterNoiseParams,
    /// Distance from the river centre line to each bank road
    pub river_size: f64,
    /// Strip between the bank road and the water
    pub river_bank_size: f64,
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            streamline: StreamlineParams::water(),
            coast_noise: WaterNoiseParams::default(),
            river_noise: WaterNoiseParams::default(),
            river_size: 30.0,
            river_bank_size: 10.0,
        }
    }
}

pub struct WaterGenerator<I: FieldIntegrator = Integrator> {
    generator: StreamlineGenerator<I>,
    params: WaterParams,
    coast_major: bool,
    coastline: Vec<Vector>,
    coast_road: Vec<Vector>,
    sea_polygon: Vec<Vector>,
    river: Vec<Vector>,
    river_polygon: Vec<Vector>,
    river_road: Vec<Vector>,
    river_secondary_road: Vec<Vector>,
}

impl<I: FieldIntegrator> WaterGenerator<I> {
    pub fn new(integrator: I, world: Bounds, params: WaterParams, seed: u64) -> Self {
        Self {
            generator: StreamlineGenerator::new(integrator, world, params.streamline, seed),
            params,
            coast_major: true,
            coastline: Vec::new(),
            coast_road: Vec::new(),
            sea_polygon: Vec::new(),
            river: Vec::new(),
            river_polygon: Vec::new(),
            river_road: Vec::new(),
            river_secondary_road: Vec::new(),
        }
    }

    /// Underlying generator holding the water roads, for seeding later tiers.
    pub fn generator(&self) -> &StreamlineGenerator<I> {
        &self.generator
    }

    pub fn coast_major(&self) -> bool {
        self.coast_major
    }

    /// Raw traced coastline.
    pub fn coastline(&self) -> &[Vector] {
        &self.coastline
    }

    /// Simplified road running along the coast.
    pub fn coast_road(&self) -> &[Vector] {
        &self.coast_road
    }

    pub fn sea_polygon(&self) -> &[Vector] {
        &self.sea_polygon
    }

    /// Raw traced river centre line.
    pub fn river(&self) -> &[Vector] {
        &self.river
    }

    pub fn river_polygon(&self) -> &[Vector] {
        &self.river_polygon
    }

    /// Simplified bank road on the left of the river.
    pub fn river_road(&self) -> &[Vector] {
        &self.river_road
    }

    /// Simplified bank road on the far side of the river.
    pub fn river_secondary_road(&self) -> &[Vector] {
        &self.river_secondary_road
    }

    pub fn streamlines(&self) -> &[Streamline] {
        self.generator.streamlines()
    }

    /// Traces the coastline and installs the sea polygon on the field.
    pub fn create_coast(&mut self, field: &mut VectorField, noise_seed: u32) {
        let saved_noise = *field.noise_params();
        let saved_seed = field.global_noise_seed();
        let noise = self.params.coast_noise;
        if noise.noise_enabled {
            field.set_global_noise_seed(noise_seed);
            field.enable_global_noise(noise.noise_angle, noise.noise_size);
        }

        let traced = self.trace_to_edges(field, None);
        field.set_noise_params(saved_noise);
        field.set_global_noise_seed(saved_seed);

        let (line, major) = match traced {
            Some(t) => t,
            None => {
                log::warn!("No coastline could be traced");
                return;
            }
        };

        let road = simplify(&line, self.params.streamline.simplify_tolerance);
        self.sea_polygon = slice_rectangle(&self.generator.world, &road).unwrap_or_default();
        field.sea = self.sea_polygon.clone();
        log::debug!(
            "Coastline traced: {} points, sea polygon of {} vertices",
            line.len(),
            self.sea_polygon.len()
        );

        let complex = complexify(&road, self.params.streamline.dstep);
        self.generator.grid_mut(major).add_polyline(&complex);
        self.generator.streamlines.push(Streamline { points: complex, major });
        self.generator.simplified.push(road.clone());

        self.coast_major = major;
        self.coastline = line;
        self.coast_road = road;
    }

    /// Traces the river in the family opposite the coast, ignoring the sea
    /// while tracing, then builds its polygon and bank roads.
    pub fn create_river(&mut self, field: &mut VectorField, noise_seed: u32) {
        let saved_noise = *field.noise_params();
        let saved_seed = field.global_noise_seed();
        let saved_sea = std::mem::take(&mut field.sea);
        let noise = self.params.river_noise;
        if noise.noise_enabled {
            field.set_global_noise_seed(noise_seed);
            field.enable_global_noise(noise.noise_angle, noise.noise_size);
        }

        let major = !self.coast_major;
        let traced = self.trace_to_edges(field, Some(major));
        field.sea = saved_sea;
        field.set_noise_params(saved_noise);
        field.set_global_noise_seed(saved_seed);

        let river = match traced {
            Some((line, _)) => line,
            None => {
                log::warn!("No river could be traced");
                return;
            }
        };

        let world = self.generator.world;
        let dstep = self.params.streamline.dstep;
        let tolerance = self.params.streamline.simplify_tolerance;
        let river_size = self.params.river_size;

        self.river_polygon =
            buffer_polyline(&river, (river_size - self.params.river_bank_size).max(0.0));

        let sea = &self.sea_polygon;
        let keep = |p: &Vector| !contains_point(sea, *p) && !world.is_outside(*p);
        let road1: Vec<Vector> = complexify(&offset_polyline(&river, river_size), dstep)
            .into_iter()
            .filter(keep)
            .collect();
        let road2: Vec<Vector> = complexify(&offset_polyline(&river, -river_size), dstep)
            .into_iter()
            .filter(keep)
            .collect();
        self.river = river;

        if road1.len() < 2 || road2.len() < 2 {
            log::warn!("River banks lie entirely in the sea or off the map");
            field.river = self.river_polygon.clone();
            return;
        }

        let road1_simple = simplify(&road1, tolerance);
        let road2_simple = simplify(&road2, tolerance);

        let mut ring = road1_simple.clone();
        ring.extend(road2_simple.iter().rev());
        field.river = ring;

        self.generator.grid_mut(major).add_polyline(&road1);
        self.generator.grid_mut(major).add_polyline(&road2);
        self.generator.streamlines.push(Streamline { points: road1, major });
        self.generator.simplified.push(road1_simple.clone());
        self.generator.streamlines.push(Streamline { points: road2, major });
        self.generator.simplified.push(road2_simple.clone());

        self.river_road = road1_simple;
        self.river_secondary_road = road2_simple;
    }

    /// Up to `WATER_TRIES` traces, keeping the first that reaches the map
    /// edges at both ends, or the last one traced. A `None` family picks one
    /// at random per attempt.
    fn trace_to_edges(
        &mut self,
        field: &VectorField,
        family: Option<bool>,
    ) -> Option<(Vec<Vector>, bool)> {
        let dstep = self.params.streamline.dstep;
        let mut last = None;
        for _ in 0..WATER_TRIES {
            let major = family.unwrap_or_else(|| self.generator.rng.gen_bool(0.5));
            let seed = match self.generator.get_seed(field, major) {
                Some(seed) => seed,
                None => continue,
            };
            let line = extend_streamline(
                self.generator.integrate_streamline(field, seed, major),
                dstep * 5.0,
            );
            if self.reaches_edges(&line) {
                return Some((line, major));
            }
            if line.len() >= 2 {
                last = Some((line, major));
            }
        }
        log::warn!("Water line never reached the map edges after {} tries", WATER_TRIES);
        last
    }

    fn reaches_edges(&self, line: &[Vector]) -> bool {
        match (line.first(), line.last()) {
            (Some(first), Some(last)) if line.len() >= 2 => {
                self.generator.world.is_outside(*first) && self.generator.world.is_outside(*last)
            }
            _ => false,
        }
    }
}

/// Pushes both ends of a polyline outwards by `distance`.
fn extend_streamline(mut line: Vec<Vector>, distance: f64) -> Vec<Vector> {
    if line.len() < 2 {
        return line;
    }
    let first = line[0] + (line[0] - line[1]).set_length(distance);
    let n = line.len();
    let last = line[n - 1] + (line[n - 1] - line[n - 2]).set_length(distance);
    line.insert(0, first);
    line.push(last);
    line
}
