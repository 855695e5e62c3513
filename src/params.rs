//! City generation configuration
//!
//! `CityParams` gathers every tunable. All structs deserialize with
//! `#[serde(default)]`, so a JSON file only needs the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};
use crate::field::{FieldParams, IntegratorKind, NoiseParams};
use crate::polygon_finder::PolygonParams;
use crate::streamlines::{StreamlineParams, WaterParams};

/// Park selection after the major and minor road stages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkParams {
    pub num_big_parks: usize,
    pub num_small_parks: usize,
    /// Big parks are a run of adjacent faces instead of random picks
    pub cluster_big_parks: bool,
    pub polygon: PolygonParams,
}

impl Default for ParkParams {
    fn default() -> Self {
        Self {
            num_big_parks: 2,
            num_small_parks: 0,
            cluster_big_parks: false,
            polygon: PolygonParams::parks(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityParams {
    pub noise: NoiseParams,
    pub field: FieldParams,
    pub integrator: IntegratorKind,
    pub water: WaterParams,
    pub main: StreamlineParams,
    pub major: StreamlineParams,
    pub minor: StreamlineParams,
    pub parks: ParkParams,
    pub lots: PolygonParams,
    /// Maximum number of distinct street names
    pub name_pool_size: usize,
    /// Translate the finished city so its centroid sits at the origin
    pub recenter: bool,
}

impl Default for CityParams {
    fn default() -> Self {
        Self {
            noise: NoiseParams::default(),
            field: FieldParams::default(),
            integrator: IntegratorKind::Rk4,
            water: WaterParams::default(),
            main: StreamlineParams::main(),
            major: StreamlineParams::major(),
            minor: StreamlineParams::minor(),
            parks: ParkParams::default(),
            lots: PolygonParams::lots(),
            name_pool_size: 1000,
            recenter: true,
        }
    }
}

impl CityParams {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let params: CityParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Rejects non-positive distances and out-of-range probabilities.
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("water", &self.water.streamline),
            ("main", &self.main),
            ("major", &self.major),
            ("minor", &self.minor),
        ] {
            validate_streamline(name, p)?;
        }

        if self.water.river_size <= 0.0 {
            return Err(invalid("water.river_size must be positive"));
        }
        if self.water.river_bank_size < 0.0 || self.water.river_bank_size > self.water.river_size {
            return Err(invalid("water.river_bank_size must lie in [0, river_size]"));
        }
        for (name, p) in [("parks.polygon", &self.parks.polygon), ("lots", &self.lots)] {
            if p.max_length < 3 {
                return Err(invalid(&format!("{}.max_length must be at least 3", name)));
            }
            if p.min_area <= 0.0 || p.shrink_spacing < 0.0 {
                return Err(invalid(&format!("{} areas and spacing must be positive", name)));
            }
            if !(0.0..=1.0).contains(&p.chance_no_divide) {
                return Err(invalid(&format!("{}.chance_no_divide must lie in [0, 1]", name)));
            }
        }
        if !(0.0..=1.0).contains(&self.field.spawn_scale) || self.field.max_decay < 0.0 {
            return Err(invalid("field.spawn_scale must lie in [0, 1] and max_decay be non-negative"));
        }
        if self.noise.park_noise_size <= 0.0 || self.noise.global_noise_size <= 0.0 {
            return Err(invalid("noise sizes must be positive"));
        }
        Ok(())
    }
}

fn validate_streamline(name: &str, p: &StreamlineParams) -> Result<()> {
    let distances = [
        ("dsep", p.dsep),
        ("dtest", p.dtest),
        ("dstep", p.dstep),
        ("dlookahead", p.dlookahead),
        ("dcirclejoin", p.dcirclejoin),
    ];
    for (field, value) in distances {
        if !(value > 0.0) {
            return Err(invalid(&format!("{}.{} must be positive, got {}", name, field, value)));
        }
    }
    if p.simplify_tolerance < 0.0 || p.join_angle < 0.0 {
        return Err(invalid(&format!("{}: tolerances must be non-negative", name)));
    }
    if !(0.0..=1.0).contains(&p.collide_early) {
        return Err(invalid(&format!("{}.collide_early must lie in [0, 1]", name)));
    }
    if p.path_iterations == 0 || p.seed_tries == 0 {
        return Err(invalid(&format!("{}: iteration limits must be non-zero", name)));
    }
    Ok(())
}

fn invalid(msg: &str) -> CityError {
    CityError::InvalidParams(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        CityParams::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_distance() {
        let mut params = CityParams::default();
        params.minor.dstep = 0.0;
        assert!(matches!(params.validate(), Err(CityError::InvalidParams(_))));

        let mut params = CityParams::default();
        params.major.collide_early = 1.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_json_overrides() {
        let params: CityParams =
            serde_json::from_str(r#"{ "minor": { "dsep": 30.0 }, "recenter": false }"#).unwrap();
        assert_eq!(params.minor.dsep, 30.0);
        assert_eq!(params.minor.dstep, StreamlineParams::default().dstep);
        assert!(!params.recenter);
        assert_eq!(params.main, StreamlineParams::main());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("city.json");
        let mut params = CityParams::default();
        params.parks.num_big_parks = 5;
        params.save(&path).unwrap();
        let loaded = CityParams::load(&path).unwrap();
        assert_eq!(loaded, params);
    }
}
