//! Seed management for city generation
//!
//! Every randomised system gets its own seed derived from the master seed, so
//! changing how often one stage draws numbers does not reshuffle the others.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Seeds for all city generation systems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitySeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Basis field placement, streamline seeding, park and lot choices
    pub layout: u64,
    /// Park angular noise of the tensor field
    pub field_noise: u64,
    /// Global angular noise of the tensor field
    pub global_noise: u64,
    /// Coastline perturbation noise
    pub coast_noise: u64,
    /// River perturbation noise
    pub river_noise: u64,
    /// Street name syllables
    pub names: u64,
}

impl CitySeeds {
    /// Create seeds from a master seed, deriving all sub-seeds deterministically.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            layout: derive_seed(master, "layout"),
            field_noise: derive_seed(master, "field_noise"),
            global_noise: derive_seed(master, "global_noise"),
            coast_noise: derive_seed(master, "coast_noise"),
            river_noise: derive_seed(master, "river_noise"),
            names: derive_seed(master, "names"),
        }
    }

    /// Seeds from a user-facing seed string such as `"42"` or `"test-1"`.
    pub fn from_str_seed(seed: &str) -> Self {
        Self::from_master(seed_from_str(seed))
    }
}

/// Numeric strings are used verbatim, anything else is hashed.
pub fn seed_from_str(seed: &str) -> u64 {
    let trimmed = seed.trim();
    match trimmed.parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            let mut hasher = DefaultHasher::new();
            trimmed.hash(&mut hasher);
            hasher.finish()
        }
    }
}

/// Derive a sub-seed from a master seed and a system name.
fn derive_seed(master: u64, system: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    system.hash(&mut hasher);
    hasher.finish()
}

/// Noise seeds are `u32` in the `noise` crate.
pub fn noise_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

impl std::fmt::Display for CitySeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CitySeeds {{ master: {}, layout: {}, field_noise: {}, global_noise: {}, coast_noise: {}, \
             river_noise: {}, names: {} }}",
            self.master,
            self.layout,
            self.field_noise,
            self.global_noise,
            self.coast_noise,
            self.river_noise,
            self.names,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        let seeds1 = CitySeeds::from_master(12345);
        let seeds2 = CitySeeds::from_master(12345);
        assert_eq!(seeds1, seeds2);
    }

    #[test]
    fn test_different_systems_get_different_seeds() {
        let seeds = CitySeeds::from_master(12345);
        assert_ne!(seeds.layout, seeds.field_noise);
        assert_ne!(seeds.field_noise, seeds.global_noise);
        assert_ne!(seeds.coast_noise, seeds.river_noise);
        assert_ne!(seeds.layout, seeds.names);
    }

    #[test]
    fn test_string_seeds() {
        assert_eq!(seed_from_str("42"), 42);
        assert_eq!(seed_from_str(" 42 "), 42);
        assert_eq!(seed_from_str("test-1"), seed_from_str("test-1"));
        assert_ne!(seed_from_str("test-1"), seed_from_str("test-2"));
    }
}
