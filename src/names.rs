//! Street naming
//!
//! Every committed road gets a unique base name built from syllables plus a
//! suffix for its tier ("Avenue" for main roads, "Street" for minor ones).

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};

/// Attempts at drawing an unused base name before giving up.
const NAME_ATTEMPTS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoadTier {
    Coastline,
    Riverside,
    Main,
    Major,
    Minor,
}

impl RoadTier {
    pub fn suffix(&self) -> &'static str {
        match self {
            RoadTier::Coastline => "Esplanade",
            RoadTier::Riverside => "Embankment",
            RoadTier::Main => "Avenue",
            RoadTier::Major => "Road",
            RoadTier::Minor => "Street",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoadTier::Coastline => "coastline",
            RoadTier::Riverside => "riverside",
            RoadTier::Main => "main",
            RoadTier::Major => "major",
            RoadTier::Minor => "minor",
        }
    }
}

impl std::fmt::Display for RoadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Hands out unique street names up to a fixed capacity.
pub struct StreetNamePool {
    rng: ChaCha8Rng,
    capacity: usize,
    issued: BTreeSet<String>,
}

impl StreetNamePool {
    pub fn new(seed: u64, capacity: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            capacity,
            issued: BTreeSet::new(),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    /// Next unused name for a road of `tier`.
    pub fn next_name(&mut self, tier: RoadTier) -> Result<String> {
        if self.issued.len() >= self.capacity {
            return Err(self.exhausted(tier));
        }
        for _ in 0..NAME_ATTEMPTS {
            let base = base_name(&mut self.rng);
            if self.issued.insert(base.clone()) {
                return Ok(format!("{} {}", base, tier.suffix()));
            }
        }
        Err(self.exhausted(tier))
    }

    fn exhausted(&self, tier: RoadTier) -> CityError {
        CityError::NamePoolExhausted {
            capacity: self.capacity,
            tier: tier.label().to_string(),
        }
    }
}

fn base_name(rng: &mut ChaCha8Rng) -> String {
    let first = pick(rng, &[
        "Ash", "Bel", "Bram", "Cal", "Dun", "Elm", "Fair", "Glen", "Hal", "Hart",
        "Kings", "Lang", "Mar", "Nor", "Oak", "Pen", "Queen", "Ral", "Stan", "Thorn",
        "Wal", "Wes", "Wick", "York", "Brad", "Chester", "Dal", "Mel", "Rose", "Sel",
    ]);
    let middle = if rng.gen_bool(0.3) {
        pick(rng, &["a", "e", "in", "er", "ing", "ton", "ly", "ow"])
    } else {
        ""
    };
    let last = pick(rng, &[
        "ford", "field", "wood", "bury", "ley", "more", "dale", "brook", "worth", "ham",
        "stead", "well", "gate", "mere", "combe", "by", "wick", "ridge", "holt", "croft",
    ]);
    format!("{}{}{}", first, middle, last)
}

fn pick<'a>(rng: &mut ChaCha8Rng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_and_suffixed() {
        let mut pool = StreetNamePool::new(42, 200);
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            let name = pool.next_name(RoadTier::Minor).unwrap();
            assert!(name.ends_with(" Street"));
            assert!(seen.insert(name));
        }
        assert_eq!(pool.issued(), 200);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = StreetNamePool::new(1, 2);
        pool.next_name(RoadTier::Main).unwrap();
        pool.next_name(RoadTier::Major).unwrap();
        match pool.next_name(RoadTier::Minor) {
            Err(CityError::NamePoolExhausted { capacity, tier }) => {
                assert_eq!(capacity, 2);
                assert_eq!(tier, "minor");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_same_seed_same_names() {
        let mut a = StreetNamePool::new(9, 10);
        let mut b = StreetNamePool::new(9, 10);
        for _ in 0..10 {
            assert_eq!(a.next_name(RoadTier::Main).unwrap(), b.next_name(RoadTier::Main).unwrap());
        }
    }
}
