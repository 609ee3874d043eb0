use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Result, TrainError};

/// Stream used for trainable parameter initialization.
pub const PARAMS_STREAM: &str = "params";
/// Stream used for stochastic rounding and other per-call randomness.
pub const RANDOM_STREAM: &str = "random";

/// Named randomness sources passed explicitly to layer calls.
///
/// Each stream is a seed, not a generator: `rng` builds a fresh seeded
/// `StdRng` on every call, so layer evaluation stays a pure function of
/// its inputs and there is no process-wide random state.
#[derive(Debug, Clone)]
pub struct RngStreams {
    seeds: BTreeMap<String, u64>,
}

impl RngStreams {
    /// No streams at all. Layers that need one will report which.
    pub fn empty() -> Self {
        RngStreams {
            seeds: BTreeMap::new(),
        }
    }

    /// The two well-known streams, with per-stream seeds derived from one
    /// base seed.
    pub fn from_seed(seed: u64) -> Self {
        RngStreams::empty()
            .with_stream(PARAMS_STREAM, seed)
            .with_stream(RANDOM_STREAM, seed.wrapping_add(0x9E37_79B9_7F4A_7C15))
    }

    /// Add or replace a named stream.
    pub fn with_stream(mut self, name: &str, seed: u64) -> Self {
        self.seeds.insert(name.to_string(), seed);
        self
    }

    /// True if the named stream is present.
    pub fn contains(&self, name: &str) -> bool {
        self.seeds.contains_key(name)
    }

    /// Build a fresh generator for the named stream.
    pub fn rng(&self, name: &str) -> Result<StdRng> {
        self.seeds
            .get(name)
            .map(|&s| StdRng::seed_from_u64(s))
            .ok_or_else(|| TrainError::MissingRngStream(name.to_string()))
    }
}
