//! Seed-bound shuffling of collected suites.

use std::hash::{DefaultHasher, Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use toml::Value;
use tracing::{debug, info};

use crate::core::settings::ConfigStore;

pub const RANDOM: &str = "RANDOM";
pub const RANDOM_SEED: &str = "RANDOM_SEED";

/// A deterministic shuffle: the same seed always yields the same order.
///
/// Shuffling needs the whole sequence in memory, so it must not be used with
/// unbounded suite sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shuffle {
    seed: u64,
}

impl Shuffle {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn apply<T>(&self, items: &mut [T]) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        items.shuffle(&mut rng);
    }
}

/// Shuffle configured by `RANDOM`/`RANDOM_SEED`, or `None` when `RANDOM` is
/// falsy.
///
/// Any configured seed value binds the order; integers are used as is and
/// other values are hashed. Without a seed one is drawn and logged so the
/// order can be replayed.
pub fn parse_shuffle(config: &ConfigStore) -> Option<Shuffle> {
    if !config.flag(RANDOM) {
        return None;
    }
    let seed = match config.value(RANDOM_SEED) {
        Some(value) => seed_from_value(value),
        None => {
            let seed = rand::thread_rng().r#gen::<u64>();
            info!(seed, "no {RANDOM_SEED} configured, drew a random seed");
            seed
        }
    };
    Some(Shuffle::new(seed))
}

fn seed_from_value(value: &Value) -> u64 {
    if let Value::Integer(seed) = value {
        return *seed as u64;
    }
    // DefaultHasher::new() uses fixed keys, so the hash is stable.
    let mut hasher = DefaultHasher::new();
    match value {
        Value::String(text) => text.hash(&mut hasher),
        Value::Float(float) => float.to_bits().hash(&mut hasher),
        Value::Boolean(flag) => flag.hash(&mut hasher),
        other => other.to_string().hash(&mut hasher),
    }
    let seed = hasher.finish();
    debug!(seed, "hashed non-integer {RANDOM_SEED}");
    seed
}
