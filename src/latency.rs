//! Per-participant message delay: a fixed base plus seeded uniform jitter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Additive latency model. Each model owns its own PRNG so adding or
/// removing one component never shifts the random stream of another.
#[derive(Debug)]
pub struct LatencyModel {
    /// Base latency in nanoseconds
    pub base_ns: i64,
    /// Max jitter in nanoseconds (uniform in [0, jitter_ns))
    pub jitter_ns: i64,
    rng: StdRng,
}

impl LatencyModel {
    /// Create a latency model with the given parameters and seed
    pub fn new(base_ns: i64, jitter_ns: i64, seed: u64) -> Self {
        Self {
            base_ns,
            jitter_ns,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Arrival time for a message decided at `decision_time`.
    /// With zero jitter this is the pure affine `decision_time + base_ns`.
    pub fn apply(&mut self, decision_time: i64) -> i64 {
        let jitter = if self.jitter_ns > 0 {
            self.rng.gen_range(0..self.jitter_ns)
        } else {
            0
        };
        decision_time + self.base_ns + jitter
    }
}
