use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// SimRng wraps the single deterministic PRNG of a simulation. Every stochastic draw of a race
/// (lap variance, mistakes, pass outcomes, decision outcomes) must be routed through one SimRng
/// instance so that re-simulating with the same seed and the same inputs reproduces the exact
/// draw sequence. The internal state serializes together with an engine snapshot, which allows
/// restoring a race mid-flight without breaking reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRng {
    inner: ChaCha8Rng,
}

impl SimRng {
    pub fn from_seed(seed: u64) -> SimRng {
        SimRng {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// uniform returns a draw from [0.0, 1.0).
    pub fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// range returns a draw from [a, b). Returns a if the range is empty.
    pub fn range(&mut self, a: f64, b: f64) -> f64 {
        if b <= a {
            return a;
        }
        self.inner.gen_range(a..b)
    }

    /// range_u32 returns a draw from [a, b] (both ends inclusive).
    pub fn range_u32(&mut self, a: u32, b: u32) -> u32 {
        if b <= a {
            return a;
        }
        self.inner.gen_range(a..=b)
    }

    /// jitter returns a symmetric draw from [-halfwidth, +halfwidth].
    pub fn jitter(&mut self, halfwidth: f64) -> f64 {
        if halfwidth <= 0.0 {
            return 0.0;
        }
        self.range(-halfwidth, halfwidth)
    }

    /// chance returns true with probability p (clamped to [0.0, 1.0]). The draw is consumed in
    /// every case so that callers keep a stable draw sequence independent of p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.uniform() < p.max(0.0).min(1.0)
    }
}
