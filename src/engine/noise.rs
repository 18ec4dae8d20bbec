//! Injectable noise source for the prediction generator.
//!
//! Production forecasts carry a little residual noise so projections do not
//! look implausibly clean. The source is a trait so tests can force
//! determinism without special-casing the generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform noise draws inside a caller-supplied band.
pub trait NoiseSource: Send {
    /// A value drawn uniformly from `[lo, hi)`.
    fn draw(&mut self, lo: f64, hi: f64) -> f64;
}

/// Seeded pseudo-random noise. The same seed reproduces the same forecast.
pub struct RandomNoise {
    rng: StdRng,
}

impl RandomNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Source seeded from the OS entropy pool.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl NoiseSource for RandomNoise {
    fn draw(&mut self, lo: f64, hi: f64) -> f64 {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }
}

/// Deterministic source that always returns the band midpoint. With the
/// symmetric bands the generator uses, this cancels every noise term.
pub struct FlatNoise;

impl NoiseSource for FlatNoise {
    fn draw(&mut self, lo: f64, hi: f64) -> f64 {
        (lo + hi) / 2.0
    }
}
