//! Jitter strategies to prevent thundering herds.
//!
//! When to use which strategy:
//! - `None`: the exact documented schedule; the default, and what the
//!   contract tests assume.
//! - `Full`: uniform in `[0, delay]`, spreads load the most.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor while adding
//!   randomness.
//!
//! Notes:
//! - RNG: `rand`'s thread-local RNG by default; deterministic RNGs can be
//!   injected via `apply_with_rng`.
//! - Precision: millisecond conversions saturate to `u64::MAX` to avoid
//!   panics on very large durations.

use rand::{rng, Rng};
use std::time::Duration;

/// Jitter strategy applied to each computed backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter; use the exact backoff delay.
    #[default]
    None,
    /// Full jitter: random between zero and the delay.
    Full,
    /// Equal jitter: random between half the delay and the delay.
    Equal,
}

impl Jitter {
    /// Create a full jitter strategy.
    pub fn full() -> Self {
        Jitter::Full
    }

    /// Create an equal jitter strategy.
    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Apply jitter to a delay duration.
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_internal(delay, &mut rng)
    }

    /// Apply jitter with a custom RNG (for deterministic tests).
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        self.apply_internal(delay, rng)
    }

    fn as_millis_saturated(duration: Duration) -> u64 {
        duration.as_millis().try_into().unwrap_or(u64::MAX)
    }

    fn apply_internal<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                let millis = Self::as_millis_saturated(delay);
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(0..=millis))
            }
            Jitter::Equal => {
                let millis = Self::as_millis_saturated(delay);
                if millis == 0 {
                    return Duration::ZERO;
                }
                let half = millis / 2;
                Duration::from_millis(rng.random_range(half..=millis))
            }
        }
    }
}
