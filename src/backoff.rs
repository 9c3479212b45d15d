//! Exponential backoff schedule for retry delays.
//!
//! Retry `k` (1-based) waits `base * 2^(k-1)`: the first retry waits the base
//! delay, the second twice that, and so on. Index `0` is the initial attempt
//! and never waits. Computations that would overflow saturate at
//! [`MAX_DELAY`], and an optional cap clamps the schedule below that.
//!
//! Example
//! ```rust
//! use redial::Backoff;
//! use std::time::Duration;
//!
//! let backoff = Backoff::new(Duration::from_millis(100))
//!     .with_max(Duration::from_millis(250))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::ZERO); // initial attempt
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay(3), Duration::from_millis(250)); // capped
//! ```

use crate::config::ConfigError;
use std::time::Duration;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Exponential delay schedule with an optional cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
}

impl Backoff {
    /// Create a schedule with the given base (first-retry) delay.
    pub fn new(base: Duration) -> Self {
        Self { base, max: None }
    }

    /// Clamp the schedule at `max`. Errors if `max` is below the base delay.
    pub fn with_max(mut self, max: Duration) -> Result<Self, ConfigError> {
        if max < self.base {
            return Err(ConfigError::MaxDelayBelowBase { base: self.base, max });
        }
        self.max = Some(max);
        Ok(self)
    }

    /// Base delay before the first retry.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Configured cap, if any.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay before the given retry (1-based; `0` is the initial attempt).
    pub fn delay(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1).min(u32::MAX as usize) as u32; // clamp to prevent truncation
        let multiplier = 2u128.saturating_pow(exponent);
        let nanos = self.base.as_nanos().saturating_mul(multiplier);
        let delay = Duration::from_nanos(nanos.min(MAX_DELAY.as_nanos()) as u64);
        let capped = self.max.map_or(delay, |max| delay.min(max));
        capped.min(MAX_DELAY)
    }
}
