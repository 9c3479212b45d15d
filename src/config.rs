//! Policy configuration: recognized options, stock defaults, validation.
//!
//! `RetryConfig` mirrors the options accepted at construction time. Every
//! field has a default, so a config deserialized from `{}` (with the `serde`
//! feature) or built via `RetryConfig::default()` is a complete, valid
//! policy input. Validation reports which field violated which constraint;
//! non-negativity of the numeric fields is carried by their unsigned types.

use std::fmt;
use std::time::Duration;

/// Default number of retries after the initial attempt.
pub const DEFAULT_NUMBER_OF_RETRIES: usize = 2;

/// Default wait before the first retry, in milliseconds.
pub const DEFAULT_FIRST_RETRY_DELAY_MS: u64 = 1_000;

/// Network error codes retried by default.
///
/// `ESOCKETTIMEDOUT` and `ETIMEDOUT` are distinct spellings emitted by
/// different client stacks and both stay recognized.
pub const DEFAULT_NETWORK_ERROR_CODES: [&str; 8] = [
    "ECONNRESET",
    "ENOTFOUND",
    "ESOCKETTIMEDOUT",
    "ETIMEDOUT",
    "ECONNREFUSED",
    "EHOSTUNREACH",
    "EPIPE",
    "EAI_AGAIN",
];

/// HTTP status codes retried by default. 509 is unassigned and excluded.
pub const DEFAULT_HTTP_ERROR_CODES: [u16; 11] =
    [500, 501, 502, 503, 504, 505, 506, 507, 508, 510, 511];

/// Construction-time options for a retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct RetryConfig {
    /// Retries after the initial attempt; `0` means a single attempt.
    pub number_of_retries: usize,
    /// Wait before the first retry, in milliseconds. Later retries double it.
    pub wait_between_first_retry_ms: u64,
    /// Network error codes classified as transient.
    pub retry_network_error_codes: Vec<String>,
    /// HTTP status codes classified as transient.
    pub retry_http_error_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            number_of_retries: DEFAULT_NUMBER_OF_RETRIES,
            wait_between_first_retry_ms: DEFAULT_FIRST_RETRY_DELAY_MS,
            retry_network_error_codes: DEFAULT_NETWORK_ERROR_CODES
                .iter()
                .map(|code| code.to_string())
                .collect(),
            retry_http_error_codes: DEFAULT_HTTP_ERROR_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// The configured first-retry wait as a [`Duration`].
    pub fn first_retry_delay(&self) -> Duration {
        Duration::from_millis(self.wait_between_first_retry_ms)
    }

    /// Check every field against its constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_network_codes(&self.retry_network_error_codes)?;
        validate_http_statuses(&self.retry_http_error_codes)?;
        Ok(())
    }
}

/// Errors produced while validating policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An entry in `retry_network_error_codes` is empty or whitespace.
    BlankNetworkCode {
        /// Index of the offending entry.
        index: usize,
    },
    /// An entry in `retry_http_error_codes` is outside the HTTP status range.
    HttpStatusOutOfRange {
        /// Value provided by caller.
        provided: u16,
    },
    /// A delay cap below the base delay would invert the schedule.
    MaxDelayBelowBase {
        /// Base delay before the first retry.
        base: Duration,
        /// Cap that was rejected.
        max: Duration,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BlankNetworkCode { index } => {
                write!(f, "retry_network_error_codes[{}] must be a non-blank code", index)
            }
            ConfigError::HttpStatusOutOfRange { provided } => {
                write!(f, "retry_http_error_codes entries must be in 100..=599 (got {})", provided)
            }
            ConfigError::MaxDelayBelowBase { base, max } => {
                write!(f, "max_delay ({:?}) must be >= base_delay ({:?})", max, base)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub(crate) fn validate_network_codes(codes: &[String]) -> Result<(), ConfigError> {
    for (index, code) in codes.iter().enumerate() {
        if code.trim().is_empty() {
            return Err(ConfigError::BlankNetworkCode { index });
        }
    }
    Ok(())
}

pub(crate) fn validate_http_statuses(statuses: &[u16]) -> Result<(), ConfigError> {
    for &status in statuses {
        if !(100..=599).contains(&status) {
            return Err(ConfigError::HttpStatusOutOfRange { provided: status });
        }
    }
    Ok(())
}
