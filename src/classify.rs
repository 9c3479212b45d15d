//! Transient-failure classification across heterogeneous error shapes.
//!
//! HTTP client stacks disagree about where a status code lives: some put it
//! on a `code` field (which doubles as the slot for named network codes),
//! some on `statusCode`, some nest it under `output.statusCode` or
//! `response.status`. [`ErrorShape`] exposes each known location as an
//! optional accessor, and [`Classifier`] probes them in a fixed order, so one
//! classifier serves multiple client ecosystems without adapters.
//!
//! Classification is pure: no side effects, deterministic for the same
//! inputs, safe to call concurrently.
//!
//! Example
//! ```rust
//! use redial::Classifier;
//! use std::io;
//!
//! let classifier = Classifier::default();
//! let reset = io::Error::from(io::ErrorKind::ConnectionReset);
//! assert!(classifier.is_retryable(&reset));
//!
//! let denied = io::Error::from(io::ErrorKind::PermissionDenied);
//! assert!(!classifier.is_retryable(&denied));
//! ```

use crate::config::RetryConfig;
use std::collections::HashSet;

/// Value carried by a failure's `code` field.
///
/// The field is dual-typed in the wild: named network codes such as
/// `"ECONNRESET"`, or a bare numeric HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode<'a> {
    /// Named network error code, e.g. `"ETIMEDOUT"`.
    Network(&'a str),
    /// Numeric HTTP status carried in the `code` slot.
    Status(u16),
}

/// Structural probe over an opaque failure value.
///
/// Every accessor has a default, so implementors only surface the locations
/// their failure actually has; a missing location is "not found", never an
/// error. Values without error semantics (plain data used as a failure)
/// report `is_error() == false` and are always classified permanent.
pub trait ErrorShape {
    /// Whether this value carries error semantics at all.
    fn is_error(&self) -> bool {
        true
    }

    /// The `code` field: a named network code or a numeric status.
    fn code(&self) -> Option<ErrorCode<'_>> {
        None
    }

    /// The direct `statusCode` field.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// The nested `output.statusCode` path.
    fn output_status_code(&self) -> Option<u16> {
        None
    }

    /// The nested `response.status` path.
    fn response_status(&self) -> Option<u16> {
        None
    }
}

fn status_from_code(failure: &dyn ErrorShape) -> Option<u16> {
    match failure.code() {
        Some(ErrorCode::Status(status)) => Some(status),
        _ => None,
    }
}

fn status_direct(failure: &dyn ErrorShape) -> Option<u16> {
    failure.status_code()
}

fn status_from_output(failure: &dyn ErrorShape) -> Option<u16> {
    failure.output_status_code()
}

fn status_from_response(failure: &dyn ErrorShape) -> Option<u16> {
    failure.response_status()
}

/// Ordered status probes; classification tries each until one yields a
/// recognized status.
const STATUS_PROBES: [fn(&dyn ErrorShape) -> Option<u16>; 4] =
    [status_from_code, status_direct, status_from_output, status_from_response];

/// Pure retryability predicate over the two recognized-code sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    network_codes: HashSet<String>,
    http_statuses: HashSet<u16>,
}

impl Classifier {
    /// Build a classifier from explicit code sets.
    pub fn new<C, S>(network_codes: C, http_statuses: S) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        S: IntoIterator<Item = u16>,
    {
        Self {
            network_codes: network_codes.into_iter().map(Into::into).collect(),
            http_statuses: http_statuses.into_iter().collect(),
        }
    }

    /// Build a classifier from a policy config's code lists.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.retry_network_error_codes.iter().cloned(),
            config.retry_http_error_codes.iter().copied(),
        )
    }

    /// Whether `code` is a recognized transient network code.
    pub fn is_network_code(&self, code: &str) -> bool {
        self.network_codes.contains(code)
    }

    /// Whether `status` is a recognized transient HTTP status.
    pub fn is_http_status(&self, status: u16) -> bool {
        self.http_statuses.contains(&status)
    }

    /// Decide whether `failure` warrants a retry.
    ///
    /// Non-error values are permanent. A recognized network code on the
    /// `code` field is transient. Otherwise each status location is probed
    /// in order; any located status in the recognized set is transient.
    /// A located status outside the set does not stop the probing.
    pub fn is_retryable(&self, failure: &dyn ErrorShape) -> bool {
        if !failure.is_error() {
            return false;
        }
        if let Some(ErrorCode::Network(code)) = failure.code() {
            if self.network_codes.contains(code) {
                return true;
            }
        }
        STATUS_PROBES
            .iter()
            .any(|probe| probe(failure).is_some_and(|status| self.http_statuses.contains(&status)))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_NETWORK_ERROR_CODES,
            crate::config::DEFAULT_HTTP_ERROR_CODES,
        )
    }
}

/// Std I/O errors expose the portable `ErrorKind`s under their POSIX-style
/// code names, so socket failures classify out of the box.
impl ErrorShape for std::io::Error {
    fn code(&self) -> Option<ErrorCode<'_>> {
        let code = match self.kind() {
            std::io::ErrorKind::ConnectionReset => "ECONNRESET",
            std::io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
            std::io::ErrorKind::TimedOut => "ETIMEDOUT",
            std::io::ErrorKind::BrokenPipe => "EPIPE",
            _ => return None,
        };
        Some(ErrorCode::Network(code))
    }
}
