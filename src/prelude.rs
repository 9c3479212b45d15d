//! Convenient re-exports for common redial types.
pub use crate::{
    backoff::{Backoff, MAX_DELAY},
    classify::{Classifier, ErrorCode, ErrorShape},
    config::{ConfigError, RetryConfig},
    jitter::Jitter,
    notify::{observer_fn, AttemptObserver, AttemptRecord, FailedAttempt, ObserverId},
    retry::{RetryLayer, RetryPolicy, RetryPolicyBuilder},
    sleeper::{Sleeper, TokioSleeper},
};
