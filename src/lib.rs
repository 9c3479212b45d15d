#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # redial ☎️
//!
//! Exponential-backoff retry policy for transiently-failing async operations,
//! typically outbound HTTP requests.
//!
//! ## Features
//!
//! - **Failure classification** across heterogeneous client error shapes:
//!   named network codes plus HTTP statuses probed at every location client
//!   libraries are known to put them
//! - **Exponential backoff** with saturation, an optional cap, and opt-in
//!   jitter
//! - **Failed-attempt notifications** delivered to subscribed observers
//!   before each retry/stop decision
//! - **Exact failure propagation**: the terminal error is the operation's own
//!   value, never wrapped
//! - **Tower integration** via [`RetryLayer`]
//!
//! ## Quick Start
//!
//! ```rust
//! use redial::RetryPolicy;
//! use std::io;
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = RetryPolicy::<io::Error>::builder()
//!         .max_retries(2)
//!         .build()
//!         .unwrap();
//!
//!     let result = policy.run(|| async {
//!         // Your async operation here
//!         Ok::<_, io::Error>(())
//!     }).await;
//!     assert!(result.is_ok());
//! }
//! ```

pub mod backoff;
pub mod classify;
pub mod config;
pub mod jitter;
pub mod notify;
pub mod prelude;
pub mod retry;
pub mod sleeper;

// Re-exports
pub use backoff::{Backoff, MAX_DELAY};
pub use classify::{Classifier, ErrorCode, ErrorShape};
pub use config::{ConfigError, RetryConfig};
pub use jitter::Jitter;
pub use notify::{
    observer_fn, AttemptObserver, AttemptRecord, BroadcastObserver, FailedAttempt, LogObserver,
    MemoryObserver, ObserverFn, ObserverId,
};
pub use retry::{RetryLayer, RetryPolicy, RetryPolicyBuilder, RetryService};
pub use sleeper::{InstantSleeper, RecordingSleeper, Sleeper, TokioSleeper};
