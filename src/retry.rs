//! The retry policy: attempt loop, notification, backoff, termination.
//!
//! Semantics:
//! - `max_retries` counts retries after the initial attempt; total attempts
//!   are `max_retries + 1`, and `max_retries = 0` means a single attempt.
//! - Every failed attempt is reported to the registered observers before the
//!   retry/stop decision is acted on, final and non-retryable failures
//!   included. Successes are never reported.
//! - The [`Classifier`] decides transience; a permanent failure returns
//!   immediately, budget notwithstanding.
//! - [`Backoff`] computes the delay before each retry, [`Jitter`] optionally
//!   randomizes it, and the [`Sleeper`] applies it (production uses
//!   [`TokioSleeper`]; tests inject instant or recording sleepers).
//!
//! Invariants:
//! - Attempts never exceed `max_retries + 1`.
//! - The terminal failure is the operation's own error value, surfaced
//!   unmodified.
//! - The sleeper is invoked once per retry taken, never on the final attempt.
//!
//! Example
//! ```rust
//! use redial::RetryPolicy;
//! use std::io;
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::<io::Error>::builder()
//!     .max_retries(2)
//!     .base_delay(Duration::from_millis(100))
//!     .build()
//!     .unwrap();
//! let result = policy.run(|| async { Ok::<_, io::Error>(42) }).await;
//! assert_eq!(result.unwrap(), 42);
//! # });
//! ```

use crate::classify::{Classifier, ErrorShape};
use crate::config::{
    validate_http_statuses, validate_network_codes, ConfigError, RetryConfig,
    DEFAULT_FIRST_RETRY_DELAY_MS, DEFAULT_HTTP_ERROR_CODES, DEFAULT_NETWORK_ERROR_CODES,
    DEFAULT_NUMBER_OF_RETRIES,
};
use crate::notify::{AttemptObserver, FailedAttempt, ObserverId, ObserverSet};
use crate::{Backoff, Jitter, Sleeper, TokioSleeper};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;

/// Retry policy combining classifier, backoff, jitter, observers, and sleeper.
///
/// Immutable once built; clones share the observer registry and sleeper, so a
/// single policy serves any number of concurrent [`run`](RetryPolicy::run)
/// calls.
pub struct RetryPolicy<E> {
    max_retries: usize,
    backoff: Backoff,
    jitter: Jitter,
    classifier: Classifier,
    observers: ObserverSet<E>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("classifier", &self.classifier)
            .field("observers", &self.observers.count())
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            backoff: self.backoff.clone(),
            jitter: self.jitter,
            classifier: self.classifier.clone(),
            observers: self.observers.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

impl<E> RetryPolicy<E>
where
    E: ErrorShape + Send + Sync + 'static,
{
    /// Construct a new builder with the stock defaults.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Build a policy from validated configuration.
    pub fn with_config(config: &RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::builder()
            .max_retries(config.number_of_retries)
            .base_delay(config.first_retry_delay())
            .network_codes(config.retry_network_error_codes.iter().cloned())
            .http_statuses(config.retry_http_error_codes.iter().copied())
            .build()
    }

    /// Retries after the initial attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Total attempt budget (`max_retries + 1`).
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// The backoff schedule in effect.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// The classifier in effect.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Register an observer for failed-attempt events.
    ///
    /// The returned id identifies the subscription for
    /// [`unsubscribe`](RetryPolicy::unsubscribe). Clones of this policy share
    /// the registry, so an observer registered on one is seen by all.
    pub fn subscribe<O>(&self, observer: O) -> ObserverId
    where
        O: AttemptObserver<E> + 'static,
    {
        self.observers.subscribe(Arc::new(observer))
    }

    /// Remove a previously registered observer. Returns `false` if the id is
    /// unknown or already removed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.count()
    }

    /// Wrap this policy as a tower layer.
    pub fn into_layer(self) -> RetryLayer<E> {
        RetryLayer { policy: self }
    }

    /// Run `operation` under this policy.
    ///
    /// Invokes the operation up to `max_retries + 1` times, strictly
    /// sequentially. Each failure is delivered to the observers, then
    /// classified: a permanent failure (or an exhausted budget) terminates
    /// the run with that exact error value, a transient one waits out the
    /// backoff delay and tries again.
    ///
    /// There is no cancellation token; dropping the returned future abandons
    /// the loop, including a sleep in progress.
    pub async fn run<T, Fut, Op>(&self, mut operation: Op) -> Result<T, E>
    where
        T: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let max_attempts = self.max_retries + 1;

        for attempt in 1..=max_attempts {
            let cause = match operation().await {
                Ok(value) => return Ok(value),
                Err(cause) => cause,
            };

            // Notify first, decide second: observers see every failure,
            // including the ones the classifier is about to call permanent.
            let retries_left = max_attempts - attempt;
            self.observers.notify(FailedAttempt { attempt, retries_left, cause: &cause });

            if !self.classifier.is_retryable(&cause) {
                return Err(cause);
            }
            if retries_left == 0 {
                return Err(cause);
            }

            // Retry k waits base * 2^(k-1); attempt equals k here.
            let delay = self.jitter.apply(self.backoff.delay(attempt));
            self.sleeper.sleep(delay).await;
        }

        // Unreachable: the final iteration has retries_left == 0 and always
        // returns.
        debug_assert!(false, "retry loop should have returned");
        unreachable!()
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Option<Duration>,
    jitter: Jitter,
    network_codes: Vec<String>,
    http_statuses: Vec<u16>,
    observers: ObserverSet<E>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> RetryPolicyBuilder<E>
where
    E: ErrorShape + Send + Sync + 'static,
{
    /// Create a builder with the stock defaults.
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_NUMBER_OF_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_FIRST_RETRY_DELAY_MS),
            max_delay: None,
            jitter: Jitter::None,
            network_codes: DEFAULT_NETWORK_ERROR_CODES
                .iter()
                .map(|code| code.to_string())
                .collect(),
            http_statuses: DEFAULT_HTTP_ERROR_CODES.to_vec(),
            observers: ObserverSet::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Retries after the initial attempt. `0` means a single attempt.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Wait before the first retry; later retries double it.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Clamp every computed delay at `max`. Must be >= the base delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Jitter strategy applied to each delay. Defaults to [`Jitter::None`],
    /// which keeps the documented schedule exact.
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the set of network error codes classified as transient.
    pub fn network_codes<C>(mut self, codes: C) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.network_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the set of HTTP statuses classified as transient.
    pub fn http_statuses<S>(mut self, statuses: S) -> Self
    where
        S: IntoIterator<Item = u16>,
    {
        self.http_statuses = statuses.into_iter().collect();
        self
    }

    /// Register an observer at build time.
    pub fn observe<O>(self, observer: O) -> Self
    where
        O: AttemptObserver<E> + 'static,
    {
        self.observers.subscribe(Arc::new(observer));
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Build the policy, validating every configured field.
    pub fn build(self) -> Result<RetryPolicy<E>, ConfigError> {
        validate_network_codes(&self.network_codes)?;
        validate_http_statuses(&self.http_statuses)?;
        let mut backoff = Backoff::new(self.base_delay);
        if let Some(max) = self.max_delay {
            backoff = backoff.with_max(max)?;
        }
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            backoff,
            jitter: self.jitter,
            classifier: Classifier::new(self.network_codes, self.http_statuses),
            observers: self.observers,
            sleeper: self.sleeper,
        })
    }
}

impl<E> Default for RetryPolicyBuilder<E>
where
    E: ErrorShape + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Tower-native retry layer.
///
/// Wraps a service so that each call runs under the policy: same
/// classification, same notifications, same backoff as
/// [`RetryPolicy::run`]. The inner service's error must convert into the
/// policy's failure type.
pub struct RetryLayer<E> {
    policy: RetryPolicy<E>,
}

impl<E> RetryLayer<E>
where
    E: ErrorShape + Send + Sync + 'static,
{
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self { policy }
    }

    /// The policy driving this layer.
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }
}

impl<E> Clone for RetryLayer<E> {
    fn clone(&self) -> Self {
        Self { policy: self.policy.clone() }
    }
}

/// Retry service produced by [`RetryLayer`].
pub struct RetryService<S, E> {
    inner: S,
    policy: RetryPolicy<E>,
}

impl<S: Clone, E> Clone for RetryService<S, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), policy: self.policy.clone() }
    }
}

impl<S, E, Request> Service<Request> for RetryService<S, E>
where
    Request: Clone + Send + Sync + 'static,
    S: Service<Request> + Clone + Send + Sync + 'static,
    S::Response: Send + 'static,
    S::Error: Into<E>,
    S::Future: Send + 'static,
    E: ErrorShape + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = E;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let policy = self.policy.clone();
        let inner = self.inner.clone();
        Box::pin(async move {
            policy
                .run(|| {
                    let mut inner = inner.clone();
                    let req = req.clone();
                    async move { inner.call(req).await.map_err(Into::into) }
                })
                .await
        })
    }
}

impl<S, E> Layer<S> for RetryLayer<E>
where
    E: ErrorShape + Send + Sync + 'static,
{
    type Service = RetryService<S, E>;
    fn layer(&self, inner: S) -> Self::Service {
        RetryService { inner, policy: self.policy.clone() }
    }
}
