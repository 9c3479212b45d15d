//! Failed-attempt notifications and observers.
//!
//! Every failed attempt produces one [`FailedAttempt`] event, delivered
//! in-line to each registered observer before the policy acts on the
//! retry/stop decision. Events borrow the failure and live only for the
//! delivery; observers that keep history snapshot them into owned
//! [`AttemptRecord`]s.
//!
//! The registry is scoped per policy (clones share it), never process-wide,
//! so concurrent runs against different policies stay isolated.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// One failed attempt, borrowed from the attempt loop.
///
/// `cause` borrows the raw failure exactly as the operation produced it;
/// nothing is wrapped or copied on the delivery path.
#[derive(Debug)]
pub struct FailedAttempt<'a, E> {
    /// 1-based attempt number.
    pub attempt: usize,
    /// Attempts still available after this one.
    pub retries_left: usize,
    /// The raw failure.
    pub cause: &'a E,
}

impl<E> Clone for FailedAttempt<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for FailedAttempt<'_, E> {}

impl<E: fmt::Display> fmt::Display for FailedAttempt<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} failed ({} retries left): {}",
            self.attempt, self.retries_left, self.cause
        )
    }
}

impl<E> FailedAttempt<'_, E> {
    /// Snapshot into an owned record.
    pub fn to_record(&self) -> AttemptRecord<E>
    where
        E: Clone,
    {
        AttemptRecord {
            attempt: self.attempt,
            retries_left: self.retries_left,
            cause: self.cause.clone(),
        }
    }
}

/// Owned snapshot of a [`FailedAttempt`], for observers that retain events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord<E> {
    /// 1-based attempt number.
    pub attempt: usize,
    /// Attempts still available after this one.
    pub retries_left: usize,
    /// The failure, cloned out of the event.
    pub cause: E,
}

/// Receives one event per failed attempt.
///
/// Delivery is synchronous with the attempt loop, so a handler observing
/// `retries_left` sees a value consistent with what the policy does next.
/// Handlers should return quickly; anything slow belongs behind a channel
/// (see [`BroadcastObserver`]).
pub trait AttemptObserver<E>: Send + Sync {
    /// Called once per failed attempt, including non-retryable and final ones.
    fn on_failed_attempt(&self, event: FailedAttempt<'_, E>);
}

/// Adapter turning a closure into an [`AttemptObserver`].
///
/// Returned by [`observer_fn`].
#[derive(Debug, Clone, Copy)]
pub struct ObserverFn<F> {
    f: F,
}

/// Wrap a closure as an observer, in the same spirit as `tower::service_fn`.
///
/// ```rust
/// use redial::{observer_fn, FailedAttempt};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let failures = Arc::new(AtomicUsize::new(0));
/// let counter = failures.clone();
/// let observer = observer_fn(move |_event: FailedAttempt<'_, String>| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
/// # let _ = observer;
/// ```
pub fn observer_fn<F>(f: F) -> ObserverFn<F> {
    ObserverFn { f }
}

impl<E, F> AttemptObserver<E> for ObserverFn<F>
where
    F: Fn(FailedAttempt<'_, E>) + Send + Sync,
{
    fn on_failed_attempt(&self, event: FailedAttempt<'_, E>) {
        (self.f)(event)
    }
}

/// Observer that logs each failed attempt through `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl<E> AttemptObserver<E> for LogObserver
where
    E: fmt::Debug,
{
    fn on_failed_attempt(&self, event: FailedAttempt<'_, E>) {
        tracing::warn!(
            attempt = event.attempt,
            retries_left = event.retries_left,
            cause = ?event.cause,
            "attempt failed"
        );
    }
}

/// Observer that retains attempt records in memory, oldest evicted first.
///
/// Clones share the same storage.
#[derive(Debug)]
pub struct MemoryObserver<E> {
    records: Arc<Mutex<Vec<AttemptRecord<E>>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl<E> MemoryObserver<E> {
    pub fn new() -> Self {
        Self::with_capacity(1_024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            capacity: usize::MAX,
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records discarded to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl<E: Clone> MemoryObserver<E> {
    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<AttemptRecord<E>> {
        self.records.lock().unwrap().clone()
    }
}

impl<E> Clone for MemoryObserver<E> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            capacity: self.capacity,
            evicted: self.evicted.clone(),
        }
    }
}

impl<E> Default for MemoryObserver<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AttemptObserver<E> for MemoryObserver<E>
where
    E: Clone + Send,
{
    fn on_failed_attempt(&self, event: FailedAttempt<'_, E>) {
        let mut records = self.records.lock().unwrap();
        if records.len() >= self.capacity {
            records.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        records.push(event.to_record());
    }
}

/// Observer that fans attempt records out to broadcast subscribers.
///
/// Events delivered while no receiver is subscribed count as dropped.
#[derive(Debug)]
pub struct BroadcastObserver<E> {
    sender: broadcast::Sender<AttemptRecord<E>>,
    dropped: Arc<AtomicU64>,
}

impl<E: Clone> BroadcastObserver<E> {
    /// Create an observer whose channel buffers up to `capacity` records.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, dropped: Arc::new(AtomicU64::new(0)) }
    }

    /// Subscribe a new receiver for future records.
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptRecord<E>> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Records that found no receiver.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<E> Clone for BroadcastObserver<E> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone(), dropped: self.dropped.clone() }
    }
}

impl<E> AttemptObserver<E> for BroadcastObserver<E>
where
    E: Clone + Send + 'static,
{
    fn on_failed_attempt(&self, event: FailedAttempt<'_, E>) {
        if self.sender.send(event.to_record()).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Handle identifying one subscription, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type RegisteredObservers<E> = Vec<(ObserverId, Arc<dyn AttemptObserver<E>>)>;

/// Per-policy observer registry. Clones share the same subscriptions.
pub(crate) struct ObserverSet<E> {
    entries: Arc<Mutex<RegisteredObservers<E>>>,
    next_id: Arc<AtomicU64>,
}

impl<E> ObserverSet<E> {
    pub(crate) fn subscribe(&self, observer: Arc<dyn AttemptObserver<E>>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().unwrap().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Deliver `event` to every observer, in subscription order.
    ///
    /// Observers run outside the registry lock, so a handler may
    /// subscribe or unsubscribe from within its callback.
    pub(crate) fn notify(&self, event: FailedAttempt<'_, E>) {
        let snapshot: Vec<Arc<dyn AttemptObserver<E>>> =
            self.entries.lock().unwrap().iter().map(|(_, observer)| observer.clone()).collect();
        for observer in snapshot {
            observer.on_failed_attempt(event);
        }
    }
}

impl<E> Clone for ObserverSet<E> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone(), next_id: self.next_id.clone() }
    }
}

impl<E> Default for ObserverSet<E> {
    fn default() -> Self {
        Self { entries: Arc::new(Mutex::new(Vec::new())), next_id: Arc::new(AtomicU64::new(0)) }
    }
}
