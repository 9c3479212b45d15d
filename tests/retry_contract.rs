//! End-to-end contracts of the retry loop: attempt counts, notification
//! counts, the delay schedule, and exact failure propagation.

use redial::{
    observer_fn, ErrorCode, ErrorShape, FailedAttempt, MemoryObserver, RecordingSleeper,
    RetryPolicy,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream request failed")]
struct UpstreamError {
    code: Option<&'static str>,
    output_status: Option<u16>,
}

impl UpstreamError {
    fn output_status(status: u16) -> Self {
        Self { code: None, output_status: Some(status) }
    }

    fn network(code: &'static str) -> Self {
        Self { code: Some(code), output_status: None }
    }
}

impl ErrorShape for UpstreamError {
    fn code(&self) -> Option<ErrorCode<'_>> {
        self.code.map(ErrorCode::Network)
    }

    fn output_status_code(&self) -> Option<u16> {
        self.output_status
    }
}

/// A value thrown as a failure that carries no error semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlainValue(&'static str);

impl ErrorShape for PlainValue {
    fn is_error(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn default_policy_with_server_error_runs_the_full_budget() {
    // Defaults: two retries, 1000 ms base delay, 500 retryable.
    let sleeper = RecordingSleeper::new();
    let events: MemoryObserver<UpstreamError> = MemoryObserver::new();
    let policy = RetryPolicy::builder()
        .with_sleeper(sleeper.clone())
        .observe(events.clone())
        .build()
        .expect("builder");

    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let result = policy
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(UpstreamError::output_status(500))
            }
        })
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(result.unwrap_err(), UpstreamError::output_status(500));

    let records = events.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records.iter().map(|r| r.attempt).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(records.iter().map(|r| r.retries_left).collect::<Vec<_>>(), vec![2, 1, 0]);
    assert!(records.iter().all(|r| r.cause == UpstreamError::output_status(500)));

    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
}

#[tokio::test(start_paused = true)]
async fn default_policy_elapsed_time_is_the_backoff_sum() {
    let policy = RetryPolicy::<UpstreamError>::builder().build().expect("builder");

    let start = tokio::time::Instant::now();
    let result = policy.run(|| async { Err::<(), _>(UpstreamError::output_status(503)) }).await;
    let elapsed = start.elapsed();

    assert!(result.is_err());
    // 1000 ms before the first retry, 2000 ms before the second.
    assert!(elapsed >= Duration::from_millis(3_000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(4_000), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn connection_reset_io_error_retries_once_with_short_delay() {
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::<io::Error>::builder()
        .max_retries(1)
        .base_delay(Duration::from_millis(50))
        .with_sleeper(sleeper.clone())
        .build()
        .expect("builder");

    let notifications = Arc::new(AtomicUsize::new(0));
    let seen = notifications.clone();
    policy.subscribe(observer_fn(move |_: FailedAttempt<'_, io::Error>| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let result = policy
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionReset))
            }
        })
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(notifications.load(Ordering::SeqCst), 2);
    assert_eq!(result.unwrap_err().kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(sleeper.recorded(), vec![Duration::from_millis(50)]);
}

#[tokio::test]
async fn client_error_is_permanent_regardless_of_budget() {
    let sleeper = RecordingSleeper::new();
    let events: MemoryObserver<UpstreamError> = MemoryObserver::new();
    let policy = RetryPolicy::builder()
        .with_sleeper(sleeper.clone())
        .observe(events.clone())
        .build()
        .expect("builder");

    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let result = policy
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(UpstreamError::output_status(400))
            }
        })
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(result.unwrap_err(), UpstreamError::output_status(400));
    assert!(sleeper.recorded().is_empty());

    // The permanent failure is still notified.
    let records = events.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempt, 1);
    assert_eq!(records[0].retries_left, 2);
}

#[tokio::test]
async fn always_failing_operation_makes_exactly_budget_plus_one_attempts() {
    let events: MemoryObserver<UpstreamError> = MemoryObserver::new();
    let policy = RetryPolicy::builder()
        .max_retries(4)
        .base_delay(Duration::from_millis(1))
        .with_sleeper(RecordingSleeper::new())
        .observe(events.clone())
        .build()
        .expect("builder");

    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let _ = policy
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(UpstreamError::network("ETIMEDOUT"))
            }
        })
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 5);
    let records = events.records();
    assert_eq!(records.len(), 5);
    assert_eq!(records.last().map(|r| r.retries_left), Some(0));
}

#[tokio::test]
async fn plain_value_failure_is_permanent_but_still_notified() {
    let events: MemoryObserver<PlainValue> = MemoryObserver::new();
    let shaped = Arc::new(AtomicUsize::new(0));
    let shaped_count = shaped.clone();
    let policy = RetryPolicy::builder()
        .max_retries(3)
        .base_delay(Duration::from_millis(1))
        .observe(events.clone())
        // A handler that only cares about causes with error semantics.
        .observe(observer_fn(move |event: FailedAttempt<'_, PlainValue>| {
            if event.cause.is_error() {
                shaped_count.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .build()
        .expect("builder");

    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let result = policy
        .run(|| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PlainValue("not an error"))
            }
        })
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(result.unwrap_err(), PlainValue("not an error"));
    assert_eq!(events.len(), 1, "emission is unconditional");
    assert_eq!(shaped.load(Ordering::SeqCst), 0, "no error-shaped causes were seen");
}

#[tokio::test]
async fn success_emits_no_notifications() {
    let events: MemoryObserver<UpstreamError> = MemoryObserver::new();
    let policy = RetryPolicy::builder().observe(events.clone()).build().expect("builder");

    let result = policy.run(|| async { Ok::<_, UpstreamError>("done") }).await;

    assert_eq!(result.unwrap(), "done");
    assert!(events.is_empty());
}

#[tokio::test]
async fn eventual_success_stops_the_loop_early() {
    let sleeper = RecordingSleeper::new();
    let events: MemoryObserver<UpstreamError> = MemoryObserver::new();
    let policy = RetryPolicy::builder()
        .max_retries(5)
        .base_delay(Duration::from_millis(10))
        .with_sleeper(sleeper.clone())
        .observe(events.clone())
        .build()
        .expect("builder");

    let counter = Arc::new(AtomicUsize::new(0));
    let calls = counter.clone();
    let result = policy
        .run(|| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(UpstreamError::output_status(502))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(events.len(), 2, "only the failed attempts are notified");
    assert_eq!(sleeper.recorded(), vec![Duration::from_millis(10), Duration::from_millis(20)]);
}
