#![cfg(feature = "serde")]
//! Configuration as data: deserializing recognized options, rejecting
//! unrecognized ones, and feeding the result into a policy.

use redial::{ErrorShape, RetryConfig, RetryPolicy};
use std::time::Duration;

#[derive(Debug)]
struct AnyError;

impl ErrorShape for AnyError {}

#[test]
fn empty_document_yields_the_defaults() {
    let config: RetryConfig = serde_json::from_str("{}").expect("deserialize");
    assert_eq!(config, RetryConfig::default());
}

#[test]
fn recognized_options_override_the_defaults() {
    let config: RetryConfig = serde_json::from_str(
        r#"{
            "number_of_retries": 5,
            "wait_between_first_retry_ms": 250,
            "retry_http_error_codes": [500, 503]
        }"#,
    )
    .expect("deserialize");

    assert_eq!(config.number_of_retries, 5);
    assert_eq!(config.first_retry_delay(), Duration::from_millis(250));
    assert_eq!(config.retry_http_error_codes, vec![500, 503]);
    // Untouched fields keep their defaults.
    assert_eq!(config.retry_network_error_codes, RetryConfig::default().retry_network_error_codes);
}

#[test]
fn unrecognized_options_are_rejected() {
    let result: Result<RetryConfig, _> = serde_json::from_str(r#"{"retires": 3}"#);
    assert!(result.is_err());
}

#[test]
fn round_trip_preserves_the_config() {
    let config = RetryConfig { number_of_retries: 7, ..RetryConfig::default() };
    let json = serde_json::to_string(&config).expect("serialize");
    let back: RetryConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, config);
}

#[tokio::test]
async fn deserialized_config_builds_a_working_policy() {
    let config: RetryConfig =
        serde_json::from_str(r#"{"number_of_retries": 1, "wait_between_first_retry_ms": 0}"#)
            .expect("deserialize");
    let policy = RetryPolicy::<AnyError>::with_config(&config).expect("policy");

    assert_eq!(policy.max_attempts(), 2);
    let result = policy.run(|| async { Ok::<_, AnyError>(1) }).await;
    assert_eq!(result.unwrap(), 1);
}

#[test]
fn invalid_deserialized_config_fails_policy_construction() {
    let config: RetryConfig =
        serde_json::from_str(r#"{"retry_http_error_codes": [42]}"#).expect("deserialize");
    let err = RetryPolicy::<AnyError>::with_config(&config).unwrap_err();
    assert!(err.to_string().contains("retry_http_error_codes"));
}
