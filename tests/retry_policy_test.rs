use std::time::Duration;

use hermod::{CacheConfig, RetryPolicy};

#[test]
fn retry_policy_defaults() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.initial_delay, Duration::from_secs(1));
    assert_eq!(policy.max_delay, Duration::from_secs(30));
}

#[test]
fn retry_policy_builder() {
    let policy = RetryPolicy::new()
        .max_retries(5)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(10));

    assert_eq!(policy.max_retries, 5);
    assert_eq!(policy.initial_delay, Duration::from_millis(100));
    assert_eq!(policy.max_delay, Duration::from_secs(10));
}

#[test]
fn default_backoff_is_one_two_four_seconds() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    // attempt 5 = 1 * 2^5 = 32s, capped at 30s
    assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(30));
}

#[test]
fn cache_config_carries_default_policy() {
    let config = CacheConfig::default();
    assert_eq!(config.retry, RetryPolicy::default());
    assert_eq!(config.query_options().retry.max_retries, 3);

    let quiet = CacheConfig::new().retry(RetryPolicy::disabled());
    assert_eq!(quiet.query_options().retry.max_retries, 0);
}
