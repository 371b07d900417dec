//! Cache-wide and per-query configuration.

use std::time::Duration;

use crate::RetryPolicy;

/// Configuration for a [`QueryCache`](super::QueryCache).
///
/// ```rust
/// # use hermod::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .default_stale_time(Duration::from_secs(30))
///     .gc_time(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Freshness window for values written without explicit options
    /// (e.g. via `set_value` on a new key). Default: 0 (immediately stale).
    pub default_stale_time: Duration,
    /// How long an entry may sit with zero subscribers before it is
    /// evicted. Default: 5 minutes.
    pub gc_time: Duration,
    /// Retry policy used when a query does not supply its own.
    pub retry: RetryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_stale_time(mut self, stale_time: Duration) -> Self {
        self.default_stale_time = stale_time;
        self
    }

    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Query options derived from this config.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            stale_time: self.default_stale_time,
            enabled: true,
            retry: self.retry.clone(),
        }
    }
}

/// Options for a single `get`/`fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a successful value stays fresh.
    pub stale_time: Duration,
    /// When `false`, reads never trigger a fetch.
    pub enabled: bool,
    pub retry: RetryPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        CacheConfig::default().query_options()
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
