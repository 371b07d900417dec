use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

use crate::keys::CacheKey;
use crate::{HermodError, Result};

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never fetched (or cleared by `remove` while subscribed).
    Idle,
    /// A fetch is in flight. A previous value may still be present.
    Loading,
    Success,
    /// The last fetch failed. A previous value may still be present.
    Error,
}

/// Snapshot of one cached query.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: QueryStatus,
    /// Last good value, kept across failed and in-flight refetches.
    pub value: Option<Value>,
    pub error: Option<HermodError>,
    pub fetched_at: Option<Instant>,
    pub stale_at: Option<Instant>,
    /// Retries performed by the current (or last failed) fetch.
    pub retry_count: u32,
    pub subscriber_count: usize,
}

impl CacheEntry {
    pub(crate) fn new(key: CacheKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            value: None,
            error: None,
            fetched_at: None,
            stale_at: None,
            retry_count: 0,
            subscriber_count: 0,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Loading with nothing to show yet.
    pub fn is_initial_loading(&self) -> bool {
        self.is_fetching() && self.value.is_none()
    }

    /// Stale at `now`: never fetched, or past its freshness window.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        match self.stale_at {
            Some(stale_at) => now >= stale_at,
            None => true,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    /// Decode the cached value into a typed view.
    pub fn data<T: DeserializeOwned>(&self) -> Option<Result<T>> {
        self.value
            .as_ref()
            .map(|v| serde_json::from_value(v.clone()).map_err(HermodError::from))
    }

    pub(crate) fn reset(&mut self) {
        let subscribers = self.subscriber_count;
        *self = Self::new(self.key.clone());
        self.subscriber_count = subscribers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ResourceKeys;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn new_entry_is_idle_and_stale() {
        let entry = CacheEntry::new(ResourceKeys::new("invoices").lists());
        assert_eq!(entry.status, QueryStatus::Idle);
        assert!(entry.is_stale());
        assert!(!entry.is_fetching());
    }

    #[test]
    fn staleness_is_inclusive() {
        let now = Instant::now();
        let mut entry = CacheEntry::new(ResourceKeys::new("invoices").lists());
        entry.fetched_at = Some(now);
        entry.stale_at = Some(now + Duration::from_secs(10));
        assert!(!entry.is_stale_at(now));
        assert!(entry.is_stale_at(now + Duration::from_secs(10)));
    }

    #[test]
    fn reset_keeps_subscribers() {
        let mut entry = CacheEntry::new(ResourceKeys::new("invoices").detail(1));
        entry.value = Some(json!({ "id": "1" }));
        entry.status = QueryStatus::Success;
        entry.subscriber_count = 2;
        entry.reset();
        assert_eq!(entry.value, None);
        assert_eq!(entry.status, QueryStatus::Idle);
        assert_eq!(entry.subscriber_count, 2);
    }

    #[test]
    fn data_decodes_typed_view() {
        let mut entry = CacheEntry::new(ResourceKeys::new("invoices").detail(1));
        entry.value = Some(json!([1, 2, 3]));
        let data: Vec<u32> = entry.data().unwrap().unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }
}
