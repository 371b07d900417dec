use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{CacheEntry, QueryCache};
use crate::keys::CacheKey;
use crate::{HermodError, Result};

/// A live interest in one cache key.
///
/// While any subscription exists the entry is never evicted and
/// invalidation refetches it immediately. Dropping the guard (or calling
/// [`unsubscribe()`](Self::unsubscribe)) releases the interest; it never
/// cancels a fetch already in flight.
pub struct Subscription {
    cache: QueryCache,
    key: CacheKey,
    rx: watch::Receiver<CacheEntry>,
    active: bool,
}

impl Subscription {
    pub(crate) fn new(cache: QueryCache, key: CacheKey, rx: watch::Receiver<CacheEntry>) -> Self {
        Self {
            cache,
            key,
            rx,
            active: true,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest state of the entry.
    pub fn current(&self) -> CacheEntry {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new state.
    ///
    /// Fails with `NotFound` once the entry is gone for good (cache cleared).
    pub async fn changed(&mut self) -> Result<CacheEntry> {
        self.rx
            .changed()
            .await
            .map_err(|_| HermodError::NotFound(self.key.to_string()))?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Wait until the entry satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&CacheEntry) -> bool,
    ) -> Result<CacheEntry> {
        match self.rx.wait_for(predicate).await {
            Ok(entry) => Ok(entry.clone()),
            Err(_) => Err(HermodError::NotFound(self.key.to_string())),
        }
    }

    /// Stream of entry states, starting with the current one. The
    /// subscription stays registered until the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = CacheEntry> + Send + 'static {
        let stream = WatchStream::new(self.rx.clone());
        let guard = self;
        stream.map(move |entry| {
            let _registered = &guard;
            entry
        })
    }

    /// Release the subscription now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            self.cache.unsubscribe(&self.key);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.active)
            .finish()
    }
}
