//! Query cache.
//!
//! [`QueryCache`] is the single store every resource client reads and
//! writes through. It is explicitly constructed and passed around (it is a
//! cheap `Arc` handle), so tests get isolated caches for free.
//!
//! # Entry lifecycle
//!
//! ```text
//! Idle ──get──▶ Loading ──ok──▶ Success ──invalidate──▶ Loading (subscribed)
//!                  │                  └──invalidate──▶ Success, stale (unsubscribed)
//!                  └──err──▶ Error ───invalidate/get──▶ Loading
//! ```
//!
//! Any entry with zero subscribers for longer than
//! [`CacheConfig::gc_time`] is evicted, unless a fetch for it is in flight.
//!
//! # Guarantees
//!
//! - At most one fetch per key is in flight. Concurrent readers share it.
//! - A failed fetch keeps the previous value (stale-while-error).
//! - Transient failures are retried per [`RetryPolicy`](crate::RetryPolicy);
//!   client errors are not.
//! - Fetch results land in the cache even if the entry was evicted in the
//!   meantime. Results for entries explicitly [`remove`](QueryCache::remove)d
//!   while the fetch was running are discarded.

mod config;
mod entry;
mod store;
mod subscription;

pub use config::{CacheConfig, QueryOptions};
pub use entry::{CacheEntry, QueryStatus};
pub use store::{Fetcher, QueryCache, fetcher};
pub use subscription::Subscription;
