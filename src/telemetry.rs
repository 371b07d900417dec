//! Telemetry metric name constants.
//!
//! Centralised metric names for hermod operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hermod_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `domain` — resource domain (e.g. "invoices", "customerTypes")
//! - `operation` — mutation kind: "create", "update" or "delete"
//! - `status` — outcome: "ok" or "error"

/// Reads served from a fresh cache entry.
///
/// Labels: `domain`.
pub const CACHE_HITS_TOTAL: &str = "hermod_cache_hits_total";

/// Reads that found a missing or stale entry.
///
/// Labels: `domain`.
pub const CACHE_MISSES_TOTAL: &str = "hermod_cache_misses_total";

/// Fetches started by the query cache (deduplicated, retries excluded).
///
/// Labels: `domain`.
pub const FETCHES_TOTAL: &str = "hermod_fetches_total";

/// Fetch duration in seconds, from first attempt to settlement.
///
/// Labels: `domain`, `status`.
pub const FETCH_DURATION_SECONDS: &str = "hermod_fetch_duration_seconds";

/// Retry attempts (not counting the initial request).
///
/// Labels: `domain`.
pub const RETRIES_TOTAL: &str = "hermod_retries_total";

/// Entries marked stale by invalidation.
///
/// Labels: `domain`.
pub const INVALIDATIONS_TOTAL: &str = "hermod_invalidations_total";

/// Entries evicted after their idle window.
///
/// Labels: `domain`.
pub const EVICTIONS_TOTAL: &str = "hermod_evictions_total";

/// Mutations executed through the coordinator.
///
/// Labels: `domain`, `operation`, `status`.
pub const MUTATIONS_TOTAL: &str = "hermod_mutations_total";
