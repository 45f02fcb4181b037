//! Telemetry metric name constants.
//!
//! Centralised metric names for cache operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hal_cache_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: HTTP verb issued: "get", "post", "patch", "delete"
//! - `status`: outcome, "ok" or "error"

/// Total requests issued through the transport.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const FETCHES_TOTAL: &str = "hal_cache_fetches_total";

/// Request duration in seconds.
///
/// Labels: `operation`.
pub const FETCH_DURATION_SECONDS: &str = "hal_cache_fetch_duration_seconds";

/// Loads answered by an already pending handle instead of a new request.
pub const DEDUP_HITS_TOTAL: &str = "hal_cache_dedup_hits_total";

/// Referencing entities reloaded by delete completion.
pub const CASCADE_RELOADS_TOTAL: &str = "hal_cache_cascade_reloads_total";

/// Entries removed from the table by purge, purge-all or delete completion.
pub const PURGES_TOTAL: &str = "hal_cache_purges_total";
