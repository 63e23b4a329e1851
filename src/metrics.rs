//! Metrics sink interface and implementations.
//!
//! The hook/constant-name split here follows the teacher's `metrics::meter` module: named
//! string constants for metric identifiers, thin free functions wrapping the `metrics`
//! crate's macros, all callable without holding any cache lock.

use std::time::Duration;

pub const ALLOC: &str = "cbytecache_arena_alloc_total";
pub const FILL: &str = "cbytecache_arena_fill_bytes";
pub const RESET: &str = "cbytecache_shard_reset_total";
pub const RELEASE: &str = "cbytecache_arena_release_total";
pub const SET: &str = "cbytecache_set_total";
pub const HIT: &str = "cbytecache_hit_total";
pub const EVICT: &str = "cbytecache_evict_total";
pub const MISS: &str = "cbytecache_miss_total";
pub const EXPIRE: &str = "cbytecache_expire_total";
pub const CORRUPT: &str = "cbytecache_corrupt_total";
pub const COLLISION: &str = "cbytecache_collision_total";
pub const NO_SPACE: &str = "cbytecache_no_space_total";
pub const DUMP: &str = "cbytecache_dump_total";
pub const LOAD: &str = "cbytecache_load_total";

/// Counter and timing hooks invoked at the named cache lifecycle points.
///
/// Every hook must be safe to call concurrently from any shard without coordination; the
/// cache never holds a shard lock across a call into this trait.
pub trait MetricsSink: Send + Sync {
    fn alloc(&self, count: u64) {
        let _ = count;
    }
    fn fill(&self, bytes: u64) {
        let _ = bytes;
    }
    fn reset(&self, count: u64) {
        let _ = count;
    }
    fn release(&self, count: u64) {
        let _ = count;
    }
    fn set(&self, duration: Duration) {
        let _ = duration;
    }
    fn hit(&self, duration: Duration) {
        let _ = duration;
    }
    fn evict(&self, count: u64) {
        let _ = count;
    }
    fn miss(&self, count: u64) {
        let _ = count;
    }
    fn expire(&self, count: u64) {
        let _ = count;
    }
    fn corrupt(&self, count: u64) {
        let _ = count;
    }
    fn collision(&self, count: u64) {
        let _ = count;
    }
    fn no_space(&self, count: u64) {
        let _ = count;
    }
    fn dump(&self, count: u64) {
        let _ = count;
    }
    fn load(&self, count: u64) {
        let _ = count;
    }
}

/// Default no-op sink, used when the caller doesn't configure one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Adapter that forwards every hook to the `metrics` crate's global recorder, matching
/// the teacher's choice of the `metrics`/`metrics-exporter-prometheus` pairing (the
/// exporter itself is an embedding concern, not this crate's).
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsCrateSink;

impl MetricsSink for MetricsCrateSink {
    fn alloc(&self, count: u64) {
        metrics::counter!(ALLOC).increment(count);
    }
    fn fill(&self, bytes: u64) {
        metrics::counter!(FILL).increment(bytes);
    }
    fn reset(&self, count: u64) {
        metrics::counter!(RESET).increment(count);
    }
    fn release(&self, count: u64) {
        metrics::counter!(RELEASE).increment(count);
    }
    fn set(&self, duration: Duration) {
        metrics::histogram!(SET).record(duration.as_secs_f64());
    }
    fn hit(&self, duration: Duration) {
        metrics::histogram!(HIT).record(duration.as_secs_f64());
    }
    fn evict(&self, count: u64) {
        metrics::counter!(EVICT).increment(count);
    }
    fn miss(&self, count: u64) {
        metrics::counter!(MISS).increment(count);
    }
    fn expire(&self, count: u64) {
        metrics::counter!(EXPIRE).increment(count);
    }
    fn corrupt(&self, count: u64) {
        metrics::counter!(CORRUPT).increment(count);
    }
    fn collision(&self, count: u64) {
        metrics::counter!(COLLISION).increment(count);
    }
    fn no_space(&self, count: u64) {
        metrics::counter!(NO_SPACE).increment(count);
    }
    fn dump(&self, count: u64) {
        metrics::counter!(DUMP).increment(count);
    }
    fn load(&self, count: u64) {
        metrics::counter!(LOAD).increment(count);
    }
}
