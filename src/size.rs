//! Lock-free size accounting: total/used/free byte counters per shard and cache-wide.

use std::sync::atomic::{AtomicU32, Ordering};

/// Point-in-time snapshot of a shard's or cache's byte accounting.
///
/// `total == used + free` only holds at quiescent points (no operation in flight); a
/// snapshot taken mid-update may briefly violate it since the three fields are updated
/// independently, not behind a single atomic transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub total: u32,
    pub used: u32,
    pub free: u32,
}

/// Lock-free counters for total/used/free bytes, mirroring the teacher's `mem`/`len`
/// atomic-counter pattern on `Shard` but at the byte-accounting granularity this cache
/// needs (capacity add on arena alloc, used add/sub on set/evict, free mirrored).
#[derive(Debug, Default)]
pub struct Size {
    total: AtomicU32,
    used: AtomicU32,
    free: AtomicU32,
}

impl Size {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total: self.total.load(Ordering::Relaxed),
            used: self.used.load(Ordering::Relaxed),
            free: self.free.load(Ordering::Relaxed),
        }
    }

    pub fn add_total(&self, delta: u32) {
        self.total.fetch_add(delta, Ordering::Relaxed);
    }

    /// Two's-complement subtraction so callers never need a signed counter: decrementing
    /// by `delta` is addition of `u32::MAX - delta + 1`, wrapping back to the same value
    /// a checked subtraction would produce.
    pub fn sub_total(&self, delta: u32) {
        self.total.fetch_add(delta.wrapping_neg(), Ordering::Relaxed);
    }

    pub fn add_used(&self, delta: u32) {
        self.used.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn sub_used(&self, delta: u32) {
        self.used.fetch_add(delta.wrapping_neg(), Ordering::Relaxed);
    }

    pub fn add_free(&self, delta: u32) {
        self.free.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn sub_free(&self, delta: u32) {
        self.free.fetch_add(delta.wrapping_neg(), Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::Relaxed);
        self.free.store(self.total.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.used.store(0, Ordering::Relaxed);
        self.free.store(0, Ordering::Relaxed);
    }
}
