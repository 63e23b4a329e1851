//! Shard: the locked storage unit owning one index, one time-sorted entry vector, and
//! one arena queue. Grounded on the teacher's `RwLock`-protected `Shard<V>` for the
//! locking/atomic-counter pattern (`storage/map/shard.rs`), and on the original
//! `bucket.go`'s `setLF`/`get`/`bulkEvict` for the write/read/eviction procedures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::arena::NONE;
use crate::arena_queue::ArenaQueue;
use crate::dump::DumpSink;
use crate::entry::{Entry, EntryVec};
use crate::error::{CacheError, Result};
use crate::framing;
use crate::listener::ExpireListener;
use crate::metrics::MetricsSink;
use crate::size::{Size, Snapshot};

/// Per-shard lifecycle state. All public operations fail fast on a status other than
/// `Active`, checked via an atomic load without taking the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    Active,
    Service,
    Corrupt,
}

impl ShardStatus {
    fn as_u8(self) -> u8 {
        match self {
            ShardStatus::Active => 0,
            ShardStatus::Service => 1,
            ShardStatus::Corrupt => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ShardStatus::Active,
            1 => ShardStatus::Service,
            _ => ShardStatus::Corrupt,
        }
    }
}

struct ShardData {
    index: HashMap<u64, usize>,
    entries: EntryVec,
    arenas: ArenaQueue,
}

pub struct Shard {
    id: usize,
    data: RwLock<ShardData>,
    status: AtomicU8,
    size: Size,
    arena_capacity: u32,
    capacity: u32,
    collision_check: bool,
    ttl_secs: u32,
    evict_interval_secs: u32,
    last_evict: AtomicU32,
    metrics: Arc<dyn MetricsSink>,
    listener: Arc<dyn ExpireListener>,
}

impl Shard {
    pub fn new(
        id: usize,
        arena_capacity: u32,
        capacity: u32,
        collision_check: bool,
        ttl: Duration,
        evict_interval: Duration,
        metrics: Arc<dyn MetricsSink>,
        listener: Arc<dyn ExpireListener>,
    ) -> Self {
        Self {
            id,
            data: RwLock::new(ShardData {
                index: HashMap::new(),
                entries: EntryVec::new(),
                arenas: ArenaQueue::new(),
            }),
            status: AtomicU8::new(ShardStatus::Active.as_u8()),
            size: Size::new(),
            arena_capacity,
            capacity,
            collision_check,
            ttl_secs: ttl.as_secs() as u32,
            evict_interval_secs: evict_interval.as_secs().max(1) as u32,
            last_evict: AtomicU32::new(0),
            metrics,
            listener,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn status(&self) -> ShardStatus {
        ShardStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn size(&self) -> Snapshot {
        self.size.snapshot()
    }

    fn check_active(&self) -> Result<()> {
        match self.status() {
            ShardStatus::Active => Ok(()),
            ShardStatus::Service => Err(CacheError::BucketUnderService(self.id)),
            ShardStatus::Corrupt => Err(CacheError::BucketCorrupt(self.id)),
        }
    }

    fn enter_service(&self) {
        self.status.store(ShardStatus::Service.as_u8(), Ordering::Release);
    }

    fn leave_service(&self) {
        self.status.store(ShardStatus::Active.as_u8(), Ordering::Release);
    }

    /// Reassembles the full framed record for `entry` by walking its arena chain.
    fn reassemble(data: &ShardData, entry: &Entry) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(entry.length as usize);
        let mut remaining = entry.length;
        let mut arena_id = entry.arena_id;
        let mut offset = entry.offset;
        while remaining > 0 {
            if arena_id == NONE {
                return Err(CacheError::EntryCorrupt);
            }
            let arena = data.arenas.get(arena_id);
            let avail = arena.capacity().saturating_sub(offset);
            let take = avail.min(remaining);
            if take == 0 {
                return Err(CacheError::EntryCorrupt);
            }
            out.extend_from_slice(arena.read(offset, take));
            remaining -= take;
            offset = 0;
            arena_id = data.arenas.next_of(arena_id);
        }
        Ok(out)
    }

    /// Computes how many additional arenas (beyond whatever `active` can still hold)
    /// would be needed to fit `required` bytes, and whether doing so would violate the
    /// shard's byte-capacity ceiling. Performs no mutation.
    fn plan_arenas(&self, data: &ShardData, required: u32) -> Result<u32> {
        let active_remaining = if data.arenas.active() == NONE {
            0
        } else {
            data.arenas.get(data.arenas.active()).remaining()
        };
        if required <= active_remaining {
            return Ok(0);
        }
        let deficit = required - active_remaining;
        let new_arenas = deficit.div_ceil(self.arena_capacity).max(1);
        if self.capacity != 0 {
            let projected = self.size.snapshot().total + new_arenas * self.arena_capacity;
            if projected > self.capacity {
                self.metrics.no_space(1);
                return Err(CacheError::NoSpace);
            }
        }
        Ok(new_arenas)
    }

    pub fn set(&self, key: &[u8], payload: &[u8], hash: u64, now: u32, expire: u32) -> Result<()> {
        self.check_active()?;
        if payload.len() as u32 > self.capacity && self.capacity != 0 {
            return Err(CacheError::EntryTooBig {
                len: payload.len(),
                max: self.capacity as usize,
            });
        }
        let started = Instant::now();
        let record = framing::frame(key, payload)?;

        let mut data = self.data.write();

        if let Some(&pos) = data.index.get(&hash) {
            let existing = *data.entries.get(pos);
            if self.collision_check {
                let stored = Self::reassemble(&data, &existing)?;
                let (_payload, stored_key) = framing::unframe(&stored)?;
                if stored_key == key {
                    return Err(CacheError::EntryExists);
                }
                self.metrics.collision(1);
                return Err(CacheError::EntryCollision { hash });
            }
            return Err(CacheError::EntryExists);
        }

        let needed_new_arenas = self.plan_arenas(&data, record.len() as u32)?;
        for _ in 0..needed_new_arenas {
            let prev = data.arenas.tail();
            let new_id = data
                .arenas
                .alloc(prev, self.arena_capacity)
                .map_err(|e| CacheError::Io(e.to_string()))?;
            if data.arenas.active() == NONE {
                data.arenas.set_active(new_id);
            }
            self.size.add_total(self.arena_capacity);
            self.size.add_free(self.arena_capacity);
            self.metrics.alloc(1);
        }

        let start_arena = data.arenas.active();
        let start_offset = data.arenas.get(start_arena).used();

        let mut remaining: &[u8] = &record;
        let mut cursor = start_arena;
        while !remaining.is_empty() {
            let space = data.arenas.get(cursor).remaining();
            let take = space.min(remaining.len() as u32) as usize;
            let (chunk, rest) = remaining.split_at(take);
            data.arenas.get_mut(cursor).write(chunk);
            self.size.add_used(take as u32);
            self.size.sub_free(take as u32);
            remaining = rest;
            if !remaining.is_empty() {
                let next = data.arenas.next_of(cursor);
                if next == NONE {
                    self.metrics.no_space(1);
                    return Err(CacheError::NoSpace);
                }
                cursor = next;
                data.arenas.set_active(cursor);
            }
        }
        self.metrics.fill(record.len() as u64);

        let entry = Entry {
            hash,
            arena_id: start_arena,
            offset: start_offset,
            length: record.len() as u32,
            expire,
        };
        let pos = data.entries.push(entry);
        data.index.insert(hash, pos);

        self.metrics.set(started.elapsed());
        Ok(())
    }

    pub fn get(&self, hash: u64, now: u32) -> Result<Vec<u8>> {
        self.check_active()?;
        let started = Instant::now();
        let data = self.data.read();
        let pos = match data.index.get(&hash) {
            Some(&p) => p,
            None => {
                self.metrics.miss(1);
                return Err(CacheError::EntryNotFound);
            }
        };
        let entry = *data.entries.get(pos);
        if entry.expire < now {
            self.metrics.expire(1);
            return Err(CacheError::EntryNotFound);
        }
        let record = match Self::reassemble(&data, &entry) {
            Ok(r) => r,
            Err(e) => {
                self.metrics.corrupt(1);
                return Err(e);
            }
        };
        let (payload, _key) = framing::unframe(&record)?;
        self.metrics.hit(started.elapsed());
        Ok(payload.to_vec())
    }

    /// Evicts expired entries. `force` bypasses the anti-thrash gate (used by vacuum).
    /// Returns the number of entries removed.
    pub fn evict(&self, now: u32, force: bool) -> Result<u32> {
        self.check_active()?;
        if !force {
            let last = self.last_evict.load(Ordering::Acquire);
            let elapsed = now.saturating_sub(last);
            if last != 0 && (elapsed as u64) * 100 < self.evict_interval_secs as u64 * 90 {
                return Ok(0);
            }
        }

        self.enter_service();
        let result = self.evict_locked(now);
        self.last_evict.store(now, Ordering::Release);
        self.leave_service();
        result
    }

    fn evict_locked(&self, now: u32) -> Result<u32> {
        let mut data = self.data.write();
        if data.entries.is_empty() {
            return Ok(0);
        }
        let z = data.entries.lower_bound(now);
        if z == 0 {
            return Ok(0);
        }

        if z == data.entries.len() {
            let freed = self.drain_listener(&mut data, 0, z)?;
            data.entries.clear();
            data.index.clear();
            data.arenas.reset_all();
            self.size.reset();
            self.metrics.evict(freed);
            return Ok(freed as u32);
        }

        let freed = self.drain_listener(&mut data, 0, z)?;

        let last_expired_arena = data.entries.get(z - 1).arena_id;
        let lo = data.arenas.prev_of(last_expired_arena);

        let mut freed_bytes = 0u32;
        for i in 0..z {
            freed_bytes += data.entries.get(i).length;
        }

        data.arenas.recycle(lo);
        data.arenas.reset_post_active();

        data.entries.compact_from(z);
        data.index.clear();
        let live: Vec<(u64, usize)> = data
            .entries
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, e)| (e.hash, i))
            .collect();
        for (hash, pos) in live {
            data.index.insert(hash, pos);
        }

        self.size.sub_used(freed_bytes);
        self.size.add_free(freed_bytes);
        self.metrics.evict(freed);

        Ok(freed as u32)
    }

    fn drain_listener(&self, data: &mut ShardData, from: usize, to: usize) -> Result<u64> {
        let mut count = 0u64;
        for i in from..to {
            let entry = *data.entries.get(i);
            if let Ok(record) = Self::reassemble(data, &entry) {
                if let Ok((payload, key)) = framing::unframe(&record) {
                    self.listener.listen(key, payload);
                }
            }
            count += 1;
        }
        Ok(count)
    }

    /// Forces an eviction pass, then releases `ratio` of the post-active allocated
    /// arenas back to the OS, walking from the tail backwards.
    pub fn vacuum(&self, now: u32, ratio: f64) -> Result<u32> {
        self.check_active()?;
        self.evict(now, true)?;

        self.enter_service();
        let mut data = self.data.write();
        let t = data.arenas.count_post_active();
        let r = (t as f64 * ratio).floor() as u32;
        let released = data.arenas.release_from_tail(r);
        drop(data);
        self.leave_service();

        if released > 0 {
            self.size.sub_total(released * self.arena_capacity);
            self.size.sub_free(released * self.arena_capacity);
        }
        self.metrics.release(released as u64);
        Ok(released)
    }

    /// Clears entries and the index; arena allocations are kept but their cursors are
    /// zeroed so the shard is immediately reusable.
    pub fn reset(&self) {
        self.enter_service();
        let mut data = self.data.write();
        let count = data.entries.len() as u64;
        data.entries.clear();
        data.index.clear();
        data.arenas.reset_all();
        drop(data);
        self.size.reset();
        self.metrics.reset(count);
        self.leave_service();
    }

    /// Terminal reclaim: evicts everything through the listener, releases every arena,
    /// and clears the head/active/tail cursors.
    pub fn release(&self) {
        self.enter_service();
        let mut data = self.data.write();
        let n = data.entries.len();
        let _ = self.drain_listener(&mut data, 0, n);
        data.entries.clear();
        data.index.clear();
        data.arenas.release_all();
        drop(data);
        self.size.clear();
        self.leave_service();
    }

    /// Snapshots every non-expired entry into `sink`, skipping the already-expired
    /// prefix via the same binary search eviction uses.
    pub fn dump(&self, now: u32, sink: &dyn DumpSink) -> Result<u32> {
        self.check_active()?;
        let data = self.data.read();
        let z = data.entries.lower_bound(now);
        let mut count = 0u32;
        for i in z..data.entries.len() {
            let entry = *data.entries.get(i);
            let record = Self::reassemble(&data, &entry)?;
            let (payload, key) = framing::unframe(&record)?;
            sink.write(key, payload, entry.expire)
                .map_err(|e| CacheError::Io(e.to_string()))?;
            count += 1;
        }
        self.metrics.dump(count as u64);
        Ok(count)
    }

    /// Inserts a record with an explicit (already-computed) expiry, used by the load
    /// pipeline to preserve a dump's original aging state instead of substituting
    /// `now + ttl`.
    pub fn set_with_expire(&self, key: &[u8], payload: &[u8], hash: u64, expire: u32) -> Result<()> {
        self.set(key, payload, hash, 0, expire)
    }

    pub fn ttl_secs(&self) -> u32 {
        self.ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoopListener;
    use crate::metrics::NoopMetrics;

    fn shard(arena_cap: u32, cap: u32, collision_check: bool) -> Shard {
        Shard::new(
            0,
            arena_cap,
            cap,
            collision_check,
            Duration::from_secs(60),
            Duration::from_secs(60),
            Arc::new(NoopMetrics),
            Arc::new(NoopListener),
        )
    }

    #[test]
    fn set_get_round_trip() {
        let s = shard(1024, 0, true);
        s.set(b"foo", b"bar", 1, 0, 1_000_000).unwrap();
        assert_eq!(s.get(1, 0).unwrap(), b"bar".to_vec());
    }

    #[test]
    fn get_after_expire_misses_without_removal() {
        let s = shard(1024, 0, true);
        s.set(b"foo", b"bar", 1, 0, 10).unwrap();
        assert!(s.get(1, 20).is_err());
    }

    #[test]
    fn collision_check_detects_mismatched_key() {
        let s = shard(1024, 0, true);
        s.set(b"a", b"1", 1, 0, 1000).unwrap();
        match s.set(b"b", b"2", 1, 0, 1000) {
            Err(CacheError::EntryCollision { hash: 1 }) => {}
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_key_without_collision_check_is_exists() {
        let s = shard(1024, 0, false);
        s.set(b"a", b"1", 1, 0, 1000).unwrap();
        assert_eq!(s.set(b"a", b"2", 1, 0, 1000).unwrap_err(), CacheError::EntryExists);
    }

    #[test]
    fn write_spans_multiple_arenas() {
        let s = shard(16, 0, true);
        let payload = vec![b'x'; 100];
        s.set(b"k", &payload, 1, 0, 1000).unwrap();
        assert_eq!(s.get(1, 0).unwrap(), payload);
    }

    #[test]
    fn evict_removes_expired_prefix() {
        let s = shard(1024, 0, true);
        s.set(b"a", b"1", 1, 0, 10).unwrap();
        s.set(b"b", b"2", 2, 0, 20).unwrap();
        let n = s.evict(15, true).unwrap();
        assert_eq!(n, 1);
        assert!(s.get(1, 15).is_err());
        assert_eq!(s.get(2, 15).unwrap(), b"2".to_vec());
    }

    #[test]
    fn reset_clears_entries_keeps_allocation() {
        let s = shard(1024, 0, true);
        s.set(b"a", b"1", 1, 0, 1000).unwrap();
        s.reset();
        assert!(s.get(1, 0).is_err());
    }
}
