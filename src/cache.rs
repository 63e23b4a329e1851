//! Cache: fixed power-of-two array of shards, hash-and-mask routing, the bulk
//! dispatcher, periodic scheduler registration, and the dump/load pipeline.
//!
//! Grounded on `cache.go`: the `New()` validation sequence, `bulkExec`-based
//! `evict`/`vacuum`/`dump`, and the `load()` worker-pool restore pipeline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::CacheConfig;
use crate::dispatcher::bulk_exec;
use crate::error::{CacheError, Result};
use crate::shard::Shard;
use crate::size::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Uninitialised,
    Active,
    Closed,
}

impl CacheStatus {
    fn as_u8(self) -> u8 {
        match self {
            CacheStatus::Uninitialised => 0,
            CacheStatus::Active => 1,
            CacheStatus::Closed => 2,
        }
    }
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CacheStatus::Uninitialised,
            1 => CacheStatus::Active,
            _ => CacheStatus::Closed,
        }
    }
}

pub struct Cache {
    shards: Vec<Arc<Shard>>,
    mask: u64,
    config: CacheConfig,
    status: AtomicU8,
}

impl Cache {
    /// Validates `config`, builds the shard array, registers the periodic
    /// evict/vacuum/dump callbacks, and synchronously loads from the configured dump
    /// source if one is set.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let shard_count = config.buckets;
        let mask = (shard_count - 1) as u64;

        let shards: Vec<Arc<Shard>> = (0..shard_count)
            .map(|id| {
                Arc::new(Shard::new(
                    id,
                    config.arena_capacity,
                    config.capacity,
                    config.collision_check,
                    config.expire_interval,
                    config.evict_interval,
                    config.metrics.clone(),
                    config.expire_listener.clone(),
                ))
            })
            .collect();

        let cache = Self {
            shards,
            mask,
            config,
            status: AtomicU8::new(CacheStatus::Uninitialised.as_u8()),
        };

        cache.register_schedules();
        cache.status.store(CacheStatus::Active.as_u8(), Ordering::Release);

        if cache.config.dump_reader.is_some() {
            cache.load()?;
        }

        Ok(cache)
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn check_cache(&self, allow: &[CacheStatus]) -> Result<()> {
        match self.status() {
            CacheStatus::Uninitialised => Err(CacheError::BadCache),
            CacheStatus::Closed if !allow.contains(&CacheStatus::Closed) => Err(CacheError::CacheClosed),
            s if allow.contains(&s) => Ok(()),
            _ => Err(CacheError::BadCache),
        }
    }

    fn shard_for(&self, hash: u64) -> &Arc<Shard> {
        &self.shards[(hash & self.mask) as usize]
    }

    pub fn set(&self, key: &[u8], payload: &[u8]) -> Result<()> {
        self.check_cache(&[CacheStatus::Active])?;
        let hash = self.config.hasher.sum64(key);
        let now = self.config.clock.now();
        let expire = now.saturating_add(self.config.expire_interval.as_secs() as u32);
        self.shard_for(hash).set(key, payload, hash, now, expire)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_cache(&[CacheStatus::Active])?;
        let hash = self.config.hasher.sum64(key);
        let now = self.config.clock.now();
        self.shard_for(hash).get(hash, now)
    }

    /// Sum of every shard's byte-accounting snapshot.
    pub fn size(&self) -> Snapshot {
        let mut total = 0u32;
        let mut used = 0u32;
        let mut free = 0u32;
        for s in &self.shards {
            let snap = s.size();
            total = total.saturating_add(snap.total);
            used = used.saturating_add(snap.used);
            free = free.saturating_add(snap.free);
        }
        Snapshot { total, used, free }
    }

    pub fn reset(&self) -> Result<()> {
        self.check_cache(&[CacheStatus::Active])?;
        let shards = self.shards.clone();
        bulk_exec(shards.len(), self.config.reset_workers, move |idx| {
            shards[idx].reset();
        });
        Ok(())
    }

    /// Terminal reclaim. Valid from `Active` or `Closed`; marks the cache `Closed`.
    pub fn release(&self) -> Result<()> {
        self.check_cache(&[CacheStatus::Active, CacheStatus::Closed])?;
        let shards = self.shards.clone();
        bulk_exec(shards.len(), self.config.release_workers, move |idx| {
            shards[idx].release();
        });
        self.status.store(CacheStatus::Closed.as_u8(), Ordering::Release);
        Ok(())
    }

    /// Stops the scheduler, runs a final dump if configured, then releases everything.
    pub fn close(&self) -> Result<()> {
        self.config.clock.stop();
        if self.config.dump_writer.is_some() {
            if let Err(e) = self.dump() {
                warn!(component = "cache", event = "close_dump_failed", error = %e, "dump on close failed");
            }
        }
        self.release()
    }

    pub fn evict(&self) -> Result<()> {
        self.check_cache(&[CacheStatus::Active])?;
        let shards = self.shards.clone();
        let now = self.config.clock.now();
        let workers = self.config.evict_workers;
        bulk_exec(shards.len(), workers, move |idx| {
            if let Err(e) = shards[idx].evict(now, false) {
                warn!(component = "cache", event = "evict_failed", shard = idx, error = %e, "evict failed");
            }
        });
        Ok(())
    }

    pub fn vacuum(&self) -> Result<()> {
        self.check_cache(&[CacheStatus::Active])?;
        let shards = self.shards.clone();
        let now = self.config.clock.now();
        let ratio = self.config.vacuum_ratio;
        let workers = self.config.vacuum_workers;
        bulk_exec(shards.len(), workers, move |idx| {
            if let Err(e) = shards[idx].vacuum(now, ratio) {
                warn!(component = "cache", event = "vacuum_failed", shard = idx, error = %e, "vacuum failed");
            }
        });
        Ok(())
    }

    pub fn dump(&self) -> Result<()> {
        self.check_cache(&[CacheStatus::Active])?;
        let sink = self
            .config
            .dump_writer
            .clone()
            .ok_or(CacheError::NoEnqueuer)?;
        let shards = self.shards.clone();
        let now = self.config.clock.now();
        let workers = self.config.dump_write_workers;
        bulk_exec(shards.len(), workers, move |idx| {
            if let Err(e) = shards[idx].dump(now, sink.as_ref()) {
                warn!(component = "cache", event = "dump_failed", shard = idx, error = %e, "dump failed");
            }
        });
        sink.flush().map_err(|e| CacheError::Io(e.to_string()))?;
        Ok(())
    }

    /// Restores from the configured dump source: one producer reads records into a
    /// bounded channel, `dump_read_workers` consumers re-hash each key and write it to
    /// its shard with the record's own expiry, preserving the snapshot's aging state.
    fn load(&self) -> Result<()> {
        let source = self
            .config
            .dump_reader
            .clone()
            .ok_or(CacheError::NoUnmarshaller)?;

        let (tx, rx) = sync_channel(self.config.dump_read_buffer);
        let rx = Arc::new(std::sync::Mutex::new(rx));

        let producer = std::thread::spawn(move || loop {
            match source.read() {
                Ok(rec) => {
                    if tx.send(rec).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        let workers = self.config.dump_read_workers;
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let hasher = self.config.hasher.clone();
            let shards = self.shards.clone();
            let mask = self.mask;
            let metrics = self.config.metrics.clone();
            handles.push(std::thread::spawn(move || loop {
                let rec = {
                    let guard = rx.lock().unwrap();
                    guard.recv()
                };
                match rec {
                    Ok(rec) => {
                        let hash = hasher.sum64(&rec.key);
                        let shard = &shards[(hash & mask) as usize];
                        if let Err(e) = shard.set_with_expire(&rec.key, &rec.payload, hash, rec.expire) {
                            debug!(component = "cache", event = "load_record_skipped", error = %e, "skipped dump record");
                        } else {
                            metrics.load(1);
                        }
                    }
                    Err(_) => break,
                }
            }));
        }

        if producer.join().is_err() {
            error!(component = "cache", event = "load_producer_panicked", "dump source reader thread panicked");
        }
        for h in handles {
            let _ = h.join();
        }

        Ok(())
    }

    fn register_schedules(&self) {
        let clock = self.config.clock.clone();

        {
            let shards = self.shards.clone();
            let interval = self.config.evict_interval;
            let workers = self.config.evict_workers;
            let clock_for_tick = clock.clone();
            clock.schedule(
                interval,
                Box::new(move || {
                    let shards = shards.clone();
                    let now = clock_for_tick.now();
                    bulk_exec(shards.len(), workers, move |idx| {
                        let _ = shards[idx].evict(now, false);
                    });
                }),
            );
        }

        if let Some(vacuum_interval) = self.config.vacuum_interval {
            let shards = self.shards.clone();
            let workers = self.config.vacuum_workers;
            let ratio = self.config.vacuum_ratio;
            let clock_for_tick = clock.clone();
            clock.schedule(
                vacuum_interval,
                Box::new(move || {
                    let shards = shards.clone();
                    let now = clock_for_tick.now();
                    bulk_exec(shards.len(), workers, move |idx| {
                        let _ = shards[idx].vacuum(now, ratio);
                    });
                }),
            );
        }
    }
}
