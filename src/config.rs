//! Configuration surface, loadable from YAML/JSON the way the teacher's `Config` is,
//! with `Duration` fields going through `humantime_serde` so `expire_interval: 60s`
//! reads naturally instead of raw nanosecond counts.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::dump::{DumpSink, DumpSource};
use crate::error::{CacheError, Result};
use crate::hash::{Hasher, Xxh3Hasher};
use crate::listener::{ExpireListener, NoopListener};
use crate::metrics::{MetricsSink, NoopMetrics};

pub const MIN_EXPIRE_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_BUCKET_SIZE: u32 = u32::MAX;
pub const DEFAULT_ARENA_CAPACITY: u32 = 1024 * 1024;
pub const DEFAULT_EVICT_WORKERS: usize = 16;
pub const DEFAULT_VACUUM_WORKERS: usize = 16;
pub const DEFAULT_VACUUM_RATIO: f64 = 0.5;

pub const VACUUM_RATIO_WEAK: f64 = 0.25;
pub const VACUUM_RATIO_MODERATE: f64 = 0.5;
pub const VACUUM_RATIO_AGGRESSIVE: f64 = 0.75;

/// Deserializable, YAML/JSON-friendly subset of the configuration surface. Collaborator
/// fields (`Hasher`, `Clock`, sinks) are not serializable and are supplied separately to
/// [`CacheConfig::build`] by the embedding application.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfigFile {
    pub capacity: Option<u64>,
    #[serde(default = "default_arena_capacity")]
    pub arena_capacity: u32,
    pub buckets: usize,
    #[serde(with = "humantime_serde")]
    pub expire_interval: Duration,
    #[serde(default, with = "humantime_serde")]
    pub evict_interval: Option<Duration>,
    #[serde(default = "default_evict_workers")]
    pub evict_workers: usize,
    #[serde(default, with = "humantime_serde")]
    pub vacuum_interval: Option<Duration>,
    #[serde(default = "default_vacuum_workers")]
    pub vacuum_workers: usize,
    #[serde(default = "default_vacuum_ratio")]
    pub vacuum_ratio: f64,
    #[serde(default = "default_evict_workers")]
    pub reset_workers: usize,
    #[serde(default = "default_evict_workers")]
    pub release_workers: usize,
    #[serde(default = "default_true")]
    pub collision_check: bool,
    #[serde(default, with = "humantime_serde")]
    pub dump_interval: Option<Duration>,
    #[serde(default = "default_one")]
    pub dump_write_workers: usize,
    #[serde(default = "default_dump_read_buffer")]
    pub dump_read_buffer: usize,
    #[serde(default = "default_one")]
    pub dump_read_workers: usize,
    #[serde(default)]
    pub dump_read_async: bool,
}

fn default_arena_capacity() -> u32 {
    DEFAULT_ARENA_CAPACITY
}
fn default_evict_workers() -> usize {
    DEFAULT_EVICT_WORKERS
}
fn default_vacuum_workers() -> usize {
    DEFAULT_VACUUM_WORKERS
}
fn default_vacuum_ratio() -> f64 {
    DEFAULT_VACUUM_RATIO
}
fn default_true() -> bool {
    true
}
fn default_one() -> usize {
    1
}
fn default_dump_read_buffer() -> usize {
    1024
}

impl Default for CacheConfigFile {
    fn default() -> Self {
        Self {
            capacity: None,
            arena_capacity: default_arena_capacity(),
            buckets: 16,
            expire_interval: Duration::from_secs(60),
            evict_interval: None,
            evict_workers: default_evict_workers(),
            vacuum_interval: None,
            vacuum_workers: default_vacuum_workers(),
            vacuum_ratio: default_vacuum_ratio(),
            reset_workers: default_evict_workers(),
            release_workers: default_evict_workers(),
            collision_check: true,
            dump_interval: None,
            dump_write_workers: 1,
            dump_read_buffer: default_dump_read_buffer(),
            dump_read_workers: 1,
            dump_read_async: false,
        }
    }
}

impl CacheConfigFile {
    pub fn load(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
        let cfg = if ext == "json" {
            serde_json::from_str(&text).with_context(|| "failed to parse JSON config")?
        } else {
            serde_yaml::from_str(&text).with_context(|| "failed to parse YAML config")?
        };
        Ok(cfg)
    }
}

/// Full, validated configuration with every collaborator resolved to a concrete trait
/// object. Copied (by value) into the `Cache` at construction; later mutation of the
/// caller's source values has no effect.
pub struct CacheConfig {
    pub capacity: u32,
    pub arena_capacity: u32,
    pub hasher: Arc<dyn Hasher>,
    pub buckets: usize,
    pub expire_interval: Duration,
    pub evict_interval: Duration,
    pub evict_workers: usize,
    pub vacuum_interval: Option<Duration>,
    pub vacuum_workers: usize,
    pub vacuum_ratio: f64,
    pub reset_workers: usize,
    pub release_workers: usize,
    pub collision_check: bool,
    pub clock: Arc<dyn Clock>,
    pub expire_listener: Arc<dyn ExpireListener>,
    pub dump_writer: Option<Arc<dyn DumpSink>>,
    pub dump_interval: Option<Duration>,
    pub dump_write_workers: usize,
    pub dump_reader: Option<Arc<dyn DumpSource>>,
    pub dump_read_buffer: usize,
    pub dump_read_workers: usize,
    pub dump_read_async: bool,
    pub metrics: Arc<dyn MetricsSink>,
}

/// Builder mirroring [`CacheConfig`]'s fields, defaulting every collaborator the same
/// way cache construction would.
pub struct CacheConfigBuilder {
    file: CacheConfigFile,
    hasher: Option<Arc<dyn Hasher>>,
    clock: Option<Arc<dyn Clock>>,
    expire_listener: Option<Arc<dyn ExpireListener>>,
    dump_writer: Option<Arc<dyn DumpSink>>,
    dump_reader: Option<Arc<dyn DumpSource>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl CacheConfigBuilder {
    pub fn new(file: CacheConfigFile) -> Self {
        Self {
            file,
            hasher: None,
            clock: None,
            expire_listener: None,
            dump_writer: None,
            dump_reader: None,
            metrics: None,
        }
    }

    pub fn hasher(mut self, h: Arc<dyn Hasher>) -> Self {
        self.hasher = Some(h);
        self
    }

    pub fn clock(mut self, c: Arc<dyn Clock>) -> Self {
        self.clock = Some(c);
        self
    }

    pub fn expire_listener(mut self, l: Arc<dyn ExpireListener>) -> Self {
        self.expire_listener = Some(l);
        self
    }

    pub fn dump_writer(mut self, w: Arc<dyn DumpSink>) -> Self {
        self.dump_writer = Some(w);
        self
    }

    pub fn dump_reader(mut self, r: Arc<dyn DumpSource>) -> Self {
        self.dump_reader = Some(r);
        self
    }

    pub fn metrics(mut self, m: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(m);
        self
    }

    /// Validates and resolves the configuration. Performs exactly the checks the
    /// original cache constructor does: hasher presence, power-of-two bucket count,
    /// bucket size vs. arena capacity, minimum expire interval, vacuum/evict interval
    /// ordering, and vacuum ratio range.
    pub fn build(self) -> Result<CacheConfig> {
        let f = self.file;

        if f.buckets == 0 || (f.buckets & (f.buckets - 1)) != 0 {
            return Err(CacheError::BadBuckets(f.buckets as u64));
        }

        if f.expire_interval < MIN_EXPIRE_INTERVAL {
            return Err(CacheError::ExpireDurationTooShort(f.expire_interval));
        }

        let evict_interval = f.evict_interval.unwrap_or(f.expire_interval);

        if let Some(vacuum_interval) = f.vacuum_interval {
            if vacuum_interval <= evict_interval {
                return Err(CacheError::VacuumDurationInvalid);
            }
        }

        let vacuum_ratio = if f.vacuum_ratio > 0.0 && f.vacuum_ratio <= 1.0 {
            f.vacuum_ratio
        } else {
            VACUUM_RATIO_MODERATE
        };

        // `Capacity` is the cache-wide bound; each shard's own ceiling is its even share.
        let capacity = match f.capacity {
            Some(total) => {
                let bucket_size = total / f.buckets as u64;
                if bucket_size > MAX_BUCKET_SIZE as u64 {
                    return Err(CacheError::BadConfig(format!(
                        "per-bucket capacity {} exceeds the maximum of {}",
                        bucket_size, MAX_BUCKET_SIZE
                    )));
                }
                bucket_size as u32
            }
            None => 0,
        };
        if capacity != 0 && capacity < f.arena_capacity {
            return Err(CacheError::BadConfig(
                "per-bucket capacity must be at least one arena's capacity".into(),
            ));
        }

        let hasher = self.hasher.ok_or(CacheError::BadHasher)?;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        if !clock.active() {
            clock.start();
        }

        Ok(CacheConfig {
            capacity,
            arena_capacity: f.arena_capacity,
            hasher,
            buckets: f.buckets,
            expire_interval: f.expire_interval,
            evict_interval,
            evict_workers: f.evict_workers.max(1),
            vacuum_interval: f.vacuum_interval,
            vacuum_workers: f.vacuum_workers.max(1),
            vacuum_ratio,
            reset_workers: f.reset_workers.max(1),
            release_workers: f.release_workers.max(1),
            collision_check: f.collision_check,
            clock,
            expire_listener: self.expire_listener.unwrap_or_else(|| Arc::new(NoopListener)),
            dump_writer: self.dump_writer,
            dump_interval: f.dump_interval,
            dump_write_workers: f.dump_write_workers.max(1),
            dump_reader: self.dump_reader,
            dump_read_buffer: f.dump_read_buffer.max(1),
            dump_read_workers: f.dump_read_workers.max(1),
            dump_read_async: f.dump_read_async,
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
        })
    }
}
