//! In-process, sharded, TTL-bounded byte cache with off-heap arena slabs.

pub mod arena;
pub mod arena_queue;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod dump;
pub mod entry;
pub mod error;
pub mod framing;
pub mod hash;
pub mod listener;
pub mod metrics;
pub mod shard;
pub mod size;

pub use cache::{Cache, CacheStatus};
pub use clock::{Clock, SystemClock, TestClock};
pub use config::{CacheConfig, CacheConfigBuilder, CacheConfigFile};
pub use dump::{DumpRecord, DumpSink, DumpSource, FileSink, FileSource, MemorySink, MemorySource};
pub use error::{CacheError, Result};
pub use hash::{Hasher, Xxh3Hasher};
pub use listener::{ExpireListener, NoopListener};
pub use metrics::{MetricsCrateSink, MetricsSink, NoopMetrics};
pub use size::Snapshot;
