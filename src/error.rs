//! Error taxonomy for the cache.

use thiserror::Error;

/// All distinct, observable failure modes the cache can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("bad config: {0}")]
    BadConfig(String),

    #[error("cache is not initialised")]
    BadCache,

    #[error("cache is closed")]
    CacheClosed,

    #[error("hasher is not configured")]
    BadHasher,

    #[error("bucket count must be a non-zero power of two, got {0}")]
    BadBuckets(u64),

    #[error("key too big: {len} bytes exceeds max of {max}")]
    KeyTooBig { len: usize, max: usize },

    #[error("entry not found")]
    EntryNotFound,

    #[error("entry already exists")]
    EntryExists,

    #[error("entry too big: {len} bytes exceeds shard capacity of {max}")]
    EntryTooBig { len: usize, max: usize },

    #[error("entry payload is empty")]
    EntryEmpty,

    #[error("entry is corrupt")]
    EntryCorrupt,

    #[error("entry collision: key hash {hash} maps to a different key")]
    EntryCollision { hash: u64 },

    #[error("expire interval too short: {0:?} is below the minimum")]
    ExpireDurationTooShort(std::time::Duration),

    #[error("vacuum interval invalid: must be strictly greater than the evict interval")]
    VacuumDurationInvalid,

    #[error("bucket {0} is under service")]
    BucketUnderService(usize),

    #[error("bucket {0} is corrupt")]
    BucketCorrupt(usize),

    #[error("no space left in shard")]
    NoSpace,

    #[error("no enqueuer configured for bulk operation")]
    NoEnqueuer,

    #[error("no unmarshaller configured for dump load")]
    NoUnmarshaller,

    #[error("end of input")]
    EndOfInput,

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
