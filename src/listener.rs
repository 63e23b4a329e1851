//! Expire-listener interface, notified just before an entry is removed by eviction.

/// Called once per expiring entry, with the reassembled key and payload.
///
/// Must not call back into the cache: eviction holds the owning shard's write lock
/// while invoking this, and a re-entrant call would deadlock.
pub trait ExpireListener: Send + Sync {
    fn listen(&self, key: &[u8], payload: &[u8]);
}

/// Default listener that discards notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ExpireListener for NoopListener {
    fn listen(&self, _key: &[u8], _payload: &[u8]) {}
}
