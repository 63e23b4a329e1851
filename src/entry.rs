//! Entry record and the time-monotone entry vector.

/// Fixed-size metadata for one stored record.
///
/// `length > 0` means live; `hash == 0 && length == 0 && expire == 0` marks an invalidated
/// slot skipped by later passes, mirroring the original's hash-zeroing invalidation move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    pub hash: u64,
    pub arena_id: u32,
    pub offset: u32,
    pub length: u32,
    pub expire: u32,
}

impl Entry {
    pub fn is_live(&self) -> bool {
        self.length > 0
    }

    pub fn invalidate(&mut self) {
        self.hash = 0;
        self.length = 0;
        self.expire = 0;
    }
}

/// Append-only, strictly non-decreasing by `expire`. TTL is a per-cache constant and set
/// time is monotone under the configured clock, so new entries always sort last; this is
/// what makes eviction a single binary search rather than a scan.
#[derive(Debug, Default)]
pub struct EntryVec {
    entries: Vec<Entry>,
}

impl EntryVec {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, e: Entry) -> usize {
        debug_assert!(
            self.entries.last().map(|l| l.expire <= e.expire).unwrap_or(true),
            "entry vector must stay non-decreasing in expire"
        );
        self.entries.push(e);
        self.entries.len() - 1
    }

    pub fn get(&self, pos: usize) -> &Entry {
        &self.entries[pos]
    }

    pub fn get_mut(&mut self, pos: usize) -> &mut Entry {
        &mut self.entries[pos]
    }

    /// First index `i` with `entries[i].expire >= now`. Returns `len()` if all expired.
    pub fn lower_bound(&self, now: u32) -> usize {
        self.entries.partition_point(|e| e.expire < now)
    }

    /// Drops `entries[..z]` and re-numbers nothing here — the caller (shard) owns the
    /// index and must re-number it after this call using the returned surviving slice.
    pub fn compact_from(&mut self, z: usize) {
        if z == 0 {
            return;
        }
        self.entries.drain(0..z);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Entry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(expire: u32) -> Entry {
        Entry {
            hash: expire as u64,
            arena_id: 0,
            offset: 0,
            length: 1,
            expire,
        }
    }

    #[test]
    fn lower_bound_finds_first_non_expired() {
        let mut v = EntryVec::new();
        for exp in [10, 10, 20, 30, 30, 40] {
            v.push(e(exp));
        }
        assert_eq!(v.lower_bound(25), 3);
        assert_eq!(v.lower_bound(0), 0);
        assert_eq!(v.lower_bound(100), 6);
    }

    #[test]
    fn compact_from_drops_prefix() {
        let mut v = EntryVec::new();
        for exp in [10, 20, 30] {
            v.push(e(exp));
        }
        v.compact_from(2);
        assert_eq!(v.len(), 1);
        assert_eq!(v.get(0).expire, 30);
    }
}
