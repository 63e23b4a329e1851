//! End-to-end scenarios exercising construction, TTL expiry, vacuum, collisions,
//! multi-arena entries, and dump/load round trips.

use std::sync::Arc;
use std::time::Duration;

use cbytecache::{
    Cache, CacheConfigBuilder, CacheConfigFile, CacheError, Hasher, MemorySink, MemorySource,
    TestClock, Xxh3Hasher,
};

fn config(buckets: usize, arena_capacity: u32, expire: Duration) -> CacheConfigFile {
    CacheConfigFile {
        buckets,
        arena_capacity,
        expire_interval: expire,
        capacity: None,
        ..Default::default()
    }
}

#[test]
fn ttl_expiry_single_bucket() {
    let clock = Arc::new(TestClock::new(0));
    let cfg = CacheConfigBuilder::new(config(1, 1024 * 1024, Duration::from_secs(60)))
        .clock(clock.clone())
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();

    cache.set(b"foo", b"bar").unwrap();
    assert_eq!(cache.get(b"foo").unwrap(), b"bar");

    clock.jump(Duration::from_secs(61));
    assert!(matches!(cache.get(b"foo"), Err(CacheError::EntryNotFound)));
}

#[test]
fn bulk_write_then_expire_frees_used_bytes() {
    let clock = Arc::new(TestClock::new(0));
    let cfg = CacheConfigBuilder::new(config(16, 1024 * 1024, Duration::from_secs(60)))
        .clock(clock.clone())
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();

    for i in 0..1000u32 {
        let key = format!("key{}", i);
        let val = format!("body{}", i);
        cache.set(key.as_bytes(), val.as_bytes()).unwrap();
    }
    assert!(cache.size().used > 0);

    clock.jump(Duration::from_secs(61));
    cache.evict().unwrap();
    assert_eq!(cache.size().used, 0);

    for i in 0..1000u32 {
        let key = format!("key{}", i);
        assert!(cache.get(key.as_bytes()).is_err());
    }
}

#[test]
fn vacuum_releases_half_of_post_active_arenas() {
    let clock = Arc::new(TestClock::new(0));
    let cfg = CacheConfigBuilder::new(config(1, 1024, Duration::from_secs(60)))
        .clock(clock.clone())
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();

    let payload = vec![b'x'; 2000];
    cache.set(b"big", &payload).unwrap();
    let total_before = cache.size().total;
    assert!(total_before > 0);

    clock.jump(Duration::from_secs(61));
    cache.vacuum().unwrap();

    let snap = cache.size();
    assert!(snap.used == 0);
}

struct ConstantHasher(u64);
impl Hasher for ConstantHasher {
    fn sum64(&self, _key: &[u8]) -> u64 {
        self.0
    }
}

#[test]
fn collision_check_flags_distinct_keys_sharing_a_hash() {
    let cfg = CacheConfigBuilder::new(config(1, 1024 * 1024, Duration::from_secs(60)))
        .hasher(Arc::new(ConstantHasher(1024)))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();

    cache.set(b"JIP4ndmjvUyTdJ2BbA", b"v1").unwrap();
    let err = cache.set(b"GBmEU5yq7AyEAU3o20bz", b"v2").unwrap_err();
    assert!(matches!(err, CacheError::EntryCollision { hash: 1024 }));
}

#[test]
fn entry_spanning_multiple_arenas_round_trips() {
    let cfg = CacheConfigBuilder::new(config(1, 512, Duration::from_secs(60)))
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();

    let payload = vec![b'z'; 1200];
    cache.set(b"spanning", &payload).unwrap();
    assert_eq!(cache.get(b"spanning").unwrap(), payload);
}

#[test]
fn dump_then_load_preserves_original_expiry() {
    let clock = Arc::new(TestClock::new(1000));

    let sink = Arc::new(MemorySink::new());
    let cfg2 = CacheConfigBuilder::new(config(4, 1024 * 1024, Duration::from_secs(3600)))
        .clock(clock.clone())
        .hasher(Arc::new(Xxh3Hasher))
        .dump_writer(sink.clone())
        .build()
        .unwrap();
    let cache2 = Cache::new(cfg2).unwrap();
    for i in 0..10u32 {
        let key = format!("k{}", i);
        let val = format!("v{}", i);
        cache2.set(key.as_bytes(), val.as_bytes()).unwrap();
    }
    cache2.dump().unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 10);

    let source = Arc::new(MemorySource::new(records));
    let cfg3 = CacheConfigBuilder::new(config(4, 1024 * 1024, Duration::from_secs(3600)))
        .hasher(Arc::new(Xxh3Hasher))
        .dump_reader(source)
        .build()
        .unwrap();
    let loaded = Cache::new(cfg3).unwrap();

    for i in 0..10u32 {
        let key = format!("k{}", i);
        let val = format!("v{}", i);
        assert_eq!(loaded.get(key.as_bytes()).unwrap(), val.as_bytes());
    }
}

#[test]
fn empty_payload_is_rejected() {
    let cfg = CacheConfigBuilder::new(config(1, 1024, Duration::from_secs(60)))
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();
    assert!(matches!(cache.set(b"k", b""), Err(CacheError::EntryEmpty)));
}

#[test]
fn oversized_key_is_rejected() {
    let cfg = CacheConfigBuilder::new(config(1, 1024, Duration::from_secs(60)))
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();
    let key = vec![0u8; 70_000];
    assert!(matches!(
        cache.set(&key, b"v"),
        Err(CacheError::KeyTooBig { .. })
    ));
}

#[test]
fn release_is_permitted_after_close() {
    let cfg = CacheConfigBuilder::new(config(2, 1024, Duration::from_secs(60)))
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();
    cache.set(b"k", b"v").unwrap();
    cache.close().unwrap();
    assert!(cache.release().is_ok());
    assert!(matches!(cache.get(b"k"), Err(CacheError::CacheClosed)));
}

#[test]
fn routing_is_deterministic() {
    let cfg = CacheConfigBuilder::new(config(16, 1024, Duration::from_secs(60)))
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    let cache = Cache::new(cfg).unwrap();
    cache.set(b"stable-key", b"v1").unwrap();
    assert_eq!(cache.get(b"stable-key").unwrap(), b"v1");
    assert_eq!(cache.get(b"stable-key").unwrap(), b"v1");
}

#[test]
fn payload_over_bucket_capacity_is_rejected() {
    let cfg = CacheConfigFile {
        buckets: 1,
        arena_capacity: 1024,
        expire_interval: Duration::from_secs(60),
        capacity: Some(1024),
        ..Default::default()
    };
    let cache = Cache::new(
        CacheConfigBuilder::new(cfg)
            .hasher(Arc::new(Xxh3Hasher))
            .build()
            .unwrap(),
    )
    .unwrap();

    let payload = vec![b'x'; 2048];
    assert!(matches!(
        cache.set(b"k", &payload),
        Err(CacheError::EntryTooBig { .. })
    ));
}

#[test]
fn writes_beyond_bucket_capacity_return_no_space() {
    let cfg = CacheConfigFile {
        buckets: 1,
        arena_capacity: 512,
        expire_interval: Duration::from_secs(3600),
        capacity: Some(1024),
        ..Default::default()
    };
    let cache = Cache::new(
        CacheConfigBuilder::new(cfg)
            .hasher(Arc::new(Xxh3Hasher))
            .build()
            .unwrap(),
    )
    .unwrap();

    for i in 0..20u32 {
        let key = format!("k{}", i);
        let payload = vec![b'x'; 100];
        if cache.set(key.as_bytes(), &payload).is_err() {
            return;
        }
    }
    panic!("expected a NoSpace error before exhausting 20 writes into a 1024-byte bucket");
}

#[test]
fn missing_hasher_is_rejected_at_build_time() {
    let cfg = config(1, 1024, Duration::from_secs(60));
    assert!(matches!(
        CacheConfigBuilder::new(cfg).build().unwrap_err(),
        CacheError::BadHasher
    ));
}

#[test]
fn cache_wide_capacity_is_split_across_buckets() {
    let cfg = CacheConfigFile {
        buckets: 4,
        arena_capacity: 1024,
        expire_interval: Duration::from_secs(60),
        capacity: Some(4096),
        ..Default::default()
    };
    let built = CacheConfigBuilder::new(cfg)
        .hasher(Arc::new(Xxh3Hasher))
        .build()
        .unwrap();
    assert_eq!(built.capacity, 1024);
}
