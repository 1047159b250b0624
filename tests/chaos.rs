//! Chaos Testing for the tiered cache
//!
//! This module tests failure scenarios using:
//! 1. **Failing wrappers** - codec and size-estimator errors at chosen call counts
//! 2. **Panicking loaders** - read-through loaders that die mid-refresh
//! 3. **Concurrent churn** - many writers, deleters and sweepers at once
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tiered_cache::{
    Cache, CacheConfig, Codec, CodecError, EvictionPolicy, JsonCodec, QueryOptions, SetOptions, SizeError,
    SizeEstimator,
};

// =============================================================================
// Failing Wrappers - Precise Error Injection
// =============================================================================

/// Codec that fails `decompress` on chosen call numbers (1-indexed).
struct FailingCodec {
    inner: JsonCodec,
    decode_calls: AtomicU64,
    fail_on_decode: Vec<u64>,
    fail_encode: bool,
}

impl FailingCodec {
    fn failing_decode(calls: Vec<u64>) -> Self {
        Self {
            inner: JsonCodec,
            decode_calls: AtomicU64::new(0),
            fail_on_decode: calls,
            fail_encode: false,
        }
    }

    fn failing_encode() -> Self {
        Self {
            inner: JsonCodec,
            decode_calls: AtomicU64::new(0),
            fail_on_decode: Vec::new(),
            fail_encode: true,
        }
    }
}

impl Codec<String> for FailingCodec {
    fn compress(&self, value: &String) -> Result<Vec<u8>, CodecError> {
        if self.fail_encode {
            return Err(CodecError::CompressFailed("injected".into()));
        }
        self.inner.compress(value)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<String, CodecError> {
        let call = self.decode_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_decode.contains(&call) {
            return Err(CodecError::DecompressFailed(format!("injected on call {}", call)));
        }
        self.inner.decompress(bytes)
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Estimator that errors for keys with the given prefix.
struct PickyEstimator(&'static str);

impl SizeEstimator<String> for PickyEstimator {
    fn estimate(&self, key: &str, value: &String) -> Result<usize, SizeError> {
        if key.starts_with(self.0) {
            return Err(SizeError(format!("refusing {}", key)));
        }
        Ok(key.len() + value.len())
    }
}

fn compressing_cache(codec: FailingCodec) -> Cache<String> {
    Cache::builder(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        compression_threshold_bytes: 16,
        ..Default::default()
    })
    .codec(codec)
    .build()
}

async fn exploding_loader() -> Result<String, String> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    panic!("loader blew up")
}

fn big_value() -> String {
    "payload-".repeat(32)
}

// =============================================================================
// Codec failures
// =============================================================================

#[tokio::test]
async fn chaos_corrupt_entry_reads_as_miss_and_is_dropped() {
    let cache = compressing_cache(FailingCodec::failing_decode(vec![2]));
    cache.set("k", big_value(), SetOptions::default().compressed().with_tags(["t"]));

    // Call 1: fine
    assert_eq!(cache.get("k"), Some(big_value()));
    // Call 2: corrupt, reported as a miss and the entry removed
    assert_eq!(cache.get("k"), None);
    assert!(!cache.contains("k"));
    assert!(cache.keys_for_tag("t").is_empty());
    assert_eq!(cache.get_stats().memory_usage_bytes, 0);

    let stats = cache.get_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn chaos_compress_failure_stores_plain_value() {
    let cache = compressing_cache(FailingCodec::failing_encode());
    cache.set("k", big_value(), SetOptions::default().compressed());

    // The write still lands, just uncompressed
    assert_eq!(cache.get("k"), Some(big_value()));
}

#[tokio::test]
async fn chaos_decode_failures_do_not_affect_other_keys() {
    let cache = compressing_cache(FailingCodec::failing_decode(vec![1, 3, 5]));
    for i in 0..6 {
        cache.set(&format!("k{}", i), big_value(), SetOptions::default().compressed());
    }

    let survivors = (0..6).filter(|i| cache.get(&format!("k{}", i)).is_some()).count();
    assert_eq!(survivors, 3);
    assert_eq!(cache.len(), 3);
}

// =============================================================================
// Estimator failures
// =============================================================================

#[tokio::test]
async fn chaos_estimator_failure_charges_fallback() {
    let cache: Cache<String> = Cache::builder(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        ..Default::default()
    })
    .size_estimator(PickyEstimator("bad:"))
    .build();

    cache.set("good", "abc".into(), SetOptions::default());
    cache.set("bad:1", "abc".into(), SetOptions::default());

    assert_eq!(cache.get("bad:1").as_deref(), Some("abc"));
    // 4 + 3 for "good", 1KB fallback for "bad:1"
    assert_eq!(cache.get_stats().memory_usage_bytes, 7 + 1024);
}

// =============================================================================
// Loader failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn chaos_panicking_refresh_keeps_value_and_clears_marker() {
    let cache: Arc<Cache<String>> = Arc::new(Cache::new(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        ..Default::default()
    }));
    let options = QueryOptions::ttl(Duration::from_secs(5)).refresh_in_background();

    cache
        .cache_query("q", || async { Ok::<_, String>("v0".into()) }, options.clone())
        .await
        .unwrap();

    let hit = cache.cache_query("q", exploding_loader, options.clone()).await;
    assert_eq!(hit.as_deref(), Ok("v0"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!cache.is_refreshing("q"));
    assert_eq!(cache.get("q").as_deref(), Some("v0"));

    // A later refresh is allowed again
    cache
        .cache_query("q", || async { Ok::<_, String>("v1".into()) }, options)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cache.get("q").as_deref(), Some("v1"));
}

#[tokio::test(start_paused = true)]
async fn chaos_failed_refresh_keeps_current_value() {
    let cache: Arc<Cache<String>> = Arc::new(Cache::new(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        ..Default::default()
    }));
    let options = QueryOptions::ttl(Duration::from_secs(5)).refresh_in_background();

    cache
        .cache_query("q", || async { Ok::<_, String>("v0".into()) }, options.clone())
        .await
        .unwrap();
    cache
        .cache_query("q", || async { Err::<String, _>("backend timeout".to_string()) }, options)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cache.get("q").as_deref(), Some("v0"));
    assert!(!cache.is_refreshing("q"));
}

// =============================================================================
// Concurrent churn
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chaos_concurrent_writers_keep_accounting_exact() {
    struct Hundred;
    impl SizeEstimator<String> for Hundred {
        fn estimate(&self, _key: &str, _value: &String) -> Result<usize, SizeError> {
            Ok(100)
        }
    }

    let cache: Arc<Cache<String>> = Arc::new(
        Cache::builder(CacheConfig {
            max_memory_bytes: Some(5_000),
            eviction_policy: EvictionPolicy::Lru,
            ..Default::default()
        })
        .size_estimator(Hundred)
        .build(),
    );

    let mut handles = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..500 {
                let key = format!("k{}", (worker * 31 + i) % 120);
                match i % 4 {
                    0 | 1 => cache.set(&key, format!("w{}-{}", worker, i), SetOptions::default().with_tags(["all"])),
                    2 => {
                        cache.get(&key);
                    }
                    _ => {
                        cache.delete(&key);
                    }
                }
                if i % 100 == 0 {
                    cache.sweep().await;
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.get_stats();
    assert_eq!(stats.memory_usage_bytes, stats.total_keys * 100);
    assert_eq!(stats.l1_bytes + stats.l2_bytes, stats.memory_usage_bytes);

    // Every surviving key is still reachable through its tag
    let tagged: HashSet<String> = cache.keys_for_tag("all").into_iter().collect();
    assert_eq!(tagged.len(), stats.total_keys);

    assert_eq!(cache.invalidate_by_tags(["all"]), stats.total_keys);
    assert_eq!(cache.get_stats().memory_usage_bytes, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chaos_invalidate_during_writes() {
    let cache: Arc<Cache<String>> = Arc::new(Cache::new(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        ..Default::default()
    }));

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..2_000 {
                let tag = if i % 2 == 0 { "even" } else { "odd" };
                cache.set(&format!("k{}", i), i.to_string(), SetOptions::default().with_tags([tag]));
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    let invalidator = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                cache.invalidate_by_tags(["even"]);
                tokio::task::yield_now().await;
            }
        })
    };
    writer.await.unwrap();
    invalidator.await.unwrap();
    cache.invalidate_by_tags(["even"]);

    // Nothing tagged "even" survives; every odd key does
    assert!(cache.keys_for_tag("even").is_empty());
    assert_eq!(cache.len(), 1_000);
    assert!((0..2_000).step_by(2).all(|i| !cache.contains(&format!("k{}", i))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chaos_invalidate_spares_rewritten_untagged_entries() {
    let cache: Arc<Cache<String>> = Arc::new(Cache::new(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        ..Default::default()
    }));
    let stop = Arc::new(AtomicBool::new(false));

    let invalidator = {
        let cache = cache.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            while !stop.load(Ordering::Acquire) {
                cache.invalidate_by_tags(["x"]);
            }
        })
    };

    // Each key flips from tagged to untagged; the untagged write must survive
    let mut lost = 0;
    for round in 0..20_000 {
        let key = format!("k{}", round % 8);
        cache.set(&key, "tagged".into(), SetOptions::default().with_tags(["x"]));
        cache.set(&key, "plain".into(), SetOptions::default());
        if !cache.contains(&key) {
            lost += 1;
        }
    }
    stop.store(true, Ordering::Release);
    invalidator.await.unwrap();

    assert_eq!(lost, 0, "untagged entries removed by invalidate_by_tags([\"x\"])");
    assert_eq!(cache.len(), 8);
    assert!(cache.keys_for_tag("x").is_empty());
    assert_eq!(cache.invalidate_by_tags(["x"]), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chaos_clear_during_writes() {
    let cache: Arc<Cache<String>> = Arc::new(
        Cache::builder(CacheConfig {
            max_memory_bytes: Some(1024 * 1024),
            ..Default::default()
        })
        .size_estimator(PickyEstimator("never:"))
        .build(),
    );

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..5_000 {
                cache.set(&format!("k{}", i), i.to_string(), SetOptions::default().with_tags(["t"]));
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    let clearer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                cache.clear();
                tokio::task::yield_now().await;
            }
        })
    };
    writer.await.unwrap();
    clearer.await.unwrap();

    // Usage matches exactly what survived
    let live = cache.get_multiple((0..5_000).map(|i| format!("k{}", i)));
    let expected: usize = live.iter().map(|(key, value)| key.len() + value.len()).sum();
    assert_eq!(cache.get_stats().memory_usage_bytes, expected);

    // Every survivor is still reachable through its tag
    assert_eq!(cache.keys_for_tag("t").len(), live.len());
    assert_eq!(cache.invalidate_by_tags(["t"]), live.len());
    assert!(cache.is_empty());
    assert_eq!(cache.get_stats().memory_usage_bytes, 0);
}

#[tokio::test]
async fn chaos_destroy_with_refresh_in_flight() {
    let cache: Arc<Cache<String>> = Arc::new(Cache::new(CacheConfig {
        max_memory_bytes: Some(1024 * 1024),
        ..Default::default()
    }));
    let options = QueryOptions::ttl(Duration::from_millis(50)).refresh_in_background();

    cache
        .cache_query("q", || async { Ok::<_, String>("v0".into()) }, options.clone())
        .await
        .unwrap();
    cache
        .cache_query(
            "q",
            || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, String>("late".into())
            },
            options,
        )
        .await
        .unwrap();

    cache.destroy();
    tokio::time::sleep(Duration::from_millis(40)).await;

    // The late refresh must not resurrect data
    assert!(cache.is_empty());
}
