// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache façade.
//!
//! The [`Cache`] ties the components together:
//! - Entry store with per-tier indexes and byte accounting
//! - Tier manager for L1/L2 placement and promotion
//! - Eviction engine (LRU, LFU, hybrid) driven by the background sweep
//! - Adaptive sweep interval and dynamic memory budget
//! - Tag index for group invalidation
//!
//! # Lifecycle
//!
//! ```text
//! Created → Running → (Stopped → Running)* → Destroyed
//! ```
//!
//! A cache is fully usable in `Created`; `start()` only adds the background
//! sweep and capacity tasks. Tests usually skip `start()` and drive
//! [`sweep`](Cache::sweep), [`adjust_cleanup_interval`](Cache::adjust_cleanup_interval)
//! and [`recalculate_capacity`](Cache::recalculate_capacity) directly.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tiered_cache::{Cache, CacheConfig, CacheState, SetOptions};
//!
//! let cache: Cache<String> = Cache::new(CacheConfig {
//!     max_memory_bytes: Some(16 * 1024 * 1024),
//!     ..Default::default()
//! });
//! assert_eq!(cache.state(), CacheState::Created);
//!
//! cache.set("greeting", "hello".to_string(), SetOptions::ttl(Duration::from_secs(60)));
//! assert_eq!(cache.get("greeting").as_deref(), Some("hello"));
//! assert!(cache.delete("greeting"));
//! assert!(cache.get("greeting").is_none());
//! ```

mod api;
mod lifecycle;
mod query;
mod types;

pub use types::{
    CacheState, CacheStats, HealthDetails, HealthReport, HealthStatus, SweepOutcome, SweepReport,
};

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::capacity::{self, MemoryProbe, ProcessMemoryProbe};
use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheValue, Payload, Tier};
use crate::events::{CacheEvent, EventBus, EvictionReason};
use crate::eviction;
use crate::options::SetOptions;
use crate::pressure::PressureLevel;
use crate::size::{estimate_or_fallback, JsonSizeEstimator, SizeEstimator};
use crate::store::EntryStore;
use crate::tags::TagIndex;
use crate::tier::TierManager;

use types::StatsCounters;

/// In-process tiered cache.
///
/// # Thread Safety
///
/// `Cache` is `Send + Sync`. Share it as `Arc<Cache<V>>`; `start()` and
/// `cache_query()` need the `Arc` so background work can hold a `Weak`.
pub struct Cache<V> {
    /// Live config; budget and interval are rewritten at runtime
    pub(super) config: RwLock<CacheConfig>,

    pub(super) store: EntryStore<V>,
    pub(super) tags: TagIndex,
    pub(super) tiers: TierManager,
    pub(super) stats: StatsCounters,

    /// `None` stores every value as-is, even when compression is requested
    pub(super) codec: Option<Arc<dyn Codec<V>>>,
    pub(super) estimator: Arc<dyn SizeEstimator<V>>,
    pub(super) probe: Arc<dyn MemoryProbe>,

    pub(super) events: EventBus,

    pub(super) state: watch::Sender<CacheState>,
    pub(super) state_rx: watch::Receiver<CacheState>,

    /// Current sweep period; the maintenance task re-arms on change
    pub(super) interval_tx: watch::Sender<Duration>,

    /// Set while a sweep runs
    pub(super) sweeping: AtomicBool,

    /// Keys with a background refresh in flight
    pub(super) refreshing: Arc<DashSet<String>>,

    pub(super) tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Builder for a [`Cache`] with non-default seams.
///
/// ```rust
/// use tiered_cache::{Cache, CacheConfig, FixedMemoryProbe, JsonCodec};
///
/// let cache: Cache<Vec<u32>> = Cache::builder(CacheConfig::default())
///     .codec(JsonCodec)
///     .memory_probe(FixedMemoryProbe(Some(1_000_000_000)))
///     .build();
///
/// // 40% of the reported process memory
/// assert_eq!(cache.config().max_memory_bytes, Some(400_000_000));
/// ```
pub struct CacheBuilder<V> {
    config: CacheConfig,
    codec: Option<Arc<dyn Codec<V>>>,
    estimator: Arc<dyn SizeEstimator<V>>,
    probe: Arc<dyn MemoryProbe>,
}

impl<V: CacheValue> CacheBuilder<V> {
    /// Install a codec used for entries written with `compress`.
    #[must_use]
    pub fn codec(mut self, codec: impl Codec<V> + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    #[must_use]
    pub fn size_estimator(mut self, estimator: impl SizeEstimator<V> + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }

    #[must_use]
    pub fn memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn build(self) -> Cache<V> {
        let mut config = self.config;
        if config.max_memory_bytes.is_none() {
            let budget = capacity::initial_budget(self.probe.as_ref());
            debug!(budget_bytes = budget, "Computed initial memory budget");
            config.max_memory_bytes = Some(budget);
        }

        let (state_tx, state_rx) = watch::channel(CacheState::Created);
        let (interval_tx, _) = watch::channel(config.cleanup_interval());
        let tiers = TierManager::new(
            config.tiered_caching,
            config.l1_capacity_bytes,
            config.compression_threshold_bytes,
        );
        let events = EventBus::new(config.event_channel_capacity);

        crate::metrics::set_max_memory_bytes(config.max_memory());
        crate::metrics::set_cleanup_interval(config.cleanup_interval());

        Cache {
            config: RwLock::new(config),
            store: EntryStore::new(),
            tags: TagIndex::new(),
            tiers,
            stats: StatsCounters::default(),
            codec: self.codec,
            estimator: self.estimator,
            probe: self.probe,
            events,
            state: state_tx,
            state_rx,
            interval_tx,
            sweeping: AtomicBool::new(false),
            refreshing: Arc::new(DashSet::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

/// Outcome of touching an entry under its shard lock.
enum Lookup<V> {
    Expired,
    Live {
        payload: Payload<V>,
        tier: Tier,
        size_bytes: usize,
        promote: bool,
    },
}

impl<V: CacheValue> Cache<V> {
    /// Create a cache with the default codec (none), size estimator (JSON)
    /// and memory probe (process RSS).
    pub fn new(config: CacheConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> CacheBuilder<V> {
        CacheBuilder {
            config,
            codec: None,
            estimator: Arc::new(JsonSizeEstimator),
            probe: Arc::new(ProcessMemoryProbe::new()),
        }
    }

    /// Snapshot of the live config.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config.read().clone()
    }

    /// Get current memory pressure (usage / budget, 0.0 - 1.0+).
    #[must_use]
    pub fn memory_pressure(&self) -> f64 {
        let max = self.config.read().max_memory();
        if max == 0 {
            0.0
        } else {
            self.store.memory_bytes() as f64 / max as f64
        }
    }

    #[must_use]
    pub fn pressure_level(&self) -> PressureLevel {
        PressureLevel::from_usage(self.memory_pressure())
    }

    // --- Core Operations ---

    /// Get a live value.
    ///
    /// Updates access metadata and may promote the entry from L2 to L1.
    /// An expired entry found here is removed and reported as a miss.
    #[tracing::instrument(skip(self), fields(tier))]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let tiers = self.tiers;

        let lookup = self.store.with_entry_mut(key, |entry| {
            if entry.is_expired_at(now) {
                return Lookup::Expired;
            }
            let previous = entry.record_access(now);
            Lookup::Live {
                payload: entry.payload.clone(),
                tier: entry.tier,
                size_bytes: entry.size_bytes,
                promote: tiers.should_promote(entry, previous, now),
            }
        });

        let (payload, mut tier, size_bytes, promote) = match lookup {
            None => return self.record_miss(key),
            Some(Lookup::Expired) => {
                self.remove_if_expired(key, now);
                return self.record_miss(key);
            }
            Some(Lookup::Live { payload, tier, size_bytes, promote }) => (payload, tier, size_bytes, promote),
        };

        let Some(value) = self.decode(key, payload) else {
            if self.remove_entry(key).is_some() {
                warn!(key = %key, "Dropped undecodable entry");
            }
            return self.record_miss(key);
        };

        if promote && self.tiers.promote(&self.store, key, size_bytes) {
            debug!(key = %key, "Promoted to L1");
            crate::metrics::record_promotion();
            self.events.emit(CacheEvent::Promoted { key: key.to_string() });
            tier = Tier::L1;
        }

        tracing::Span::current().record("tier", tier.as_str());
        debug!("Cache hit");
        StatsCounters::bump(&self.stats.hits, 1);
        crate::metrics::record_operation(tier.as_str(), "get", "hit");
        self.events.emit(CacheEvent::Hit { key: key.to_string(), tier });
        Some(value)
    }

    /// Insert or replace.
    ///
    /// Never fails: if nothing can be evicted to make room, the write goes
    /// ahead over budget. After [`destroy`](Self::destroy) writes are ignored.
    #[tracing::instrument(skip(self, value, options), fields(tier, size_bytes))]
    pub fn set(&self, key: &str, value: V, options: SetOptions) {
        if self.state() == CacheState::Destroyed {
            debug!("Write ignored, cache destroyed");
            crate::metrics::record_operation("none", "set", "ignored");
            return;
        }

        let (ttl, threshold, max_memory) = {
            let config = self.config.read();
            (
                options.ttl.unwrap_or_else(|| config.default_ttl()),
                config.compression_threshold_bytes,
                config.max_memory(),
            )
        };

        let estimated = estimate_or_fallback(self.estimator.as_ref(), key, &value);
        let (payload, size_bytes) = self.encode(key, value, estimated, options.compress, threshold);

        self.ensure_capacity(key, size_bytes, max_memory);

        let tier = self.tiers.determine_tier(options.priority, size_bytes, self.store.l1_bytes());
        let span = tracing::Span::current();
        span.record("tier", tier.as_str());
        span.record("size_bytes", size_bytes);

        // Entry first, then its tags: a concurrent delete can only leave a
        // stale index key behind, never an entry the index misses
        let tags: HashSet<String> = options.tags.into_iter().collect();
        let entry = CacheEntry::new(payload, ttl, tags.clone(), tier, size_bytes);
        let previous = self.store.put(key.to_string(), entry);
        self.tags.insert(key, &tags);

        if let Some(previous) = previous {
            self.release_tags(key, previous.tags.iter().filter(|t| !tags.contains(*t)));
        }

        StatsCounters::bump(&self.stats.sets, 1);
        crate::metrics::record_operation(tier.as_str(), "set", "success");
        self.events.emit(CacheEvent::Set {
            key: key.to_string(),
            tier,
            size_bytes,
        });
    }

    /// Remove a key. `false` if it was not present.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, key: &str) -> bool {
        match self.remove_entry(key) {
            Some(entry) => {
                StatsCounters::bump(&self.stats.deletes, 1);
                crate::metrics::record_operation(entry.tier.as_str(), "delete", "success");
                self.events.emit(CacheEvent::Deleted { key: key.to_string() });
                true
            }
            None => false,
        }
    }

    // --- Internals shared by the other façade modules ---

    fn record_miss(&self, key: &str) -> Option<V> {
        debug!("Cache miss");
        StatsCounters::bump(&self.stats.misses, 1);
        crate::metrics::record_operation("none", "get", "miss");
        self.events.emit(CacheEvent::Miss { key: key.to_string() });
        None
    }

    /// Remove an entry and its tag references.
    pub(super) fn remove_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.store.take(key)?;
        self.release_tags(key, &entry.tags);
        Some(entry)
    }

    /// Remove every entry present when the call starts, releasing tags per
    /// key. A `set` racing with the drain survives fully indexed.
    pub(super) fn drain_entries(&self) -> usize {
        let drained = self.store.drain();
        for (key, entry) in &drained {
            self.release_tags(key, &entry.tags);
        }
        drained.len()
    }

    /// Drop `key` from `tags` unless the entry now stored under it carries
    /// the tag again.
    pub(super) fn release_tags<'a>(&self, key: &str, tags: impl IntoIterator<Item = &'a String>) {
        self.tags.remove(key, tags, |tag| {
            self.store.with_entry(key, |e| e.tags.contains(tag)).unwrap_or(false)
        });
    }

    /// Remove an entry only if it is still expired at `now`, so a concurrent
    /// overwrite is not lost.
    pub(super) fn remove_if_expired(&self, key: &str, now: Instant) -> bool {
        match self.store.take_if(key, |e| e.is_expired_at(now)) {
            Some(entry) => {
                self.release_tags(key, &entry.tags);
                StatsCounters::bump(&self.stats.expirations, 1);
                crate::metrics::record_expired(1);
                self.events.emit(CacheEvent::Expired { key: key.to_string() });
                true
            }
            None => false,
        }
    }

    /// Forcibly remove a live entry and account for it.
    pub(super) fn evict(&self, key: &str, reason: EvictionReason) -> Option<usize> {
        let entry = self.remove_entry(key)?;
        StatsCounters::bump(&self.stats.evictions, 1);
        crate::metrics::record_eviction(reason.as_str(), 1, entry.size_bytes);
        self.events.emit(CacheEvent::Evicted {
            key: key.to_string(),
            reason,
        });
        Some(entry.size_bytes)
    }

    /// Make room for `incoming` bytes under `key`, evicting LRU victims.
    ///
    /// The bytes already held by `key` count as free since the write will
    /// replace them.
    fn ensure_capacity(&self, key: &str, incoming: usize, max_memory: usize) {
        let replaced = self.store.with_entry(key, |e| e.size_bytes).unwrap_or(0);
        let over_budget = |store: &EntryStore<V>| {
            store.memory_bytes().saturating_sub(replaced).saturating_add(incoming) > max_memory
        };

        while over_budget(&self.store) {
            match eviction::lru_victim(&self.store, key) {
                Some(victim) => {
                    if let Some(freed) = self.evict(&victim, EvictionReason::Capacity) {
                        debug!(victim = %victim, freed_bytes = freed, "Evicted to make room");
                    }
                }
                None => {
                    let usage_bytes = self.store.memory_bytes();
                    warn!(usage_bytes, max_memory, incoming, "Memory pressure, nothing left to evict");
                    crate::metrics::record_memory_pressure_signal();
                    self.events.emit(CacheEvent::MemoryPressure {
                        usage_bytes,
                        max_bytes: max_memory,
                    });
                    self.purge_expired();
                    if over_budget(&self.store) {
                        warn!(usage_bytes = self.store.memory_bytes(), "Proceeding over budget");
                    }
                    return;
                }
            }
        }
    }

    /// Run the value through the codec when asked to and it is big enough.
    /// Returns the payload and the size to charge for it.
    fn encode(
        &self,
        key: &str,
        value: V,
        estimated: usize,
        compress: bool,
        threshold: usize,
    ) -> (Payload<V>, usize) {
        let codec = match (&self.codec, compress && estimated > threshold) {
            (Some(codec), true) => codec,
            _ => return (Payload::Plain(value), estimated),
        };

        match codec.compress(&value) {
            Ok(bytes) => {
                let size = key.len() + bytes.len();
                debug!(codec = codec.name(), before = estimated, after = size, "Compressed entry");
                (Payload::Compressed(bytes), size)
            }
            Err(e) => {
                warn!(key = %key, codec = codec.name(), error = %e, "Compression failed, storing as-is");
                crate::metrics::record_codec_error("compress");
                (Payload::Plain(value), estimated)
            }
        }
    }

    fn decode(&self, key: &str, payload: Payload<V>) -> Option<V> {
        match payload {
            Payload::Plain(value) => Some(value),
            Payload::Compressed(bytes) => {
                let codec = self.codec.as_ref()?;
                match codec.decompress(&bytes) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(key = %key, codec = codec.name(), error = %e, "Decompression failed");
                        crate::metrics::record_codec_error("decompress");
                        None
                    }
                }
            }
        }
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        for handle in self.tasks.get_mut().drain(..) {
            handle.abort();
        }
    }
}
