// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch, tag, introspection and reporting operations.
//!
//! Batch operations are sequences of independent single-key operations,
//! not atomic batches.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::entry::{CacheValue, Tier};
use crate::events::CacheEvent;
use crate::metrics::{render_prometheus, PrometheusMetric};
use crate::options::SetOptions;

use super::types::{percent, CacheStats, HealthDetails, HealthReport, HealthStatus, StatsCounters};
use super::Cache;

/// Usage percent above which health is critical.
const CRITICAL_USAGE_PERCENT: f64 = 90.0;
/// Usage percent above which health is degraded.
const WARNING_USAGE_PERCENT: f64 = 75.0;
/// Hit rate below which health is degraded.
const WARNING_HIT_RATE: f64 = 0.5;

impl<V: CacheValue> Cache<V> {
    /// Look up several keys. Only hits appear in the result.
    pub fn get_multiple<I, K>(&self, keys: I) -> HashMap<String, V>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .filter_map(|k| {
                let key = k.as_ref();
                self.get(key).map(|v| (key.to_string(), v))
            })
            .collect()
    }

    /// Store several entries, each with its own options.
    pub fn set_multiple<I, K>(&self, items: I)
    where
        I: IntoIterator<Item = (K, V, SetOptions)>,
        K: AsRef<str>,
    {
        for (key, value, options) in items {
            self.set(key.as_ref(), value, options);
        }
    }

    /// Remove every entry carrying at least one of `tags`. Returns how many
    /// were removed.
    #[tracing::instrument(skip(self, tags))]
    pub fn invalidate_by_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        let keys = self.tags.keys_for_any(tags.iter().map(String::as_str));

        let mut removed = 0;
        for key in &keys {
            // The key may have been rewritten with different tags since the
            // index was read, so the tag check and the removal share one lock
            match self.store.take_if(key, |e| e.has_any_tag(tags.iter().map(String::as_str))) {
                Some(entry) => {
                    self.release_tags(key, &entry.tags);
                    removed += 1;
                }
                None => self.release_tags(key, &tags),
            }
        }

        if removed > 0 {
            info!(?tags, removed, "Invalidated by tags");
        }
        crate::metrics::record_invalidation(removed);
        self.events.emit(CacheEvent::Invalidated { tags, removed });
        removed
    }

    /// Drop every entry. Returns how many were removed.
    #[tracing::instrument(skip(self))]
    pub fn clear(&self) -> usize {
        let removed = self.drain_entries();
        info!(removed, "Cache cleared");
        self.events.emit(CacheEvent::Cleared { removed });
        removed
    }

    /// `true` if the key holds a live entry. Does not count as an access.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.store.with_entry(key, |e| !e.is_expired_at(now)).unwrap_or(false)
    }

    /// Stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Time until the key expires. `None` if absent or already expired.
    #[must_use]
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.store
            .with_entry(key, |e| (!e.is_expired_at(now)).then(|| e.ttl_remaining(now)))
            .flatten()
    }

    /// Keys whose stored entry carries `tag`.
    #[must_use]
    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        self.tags
            .keys_for(tag)
            .into_iter()
            .filter(|key| self.store.with_entry(key, |e| e.tags.contains(tag)).unwrap_or(false))
            .collect()
    }

    /// Which tier holds the key, if any.
    #[must_use]
    pub fn tier_of(&self, key: &str) -> Option<Tier> {
        self.store.tier_of(key)
    }

    #[must_use]
    pub fn get_stats(&self) -> CacheStats {
        let hits = StatsCounters::read(&self.stats.hits);
        let misses = StatsCounters::read(&self.stats.misses);
        let lookups = hits + misses;

        CacheStats {
            hits,
            misses,
            sets: StatsCounters::read(&self.stats.sets),
            deletes: StatsCounters::read(&self.stats.deletes),
            evictions: StatsCounters::read(&self.stats.evictions),
            expirations: StatsCounters::read(&self.stats.expirations),
            cleanup_operations: StatsCounters::read(&self.stats.cleanups),
            memory_usage_bytes: self.store.memory_bytes(),
            l1_bytes: self.store.l1_bytes(),
            l2_bytes: self.store.l2_bytes(),
            total_keys: self.store.len(),
            l1_keys: self.store.tier_len(Tier::L1),
            l2_keys: self.store.tier_len(Tier::L2),
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
            config: self.config(),
        }
    }

    /// Zero the running counters. Entries and usage are untouched.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Classify health from usage and hit rate.
    ///
    /// - **critical**: usage above 90%
    /// - **warning**: usage above 75%, or hit rate below 0.5 once there
    ///   has been at least one lookup
    /// - **healthy**: otherwise
    #[must_use]
    pub fn health_check(&self) -> HealthReport {
        let stats = self.get_stats();
        let usage = stats.memory_usage_percent();
        let hit_rate = (stats.lookups() > 0).then_some(stats.hit_rate);

        let mut issues = Vec::new();
        let status = if usage > CRITICAL_USAGE_PERCENT {
            issues.push(format!("memory usage {:.1}% above {}%", usage, CRITICAL_USAGE_PERCENT));
            HealthStatus::Critical
        } else {
            if usage > WARNING_USAGE_PERCENT {
                issues.push(format!("memory usage {:.1}% above {}%", usage, WARNING_USAGE_PERCENT));
            }
            if let Some(rate) = hit_rate.filter(|r| *r < WARNING_HIT_RATE) {
                issues.push(format!("hit rate {:.2} below {}", rate, WARNING_HIT_RATE));
            }
            if issues.is_empty() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Warning
            }
        };

        if status != HealthStatus::Healthy {
            debug!(%status, ?issues, "Health degraded");
        }

        HealthReport {
            status,
            details: HealthDetails {
                state: self.state(),
                memory_usage_percent: usage,
                hit_rate,
                total_keys: stats.total_keys,
                pressure_level: self.pressure_level(),
                cleanup_interval_ms: stats.config.cleanup_interval_ms,
                issues,
            },
        }
    }

    /// The fixed set of exported metrics, computed from the cache's own
    /// counters.
    #[must_use]
    pub fn prometheus_metrics(&self) -> Vec<PrometheusMetric> {
        let stats = self.get_stats();
        let max = stats.config.max_memory();
        let l1_capacity = stats.config.l1_capacity_bytes;
        let l2_capacity = match max.saturating_sub(l1_capacity) {
            0 => max,
            rest => rest,
        };
        let operations = stats.hits + stats.misses + stats.sets + stats.deletes;

        vec![
            PrometheusMetric::gauge("cache_hit_ratio", "Ratio of lookups that hit", stats.hit_rate),
            PrometheusMetric::gauge("cache_miss_ratio", "Ratio of lookups that missed", stats.miss_rate()),
            PrometheusMetric::counter("cache_evictions_total", "Entries evicted to free memory", stats.evictions as f64),
            PrometheusMetric::gauge(
                "cache_memory_usage_percent",
                "Tracked usage as a percentage of the memory budget",
                stats.memory_usage_percent(),
            ),
            PrometheusMetric::gauge("cache_size_bytes", "Tracked usage in bytes", stats.memory_usage_bytes as f64),
            PrometheusMetric::counter("cache_operations_total", "Gets, sets and deletes served", operations as f64),
            PrometheusMetric::counter(
                "cache_cleanup_operations_total",
                "Background sweeps completed",
                stats.cleanup_operations as f64,
            ),
            PrometheusMetric::gauge(
                "cache_l1_usage_percent",
                "L1 usage as a percentage of L1 capacity",
                percent(stats.l1_bytes, l1_capacity),
            ),
            PrometheusMetric::gauge(
                "cache_l2_usage_percent",
                "L2 usage as a percentage of the budget left after L1",
                percent(stats.l2_bytes, l2_capacity),
            ),
        ]
    }

    /// Prometheus text exposition of [`prometheus_metrics`](Self::prometheus_metrics).
    #[must_use]
    pub fn export_prometheus_text(&self) -> String {
        render_prometheus(&self.prometheus_metrics())
    }

    /// Push current gauges to the installed `metrics` recorder.
    pub fn update_gauge_metrics(&self) {
        crate::metrics::set_memory_bytes(self.store.memory_bytes());
        crate::metrics::set_tier_bytes(Tier::L1.as_str(), self.store.l1_bytes());
        crate::metrics::set_tier_bytes(Tier::L2.as_str(), self.store.l2_bytes());
        crate::metrics::set_keys(self.store.len());
        crate::metrics::set_memory_pressure(self.memory_pressure());
        let config = self.config.read();
        crate::metrics::set_max_memory_bytes(config.max_memory());
        crate::metrics::set_cleanup_interval(config.cleanup_interval());
    }
}
