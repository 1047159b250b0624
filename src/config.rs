// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the cache.
//!
//! # Example
//!
//! ```
//! use tiered_cache::{CacheConfig, EvictionPolicy};
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.default_ttl_ms, 15 * 60 * 1000);
//! assert_eq!(config.eviction_policy, EvictionPolicy::Hybrid);
//!
//! // Fixed budget, LRU, no dynamic sizing
//! let config = CacheConfig {
//!     max_memory_bytes: Some(64 * 1024 * 1024),
//!     eviction_policy: EvictionPolicy::Lru,
//!     dynamic_sizing: false,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::eviction::EvictionPolicy;

/// Configuration for the cache.
///
/// All fields have sensible defaults. Deserializing a partial document
/// (JSON, TOML, ...) fills the missing fields with the same defaults.
///
/// `max_memory_bytes` and `cleanup_interval_ms` are adjusted at runtime by the
/// capacity controller and the adaptive scheduler respectively; use
/// [`Cache::config`](crate::Cache::config) to read the live values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory budget in bytes. `None` computes it from process telemetry at
    /// construction time.
    #[serde(default)]
    pub max_memory_bytes: Option<usize>,

    /// TTL applied when a write does not carry its own (default: 15 min)
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Background sweep period (default: 30s, adaptive)
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Entries above this size are compressed when the write asks for it
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,

    /// Usage percent of the budget above which the sweep evicts (default: 75)
    #[serde(default = "default_memory_cleanup_threshold_percent")]
    pub memory_cleanup_threshold_percent: u8,

    /// Hot tier capacity in bytes (default: 128 MB)
    #[serde(default = "default_l1_capacity_bytes")]
    pub l1_capacity_bytes: usize,

    /// Victim selection used by the background sweep
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,

    /// Recompute the budget from process memory every `capacity_check_interval_ms`
    #[serde(default = "default_true")]
    pub dynamic_sizing: bool,

    /// Split entries between the L1 and L2 tiers
    #[serde(default = "default_true")]
    pub tiered_caching: bool,

    /// Capacity recalculation period (default: 5 min)
    #[serde(default = "default_capacity_check_interval_ms")]
    pub capacity_check_interval_ms: u64,

    /// Adaptive interval recomputation period (default: 1 min)
    #[serde(default = "default_interval_adjust_ms")]
    pub interval_adjust_ms: u64,

    /// Expired keys deleted per chunk before the sweep yields
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,

    /// Buffered events per subscriber before lagging receivers drop events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_ttl_ms() -> u64 { 15 * 60 * 1000 } // 15 min
fn default_cleanup_interval_ms() -> u64 { 30_000 }
fn default_compression_threshold_bytes() -> usize { 2 * 1024 } // 2 KB
fn default_memory_cleanup_threshold_percent() -> u8 { 75 }
fn default_l1_capacity_bytes() -> usize { 128 * 1024 * 1024 } // 128 MB
fn default_true() -> bool { true }
fn default_capacity_check_interval_ms() -> u64 { 5 * 60 * 1000 }
fn default_interval_adjust_ms() -> u64 { 60_000 }
fn default_sweep_batch_size() -> usize { 100 }
fn default_event_channel_capacity() -> usize { 1024 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: None,
            default_ttl_ms: default_ttl_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
            memory_cleanup_threshold_percent: default_memory_cleanup_threshold_percent(),
            l1_capacity_bytes: default_l1_capacity_bytes(),
            eviction_policy: EvictionPolicy::default(),
            dynamic_sizing: default_true(),
            tiered_caching: default_true(),
            capacity_check_interval_ms: default_capacity_check_interval_ms(),
            interval_adjust_ms: default_interval_adjust_ms(),
            sweep_batch_size: default_sweep_batch_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms).min(crate::entry::MAX_TTL)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Resolved budget. Only `None` before the cache has computed it.
    #[must_use]
    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes.unwrap_or(crate::capacity::MIN_BUDGET_BYTES)
    }

    /// Usage in bytes above which the background sweep starts evicting.
    #[must_use]
    pub fn cleanup_threshold_bytes(&self) -> usize {
        let percent = self.memory_cleanup_threshold_percent.min(100) as f64 / 100.0;
        (self.max_memory() as f64 * percent) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_memory_bytes, None);
        assert_eq!(config.default_ttl(), Duration::from_secs(900));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(30));
        assert_eq!(config.compression_threshold_bytes, 2048);
        assert_eq!(config.memory_cleanup_threshold_percent, 75);
        assert_eq!(config.l1_capacity_bytes, 128 * 1024 * 1024);
        assert_eq!(config.eviction_policy, EvictionPolicy::Hybrid);
        assert!(config.dynamic_sizing);
        assert!(config.tiered_caching);
    }

    #[test]
    fn test_default_ttl_is_capped() {
        let config = CacheConfig { default_ttl_ms: u64::MAX, ..Default::default() };
        assert_eq!(config.default_ttl(), crate::entry::MAX_TTL);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"max_memory_bytes": 5242880, "eviction_policy": "lru", "dynamic_sizing": false}"#,
        )
        .unwrap();

        assert_eq!(config.max_memory_bytes, Some(5 * 1024 * 1024));
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(!config.dynamic_sizing);
        assert!(config.tiered_caching);
        assert_eq!(config.default_ttl_ms, 900_000);
    }

    #[test]
    fn test_cleanup_threshold_bytes() {
        let config = CacheConfig {
            max_memory_bytes: Some(1000),
            memory_cleanup_threshold_percent: 75,
            ..Default::default()
        };
        assert_eq!(config.cleanup_threshold_bytes(), 750);
    }
}
