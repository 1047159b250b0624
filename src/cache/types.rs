// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the cache façade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::config::CacheConfig;
use crate::pressure::PressureLevel;

/// Cache lifecycle state.
///
/// ```text
/// Created ──start──► Running ──stop──► Stopped ──start──► Running
///    │                  │                 │
///    └──────────────────┴─────destroy─────┴──► Destroyed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheState {
    /// Constructed; usable, but no background tasks yet
    Created,
    /// Sweep and capacity tasks are scheduled
    Running,
    /// Background tasks stopped; entries retained
    Stopped,
    /// All state dropped; writes ignored, reads miss
    Destroyed,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Running counters. Relaxed ordering: these are statistics, not
/// synchronization.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub sets: AtomicU64,
    pub deletes: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
    pub cleanups: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for c in [
            &self.hits,
            &self.misses,
            &self.sets,
            &self.deletes,
            &self.evictions,
            &self.expirations,
            &self.cleanups,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot returned by [`Cache::get_stats`](crate::Cache::get_stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub cleanup_operations: u64,
    /// Tracked usage, sum of live entry sizes
    pub memory_usage_bytes: usize,
    pub l1_bytes: usize,
    pub l2_bytes: usize,
    pub total_keys: usize,
    pub l1_keys: usize,
    pub l2_keys: usize,
    /// `hits / (hits + misses)`, 0 before the first lookup
    pub hit_rate: f64,
    /// Live config, including runtime-adjusted budget and interval
    pub config: CacheConfig,
}

impl CacheStats {
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    #[must_use]
    pub fn miss_rate(&self) -> f64 {
        if self.lookups() == 0 {
            0.0
        } else {
            self.misses as f64 / self.lookups() as f64
        }
    }

    #[must_use]
    pub fn memory_usage_percent(&self) -> f64 {
        percent(self.memory_usage_bytes, self.config.max_memory())
    }
}

pub(crate) fn percent(used: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        used as f64 / capacity as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Result of [`Cache::health_check`](crate::Cache::health_check), suitable
/// for serializing straight into a `/health` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: HealthDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthDetails {
    pub state: CacheState,
    pub memory_usage_percent: f64,
    /// `None` until the first lookup
    pub hit_rate: Option<f64>,
    pub total_keys: usize,
    pub pressure_level: PressureLevel,
    pub cleanup_interval_ms: u64,
    /// Human-readable reasons for a non-healthy status
    pub issues: Vec<String>,
}

/// What a single sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
    pub duration: Duration,
}

/// Result of [`Cache::sweep`](crate::Cache::sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was in flight; this tick did nothing
    Skipped,
}

impl SweepOutcome {
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    #[must_use]
    pub fn report(&self) -> Option<SweepReport> {
        match self {
            Self::Completed(r) => Some(*r),
            Self::Skipped => None,
        }
    }
}
