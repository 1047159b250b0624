// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! L1/L2 placement and promotion.
//!
//! ```text
//!   set ──► determine_tier ──┬─ priority High ─────────────► L1
//!                            ├─ size > 2 × compression thr ─► L2
//!                            ├─ L1 bytes + size ≤ L1 cap ──► L1
//!                            └─ otherwise ─────────────────► L2
//!
//!   get (L2 hit) ──► should_promote? ──► promote (only if it fits in L1)
//! ```
//!
//! Promotion is advisory: an eligible entry that does not fit stays in L2.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::entry::{CacheEntry, Tier};
use crate::options::Priority;
use crate::store::EntryStore;

/// Reads needed before an L2 entry is considered hot.
pub const PROMOTION_MIN_FREQUENCY: u32 = 3;

/// The previous read must be at most this old.
pub const PROMOTION_RECENCY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct TierManager {
    pub enabled: bool,
    pub l1_capacity_bytes: usize,
    pub compression_threshold_bytes: usize,
}

impl TierManager {
    pub fn new(enabled: bool, l1_capacity_bytes: usize, compression_threshold_bytes: usize) -> Self {
        Self {
            enabled,
            l1_capacity_bytes,
            compression_threshold_bytes,
        }
    }

    /// Pick the tier for a new write given the current L1 footprint.
    ///
    /// With tiering disabled everything lands in L1 and the L1 capacity is
    /// not enforced.
    pub fn determine_tier(&self, priority: Priority, size_bytes: usize, l1_bytes: usize) -> Tier {
        if !self.enabled || priority == Priority::High {
            return Tier::L1;
        }
        if size_bytes > self.compression_threshold_bytes.saturating_mul(2) {
            return Tier::L2;
        }
        if l1_bytes.saturating_add(size_bytes) <= self.l1_capacity_bytes {
            Tier::L1
        } else {
            Tier::L2
        }
    }

    /// `frequency > 3` and the previous read happened less than 60s ago.
    pub fn should_promote<V>(&self, entry: &CacheEntry<V>, previous_access: Instant, now: Instant) -> bool {
        self.enabled
            && entry.tier == Tier::L2
            && entry.frequency > PROMOTION_MIN_FREQUENCY
            && now.saturating_duration_since(previous_access) < PROMOTION_RECENCY
    }

    /// Move `key` from L2 to L1 if it fits. Returns whether it moved.
    pub fn promote<V: Clone>(&self, store: &EntryStore<V>, key: &str, size_bytes: usize) -> bool {
        if store.l1_bytes().saturating_add(size_bytes) > self.l1_capacity_bytes {
            debug!(key = %key, size_bytes, l1_bytes = store.l1_bytes(), "Promotion skipped, L1 full");
            return false;
        }
        store.retier(key, Tier::L1)
    }
}
