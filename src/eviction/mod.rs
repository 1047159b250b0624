// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Eviction policies for the entry store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  mod.rs       - EvictionPolicy, candidate snapshotting       │
//! │  scoring.rs   - LRU / LFU / hybrid ordering                  │
//! │  └─ hybrid_score: 0.7 × age + 0.3 × 1/frequency              │
//! │  └─ select_victims: removal-priority order, capped count     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never deletes anything itself. It snapshots candidates, ranks
//! them, and hands back keys; the sweep (or the set-path guard) removes them
//! and does the accounting. An empty store yields no candidates, which the
//! caller must read as "cannot free memory".

pub mod scoring;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::store::EntryStore;

pub use scoring::{hybrid_score, select_victims};

/// Share of live entries proposed per eviction round.
pub const EVICTION_FRACTION: f64 = 0.2;

/// Victim selection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used first
    Lru,
    /// Least frequently used first
    Lfu,
    /// Age-dominant blend of recency and rarity
    #[default]
    Hybrid,
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Lfu => write!(f, "lfu"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Scoring snapshot of one entry.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: String,
    pub last_accessed: Instant,
    pub frequency: u32,
}

/// Snapshot every entry in the store.
pub fn candidates<V: Clone>(store: &EntryStore<V>) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(store.len());
    store.for_each(|key, entry| {
        out.push(Candidate {
            key: key.to_string(),
            last_accessed: entry.last_accessed,
            frequency: entry.frequency,
        });
    });
    out
}

/// Number of victims for one round: 20% of `live`, at least one when the
/// store is not empty.
pub fn round_size(live: usize) -> usize {
    if live == 0 {
        return 0;
    }
    ((live as f64 * EVICTION_FRACTION).ceil() as usize).max(1)
}

/// Least recently used key, skipping `exclude`. Used by the set-path guard.
pub fn lru_victim<V: Clone>(store: &EntryStore<V>, exclude: &str) -> Option<String> {
    let mut oldest: Option<(Instant, String)> = None;
    store.for_each(|key, entry| {
        if key == exclude {
            return;
        }
        let older = oldest.as_ref().map_or(true, |(t, _)| entry.last_accessed < *t);
        if older {
            oldest = Some((entry.last_accessed, key.to_string()));
        }
    });
    oldest.map(|(_, key)| key)
}
