// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Observability events.
//!
//! Every notable state change is published on a `tokio::sync::broadcast`
//! channel obtained through [`Cache::subscribe`](crate::Cache::subscribe).
//! Publishing never blocks and never fails the operation that caused it:
//! with no subscribers the event is dropped, and a slow subscriber sees
//! `RecvError::Lagged` rather than slowing the cache down.
//!
//! # Event Stream
//!
//! ```text
//! set("user:1")          → Set { key, tier, size_bytes }
//! get("user:1")          → Hit { key, tier }   (+ Promoted if it moved to L1)
//! get("gone")            → Miss { key }
//! sweep tick             → Expired ×N, Evicted ×M, SweepCompleted
//! capacity tick          → Resized { from_bytes, to_bytes }
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::entry::Tier;
use crate::pressure::PressureLevel;

/// Why an entry was forcibly removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Synchronous guard inside `set` made room for an incoming write
    Capacity,
    /// Background sweep brought usage back under the cleanup threshold
    Threshold,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Threshold => "threshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    Set {
        key: String,
        tier: Tier,
        size_bytes: usize,
    },
    Hit {
        key: String,
        tier: Tier,
    },
    Miss {
        key: String,
    },
    Deleted {
        key: String,
    },
    Expired {
        key: String,
    },
    Evicted {
        key: String,
        reason: EvictionReason,
    },
    Promoted {
        key: String,
    },
    /// The set-path guard found nothing to evict.
    MemoryPressure {
        usage_bytes: usize,
        max_bytes: usize,
    },
    CleanupIntervalChanged {
        from_ms: u64,
        to_ms: u64,
        level: PressureLevel,
    },
    Resized {
        from_bytes: usize,
        to_bytes: usize,
    },
    SweepCompleted {
        expired: usize,
        evicted: usize,
    },
    Invalidated {
        tags: Vec<String>,
        removed: usize,
    },
    Cleared {
        removed: usize,
    },
}

impl CacheEvent {
    /// Short name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Hit { .. } => "hit",
            Self::Miss { .. } => "miss",
            Self::Deleted { .. } => "deleted",
            Self::Expired { .. } => "expired",
            Self::Evicted { .. } => "evicted",
            Self::Promoted { .. } => "promoted",
            Self::MemoryPressure { .. } => "memory_pressure",
            Self::CleanupIntervalChanged { .. } => "cleanup_interval_changed",
            Self::Resized { .. } => "resized",
            Self::SweepCompleted { .. } => "sweep_completed",
            Self::Invalidated { .. } => "invalidated",
            Self::Cleared { .. } => "cleared",
        }
    }
}

/// Publisher side of the event stream.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }

    /// Publish, ignoring the no-subscriber case.
    pub fn emit(&self, event: CacheEvent) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
