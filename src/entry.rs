// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache entry data structure.
//!
//! A [`CacheEntry`] owns its value exclusively and carries the bookkeeping the
//! tier manager and the eviction engine score on: timestamps, access count,
//! a saturating frequency counter, the estimated size and the current tier.

use std::collections::HashSet;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::time::Instant;

/// Bound for values stored in the cache.
///
/// Values must be serializable so that size can be estimated and codecs can
/// turn them into bytes.
pub trait CacheValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Longest TTL an entry can carry (100 years). Anything larger, including
/// `Duration::MAX`, is treated as "never expires" and clamped to this.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 86_400);

/// `now + ttl`, clamped so the addition can never overflow.
pub fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

/// Storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Tier {
    /// Hot, size-bounded partition
    L1,
    /// Overflow / cold partition
    L2,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the value is held.
#[derive(Debug, Clone)]
pub enum Payload<V> {
    Plain(V),
    /// Codec output; decoded on every read
    Compressed(Vec<u8>),
}

impl<V> Payload<V> {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed(_))
    }
}

/// One live key.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: Payload<V>,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_accessed: Instant,
    /// Monotonic number of reads
    pub access_count: u64,
    /// Saturating counter scored by LFU and hybrid eviction
    pub frequency: u32,
    pub tags: HashSet<String>,
    pub tier: Tier,
    pub size_bytes: usize,
}

impl<V> CacheEntry<V> {
    /// Create a fresh entry. Frequency starts at 1 (the write itself).
    pub fn new(payload: Payload<V>, ttl: Duration, tags: HashSet<String>, tier: Tier, size_bytes: usize) -> Self {
        let now = Instant::now();
        Self {
            payload,
            created_at: now,
            expires_at: deadline_after(now, ttl),
            last_accessed: now,
            access_count: 0,
            frequency: 1,
            tags,
            tier,
            size_bytes,
        }
    }

    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry (zero once expired).
    pub fn ttl_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    /// Record a read. Returns the previous `last_accessed`.
    pub fn record_access(&mut self, now: Instant) -> Instant {
        let previous = self.last_accessed;
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
        self.frequency = self.frequency.saturating_add(1);
        previous
    }

    pub fn has_any_tag<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        tags.into_iter().any(|t| self.tags.contains(t))
    }
}
