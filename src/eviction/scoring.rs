// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Candidate ordering for each policy.
//!
//! All three return keys highest-removal-priority first.
//!
//! The hybrid score weights staleness far more than rarity: age is measured
//! in seconds while the rarity term is at most 0.3. An entry read 100 times
//! an hour ago therefore ranks ahead of one read once a minute ago.
//! Reproducing exact eviction order means reproducing this formula.

use std::cmp::Ordering;

use tokio::time::Instant;

use super::{Candidate, EvictionPolicy};

const AGE_WEIGHT: f64 = 0.7;
const RARITY_WEIGHT: f64 = 0.3;

/// `0.7 × age_seconds + 0.3 × 1/max(frequency, 1)`. Higher = evict sooner.
pub fn hybrid_score(candidate: &Candidate, now: Instant) -> f64 {
    let age_secs = now.saturating_duration_since(candidate.last_accessed).as_secs_f64();
    let rarity = 1.0 / candidate.frequency.max(1) as f64;
    AGE_WEIGHT * age_secs + RARITY_WEIGHT * rarity
}

/// Rank candidates under `policy` and return at most `count` keys.
pub fn select_victims(
    policy: EvictionPolicy,
    mut candidates: Vec<Candidate>,
    count: usize,
    now: Instant,
) -> Vec<String> {
    match policy {
        EvictionPolicy::Lru => {
            candidates.sort_by(|a, b| a.last_accessed.cmp(&b.last_accessed));
        }
        EvictionPolicy::Lfu => {
            candidates.sort_by(|a, b| {
                a.frequency
                    .cmp(&b.frequency)
                    .then_with(|| a.last_accessed.cmp(&b.last_accessed))
            });
        }
        EvictionPolicy::Hybrid => {
            let mut scored: Vec<_> = candidates
                .into_iter()
                .map(|c| (hybrid_score(&c, now), c))
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
            return scored.into_iter().take(count).map(|(_, c)| c.key).collect();
        }
    }
    candidates.into_iter().take(count).map(|c| c.key).collect()
}
