// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Memory pressure banding and the adaptive cleanup interval.
//!
//! The background sweep runs more often the fuller the cache is. Once a
//! minute the scheduler maps current usage to a [`PressureLevel`] and, if the
//! level's interval differs from the running one by more than 25%, re-arms
//! the sweep timer.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tiered_cache::PressureLevel;
//!
//! let level = PressureLevel::from_usage(0.85);
//! assert_eq!(level, PressureLevel::High);
//! assert_eq!(level.cleanup_interval(), Duration::from_secs(15));
//!
//! assert_eq!(PressureLevel::from_usage(0.10).cleanup_interval(), Duration::from_secs(120));
//! ```

use std::time::Duration;

/// Interval changes at or below this fraction are ignored.
pub const RESCHEDULE_TOLERANCE: f64 = 0.25;

/// Pressure level based on usage / budget.
///
/// - **Low** (≤ 50%): sweep every 120s
/// - **Moderate** (50-70%): every 60s
/// - **Elevated** (70-80%): every 30s
/// - **High** (> 80%): every 15s
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum PressureLevel {
    Low = 0,
    Moderate = 1,
    Elevated = 2,
    High = 3,
}

impl PressureLevel {
    /// Calculate level from usage ratio (0.0 → 1.0+)
    #[must_use]
    pub fn from_usage(usage: f64) -> Self {
        match usage {
            u if u > 0.80 => Self::High,
            u if u > 0.70 => Self::Elevated,
            u if u > 0.50 => Self::Moderate,
            _ => Self::Low,
        }
    }

    /// Sweep period for this level
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        match self {
            Self::High => Duration::from_secs(15),
            Self::Elevated => Duration::from_secs(30),
            Self::Moderate => Duration::from_secs(60),
            Self::Low => Duration::from_secs(120),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low - relaxed cleanup",
            Self::Moderate => "Moderate - regular cleanup",
            Self::Elevated => "Elevated - frequent cleanup",
            Self::High => "High - aggressive cleanup",
        }
    }
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// `true` when `proposed` differs from `current` by more than 25% of `current`.
#[must_use]
pub fn should_reschedule(current: Duration, proposed: Duration) -> bool {
    if current.is_zero() {
        return !proposed.is_zero();
    }
    let current_ms = current.as_millis() as f64;
    let delta = (proposed.as_millis() as f64 - current_ms).abs();
    delta / current_ms > RESCHEDULE_TOLERANCE
}
