// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Dynamic capacity: derive the memory budget from process telemetry.
//!
//! ```text
//! budget = clamp(0.4 × process memory, 256 MB, 1 GB)
//! ```
//!
//! The new budget is applied only when it differs from the current one by
//! more than 20%, so small fluctuations in process memory do not churn the
//! eviction threshold.

use parking_lot::Mutex;
use sysinfo::{Pid, System};
use tracing::debug;

pub const MB: usize = 1024 * 1024;

/// Lower clamp for the computed budget.
pub const MIN_BUDGET_BYTES: usize = 256 * MB;

/// Upper clamp for the computed budget.
pub const MAX_BUDGET_BYTES: usize = 1024 * MB;

/// Share of process memory given to the cache.
pub const HEAP_SHARE: f64 = 0.4;

/// Relative change needed before a resize is applied.
pub const RESIZE_TOLERANCE: f64 = 0.2;

/// Source of process memory readings.
pub trait MemoryProbe: Send + Sync {
    /// Total memory held by the host process, in bytes. `None` if unknown.
    fn heap_total_bytes(&self) -> Option<u64>;
}

/// Resident memory of the current process, read through `sysinfo`.
pub struct ProcessMemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(error = %e, "Current pid unavailable, process memory probe disabled");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn heap_total_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|p| p.memory())
    }
}

/// Fixed reading, for tests and hosts that know their own limits.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(pub Option<u64>);

impl MemoryProbe for FixedMemoryProbe {
    fn heap_total_bytes(&self) -> Option<u64> {
        self.0
    }
}

/// `clamp(0.4 × heap_total, 256 MB, 1 GB)`
#[must_use]
pub fn optimal_budget(heap_total_bytes: u64) -> usize {
    let share = (heap_total_bytes as f64 * HEAP_SHARE) as usize;
    share.clamp(MIN_BUDGET_BYTES, MAX_BUDGET_BYTES)
}

/// Budget to start with when none is configured.
pub fn initial_budget(probe: &dyn MemoryProbe) -> usize {
    probe
        .heap_total_bytes()
        .map_or(MIN_BUDGET_BYTES, optimal_budget)
}

/// `true` when `optimal` differs from `current` by more than 20% of `current`.
#[must_use]
pub fn should_resize(current: usize, optimal: usize) -> bool {
    if current == 0 {
        return optimal != 0;
    }
    let delta = (optimal as f64 - current as f64).abs();
    delta / current as f64 > RESIZE_TOLERANCE
}

/// Before/after values of an applied resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Resize {
    pub from_bytes: usize,
    pub to_bytes: usize,
}
