// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lifecycle management: start, stop, destroy, and the background ticks.
//!
//! Two tasks run while the cache is `Running`:
//!
//! ```text
//! maintenance task                       capacity task (dynamic_sizing only)
//! ├─ every cleanup_interval → sweep()    └─ every 5 min → recalculate_capacity()
//! ├─ every minute → adjust_cleanup_interval()
//! └─ interval changed → re-arm sweep timer
//! ```
//!
//! Both hold a `Weak` reference, so dropping the last `Arc<Cache>` ends them.
//! Every tick is also a public method, which is how tests drive them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capacity::{optimal_budget, should_resize, Resize};
use crate::entry::{deadline_after, CacheValue, MAX_TTL};
use crate::error::CacheError;
use crate::events::{CacheEvent, EvictionReason};
use crate::eviction::{candidates, round_size, select_victims};
use crate::pressure::should_reschedule;

use super::types::{CacheState, StatsCounters, SweepOutcome, SweepReport};
use super::Cache;

/// Holds the single-sweep flag and releases it on drop.
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic timer whose first tick is one period from now.
fn timer(period: Duration) -> Interval {
    let period = period.clamp(Duration::from_millis(1), MAX_TTL);
    let mut interval = tokio::time::interval_at(deadline_after(Instant::now(), period), period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl<V: CacheValue> Cache<V> {
    #[must_use]
    pub fn state(&self) -> CacheState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<CacheState> {
        self.state_rx.clone()
    }

    /// Subscribe to cache events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Spawn the background tasks and move to `Running`.
    ///
    /// Must be called from within a tokio runtime.
    #[tracing::instrument(skip(self))]
    pub fn start(self: &Arc<Self>) -> Result<(), CacheError> {
        match self.state() {
            CacheState::Running => return Err(CacheError::AlreadyRunning),
            CacheState::Destroyed => return Err(CacheError::Destroyed),
            CacheState::Created | CacheState::Stopped => {}
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CacheError::NoRuntime);
        }

        let (adjust_every, capacity_every, dynamic_sizing) = {
            let config = self.config.read();
            (
                Duration::from_millis(config.interval_adjust_ms),
                Duration::from_millis(config.capacity_check_interval_ms),
                config.dynamic_sizing,
            )
        };

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(maintenance_loop(
            Arc::downgrade(self),
            self.interval_tx.subscribe(),
            adjust_every,
        )));
        if dynamic_sizing {
            tasks.push(tokio::spawn(capacity_loop(Arc::downgrade(self), capacity_every)));
        }
        drop(tasks);

        let _ = self.state.send(CacheState::Running);
        info!(dynamic_sizing, "Cache background tasks started");
        Ok(())
    }

    /// Abort the background tasks. Entries are kept; `start()` may be called
    /// again.
    #[tracing::instrument(skip(self))]
    pub fn stop(&self) {
        let aborted = self.abort_tasks();
        if self.state() == CacheState::Running {
            let _ = self.state.send(CacheState::Stopped);
        }
        debug!(aborted, "Cache background tasks stopped");
    }

    /// Stop the background tasks and drop all state. Terminal: afterwards
    /// writes are ignored and reads miss.
    #[tracing::instrument(skip(self))]
    pub fn destroy(&self) {
        self.abort_tasks();
        let _ = self.state.send(CacheState::Destroyed);
        let removed = self.drain_entries();
        self.refreshing.clear();
        self.stats.reset();
        info!(removed, "Cache destroyed");
    }

    fn abort_tasks(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let count = tasks.len();
        for handle in tasks.drain(..) {
            handle.abort();
        }
        count
    }

    /// One background sweep.
    ///
    /// 1. Remove expired entries, in batches of `sweep_batch_size`, yielding
    ///    between batches.
    /// 2. While usage is above the cleanup threshold, evict in rounds of 20%
    ///    of live entries under the configured policy, stopping as soon as
    ///    usage is back under the threshold.
    ///
    /// Returns [`SweepOutcome::Skipped`] if another sweep is running.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> SweepOutcome {
        let Some(_guard) = SweepGuard::acquire(&self.sweeping) else {
            debug!("Sweep already running, tick skipped");
            crate::metrics::record_sweep_skipped();
            return SweepOutcome::Skipped;
        };

        let started = Instant::now();
        let batch_size = self.config.read().sweep_batch_size.max(1);

        let now = Instant::now();
        let expired_keys = self.store.keys_where(|e| e.is_expired_at(now));
        let mut expired = 0;
        for chunk in expired_keys.chunks(batch_size) {
            expired += chunk.iter().filter(|key| self.remove_if_expired(key, now)).count();
            tokio::task::yield_now().await;
        }

        let evicted = self.evict_to_threshold(batch_size).await;

        let duration = started.elapsed();
        StatsCounters::bump(&self.stats.cleanups, 1);
        crate::metrics::record_sweep(duration);
        self.update_gauge_metrics();
        self.events.emit(CacheEvent::SweepCompleted { expired, evicted });

        if expired > 0 || evicted > 0 {
            info!(expired, evicted, usage_bytes = self.store.memory_bytes(), "Sweep completed");
        } else {
            debug!("Sweep completed, nothing to do");
        }

        SweepOutcome::Completed(SweepReport { expired, evicted, duration })
    }

    async fn evict_to_threshold(&self, batch_size: usize) -> usize {
        let (threshold, policy) = {
            let config = self.config.read();
            (config.cleanup_threshold_bytes(), config.eviction_policy)
        };

        let mut evicted = 0;
        'rounds: while self.store.memory_bytes() > threshold {
            let before = self.store.memory_bytes();
            let victims = select_victims(
                policy,
                candidates(&self.store),
                round_size(self.store.len()),
                Instant::now(),
            );
            if victims.is_empty() {
                warn!(usage_bytes = before, threshold, "Over threshold with nothing to evict");
                break;
            }

            for chunk in victims.chunks(batch_size) {
                for key in chunk {
                    if self.store.memory_bytes() <= threshold {
                        break 'rounds;
                    }
                    if self.evict(key, EvictionReason::Threshold).is_some() {
                        evicted += 1;
                    }
                }
                tokio::task::yield_now().await;
            }

            if self.store.memory_bytes() >= before {
                break;
            }
        }

        if evicted > 0 {
            debug!(evicted, %policy, usage_bytes = self.store.memory_bytes(), threshold, "Evicted to threshold");
        }
        evicted
    }

    /// Synchronously remove every expired entry. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.store
            .keys_where(|e| e.is_expired_at(now))
            .iter()
            .filter(|key| self.remove_if_expired(key, now))
            .count()
    }

    /// Recompute the sweep interval from current pressure. Applies it, and
    /// re-arms the sweep timer, only if it moved by more than 25%.
    ///
    /// Returns the new interval when it changed.
    #[tracing::instrument(skip(self))]
    pub fn adjust_cleanup_interval(&self) -> Option<Duration> {
        let level = self.pressure_level();
        let proposed = level.cleanup_interval();

        let current = {
            let mut config = self.config.write();
            let current = config.cleanup_interval();
            if !should_reschedule(current, proposed) {
                return None;
            }
            config.cleanup_interval_ms = proposed.as_millis() as u64;
            current
        };

        self.interval_tx.send_replace(proposed);
        crate::metrics::set_cleanup_interval(proposed);
        info!(
            from_ms = current.as_millis() as u64,
            to_ms = proposed.as_millis() as u64,
            %level,
            "Cleanup interval changed"
        );
        self.events.emit(CacheEvent::CleanupIntervalChanged {
            from_ms: current.as_millis() as u64,
            to_ms: proposed.as_millis() as u64,
            level,
        });
        Some(proposed)
    }

    /// Recompute the memory budget from process telemetry. Applies it only
    /// if it moved by more than 20%.
    ///
    /// Returns `None` when dynamic sizing is off, telemetry is unavailable,
    /// or the change is within tolerance.
    #[tracing::instrument(skip(self))]
    pub fn recalculate_capacity(&self) -> Option<Resize> {
        if !self.config.read().dynamic_sizing {
            return None;
        }
        let Some(heap) = self.probe.heap_total_bytes() else {
            debug!("Process memory unavailable, budget unchanged");
            return None;
        };
        let optimal = optimal_budget(heap);

        let current = {
            let mut config = self.config.write();
            let current = config.max_memory();
            if !should_resize(current, optimal) {
                return None;
            }
            config.max_memory_bytes = Some(optimal);
            current
        };

        let resize = Resize {
            from_bytes: current,
            to_bytes: optimal,
        };
        crate::metrics::set_max_memory_bytes(optimal);
        info!(from_bytes = current, to_bytes = optimal, heap_bytes = heap, "Memory budget resized");
        self.events.emit(CacheEvent::Resized {
            from_bytes: current,
            to_bytes: optimal,
        });
        Some(resize)
    }
}

async fn maintenance_loop<V: CacheValue>(
    cache: Weak<Cache<V>>,
    mut interval_rx: watch::Receiver<Duration>,
    adjust_every: Duration,
) {
    let mut sweep_timer = timer(*interval_rx.borrow_and_update());
    let mut adjust_timer = timer(adjust_every);

    loop {
        tokio::select! {
            _ = sweep_timer.tick() => {
                let Some(cache) = cache.upgrade() else { break };
                cache.sweep().await;
            }

            _ = adjust_timer.tick() => {
                let Some(cache) = cache.upgrade() else { break };
                cache.adjust_cleanup_interval();
            }

            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *interval_rx.borrow_and_update();
                debug!(period_ms = period.as_millis() as u64, "Sweep timer re-armed");
                sweep_timer = timer(period);
            }
        }
    }
    debug!("Maintenance task exiting");
}

async fn capacity_loop<V: CacheValue>(cache: Weak<Cache<V>>, every: Duration) {
    let mut capacity_timer = timer(every);
    loop {
        capacity_timer.tick().await;
        let Some(cache) = cache.upgrade() else { break };
        cache.recalculate_capacity();
    }
    debug!("Capacity task exiting");
}
