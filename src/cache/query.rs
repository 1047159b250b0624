// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-through helper.
//!
//! ```text
//! cache_query(key, loader)
//!     │
//!     ├─ hit ──► return value
//!     │           └─ refresh_in_background && ttl left < 10% of default TTL
//!     │                └─► spawn loader, overwrite entry when it resolves
//!     │
//!     └─ miss ─► await loader ─► Ok: store, return / Err: return as-is
//! ```
//!
//! Loader errors are never cached. At most one background refresh per key
//! is in flight.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};

use dashmap::DashSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::entry::CacheValue;
use crate::options::QueryOptions;

use super::Cache;

/// Share of the default TTL below which a hit triggers a refresh.
const REFRESH_WINDOW_FRACTION: u32 = 10;

/// Clears the in-flight marker even if the loader panics.
struct RefreshGuard {
    refreshing: Weak<DashSet<String>>,
    key: String,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if let Some(set) = self.refreshing.upgrade() {
            set.remove(&self.key);
        }
    }
}

impl<V: CacheValue> Cache<V> {
    /// Return the cached value for `key`, or run `loader`, cache its result
    /// and return it.
    ///
    /// The loader's error is returned unchanged and nothing is cached.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use tiered_cache::{Cache, CacheConfig, QueryOptions};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let cache: Arc<Cache<u64>> = Arc::new(Cache::new(CacheConfig {
    ///     max_memory_bytes: Some(1024 * 1024),
    ///     ..Default::default()
    /// }));
    ///
    /// let value = cache
    ///     .cache_query("answer", || async { Ok::<_, String>(42) }, QueryOptions::default())
    ///     .await;
    /// assert_eq!(value, Ok(42));
    ///
    /// // Served from cache; this loader never runs
    /// let value = cache
    ///     .cache_query("answer", || async { Err::<u64, _>("unreachable".to_string()) }, QueryOptions::default())
    ///     .await;
    /// assert_eq!(value, Ok(42));
    /// # }
    /// ```
    #[tracing::instrument(skip(self, loader, options))]
    pub async fn cache_query<F, Fut, E>(self: &Arc<Self>, key: &str, loader: F, options: QueryOptions) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            if options.refresh_in_background && self.needs_refresh(key) {
                self.spawn_refresh(key, loader, options);
            }
            return Ok(value);
        }

        let started = Instant::now();
        match loader().await {
            Ok(value) => {
                crate::metrics::record_loader_latency("success", started.elapsed());
                self.set(key, value.clone(), options.to_set_options());
                Ok(value)
            }
            Err(e) => {
                crate::metrics::record_loader_latency("error", started.elapsed());
                debug!(error = %e, "Loader failed, nothing cached");
                Err(e)
            }
        }
    }

    /// `true` while a background refresh for `key` is running.
    #[must_use]
    pub fn is_refreshing(&self, key: &str) -> bool {
        self.refreshing.contains(key)
    }

    /// Remaining TTL below 10% of the default TTL.
    fn needs_refresh(&self, key: &str) -> bool {
        let window = self.config.read().default_ttl() / REFRESH_WINDOW_FRACTION;
        self.ttl_remaining(key).is_some_and(|left| left < window)
    }

    fn spawn_refresh<F, Fut, E>(self: &Arc<Self>, key: &str, loader: F, options: QueryOptions)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            debug!(key = %key, "No runtime, background refresh skipped");
            return;
        }
        if !self.refreshing.insert(key.to_string()) {
            debug!(key = %key, "Refresh already in flight");
            return;
        }

        let guard = RefreshGuard {
            refreshing: Arc::downgrade(&self.refreshing),
            key: key.to_string(),
        };
        let cache = Arc::downgrade(self);
        debug!(key = %key, "Refreshing in background");

        tokio::spawn(async move {
            let started = Instant::now();
            let result = loader().await;
            let Some(cache) = cache.upgrade() else {
                return;
            };
            match result {
                Ok(value) => {
                    crate::metrics::record_loader_latency("success", started.elapsed());
                    cache.set(&guard.key, value, options.to_set_options());
                }
                Err(e) => {
                    crate::metrics::record_loader_latency("error", started.elapsed());
                    warn!(key = %guard.key, error = %e, "Background refresh failed, keeping current value");
                }
            }
        });
    }
}
