//! # Tiered Cache
//!
//! An in-process, tiered, self-adapting key-value cache for absorbing
//! repeated reads of expensive-to-compute or expensive-to-fetch data.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Cache façade                         │
//! │  • get / set / delete / invalidate_by_tags / cache_query   │
//! │  • Synchronous LRU guard keeps writes inside the budget    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Entry store                          │
//! │  • DashMap key → entry, byte accounting clamped at zero    │
//! │  • L1 (hot, size-bounded) and L2 (cold) key indexes        │
//! │  • Tag index for group invalidation                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                    (background tasks)
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Maintenance                              │
//! │  • Sweep: expiry in batches, then LRU/LFU/hybrid eviction  │
//! │  • Sweep period adapts to memory pressure (15s - 120s)     │
//! │  • Budget follows process memory: clamp(40%, 256MB, 1GB)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiered_cache::{Cache, CacheConfig, Priority, QueryOptions, SetOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache: Arc<Cache<serde_json::Value>> = Arc::new(Cache::new(CacheConfig::default()));
//!
//!     // Background sweep and capacity tasks
//!     cache.start().expect("Failed to start");
//!
//!     cache.set(
//!         "user:42",
//!         serde_json::json!({"name": "Ada"}),
//!         SetOptions::ttl(Duration::from_secs(300))
//!             .with_tags(["users"])
//!             .with_priority(Priority::High),
//!     );
//!
//!     // Read-through with refresh ahead of expiry
//!     let report = cache
//!         .cache_query(
//!             "report:daily",
//!             || async { Ok::<_, std::io::Error>(serde_json::json!({"rows": 10})) },
//!             QueryOptions::ttl(Duration::from_secs(60)).refresh_in_background(),
//!         )
//!         .await
//!         .unwrap();
//!     println!("{report}");
//!
//!     cache.invalidate_by_tags(["users"]);
//!     println!("{}", cache.export_prometheus_text());
//!
//!     cache.destroy();
//! }
//! ```
//!
//! ## Features
//!
//! - **Tiered placement**: high-priority and small entries in L1, large or
//!   overflow entries in L2, promotion on sustained demand
//! - **Eviction policies**: LRU, LFU, and an age-dominant hybrid score
//! - **Adaptive cleanup**: sweep frequency follows memory pressure
//! - **Dynamic sizing**: memory budget follows process memory
//! - **Tag invalidation**: drop every entry sharing a label
//! - **Read-through**: `cache_query` with optional background refresh
//! - **Observability**: `tracing` spans, `metrics` counters, a broadcast
//!   event stream, and a Prometheus text snapshot
//!
//! ## Configuration
//!
//! See [`CacheConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`cache`]: The [`Cache`] façade
//! - [`store`]: Entry table and byte accounting
//! - [`tier`]: L1/L2 placement and promotion
//! - [`eviction`]: LRU, LFU and hybrid victim selection
//! - [`pressure`]: Pressure levels and the adaptive interval
//! - [`capacity`]: Budget from process memory
//! - [`tags`]: Tag → keys index
//! - [`codec`]: Pluggable value compression
//! - [`size`]: Pluggable size estimation
//! - [`events`]: Observability events
//! - [`metrics`]: `metrics` crate emission and Prometheus text

pub mod cache;
pub mod capacity;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod eviction;
pub mod metrics;
pub mod options;
pub mod pressure;
pub mod size;
pub mod store;
pub mod tags;
pub mod tier;

pub use cache::{
    Cache, CacheBuilder, CacheState, CacheStats, HealthDetails, HealthReport, HealthStatus, SweepOutcome,
    SweepReport,
};
pub use capacity::{FixedMemoryProbe, MemoryProbe, ProcessMemoryProbe, Resize};
pub use codec::{Codec, JsonCodec};
#[cfg(feature = "compression")]
pub use codec::ZstdCodec;
pub use config::CacheConfig;
pub use entry::{CacheValue, Tier};
pub use error::{CacheError, CodecError, SizeError};
pub use events::{CacheEvent, EvictionReason};
pub use eviction::EvictionPolicy;
pub use metrics::{MetricKind, PrometheusMetric};
pub use options::{Priority, QueryOptions, SetOptions};
pub use pressure::PressureLevel;
pub use size::{JsonSizeEstimator, SizeEstimator};
