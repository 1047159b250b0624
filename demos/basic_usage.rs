// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Configuring and starting the cache
//! 2. Writing entries with TTLs, tags and priorities
//! 3. Reading them back and watching tier placement
//! 4. Read-through with `cache_query`
//! 5. Tag invalidation and a manual sweep
//! 6. Stats, health and the Prometheus text snapshot
//! 7. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::{json, Value};
use tiered_cache::{Cache, CacheConfig, EvictionPolicy, Priority, QueryOptions, SetOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures everything the cache emits)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║            tiered-cache: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and start
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring cache...");

    let config = CacheConfig {
        // Fixed 16MB budget for the demo (otherwise derived from process memory)
        max_memory_bytes: Some(16 * 1024 * 1024),
        l1_capacity_bytes: 4 * 1024 * 1024,
        default_ttl_ms: 60_000,
        eviction_policy: EvictionPolicy::Hybrid,
        dynamic_sizing: false,
        ..Default::default()
    };
    let cache: Arc<Cache<Value>> = Arc::new(Cache::new(config));
    println!("   State: {}", cache.state());

    cache.start()?;
    println!("   ✅ Cache running! State: {}", cache.state());

    let mut events = cache.subscribe();

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Write entries
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Writing sample entries...");
    let entries = [
        ("user:alice", json!({"name": "Alice", "role": "admin"}), Priority::High, "users"),
        ("user:bob", json!({"name": "Bob", "role": "viewer"}), Priority::Normal, "users"),
        ("report:daily", json!({"rows": vec![0u32; 2_000]}), Priority::Low, "reports"),
        ("config:flags", json!({"dark_mode": true}), Priority::Normal, "config"),
    ];

    for (key, value, priority, tag) in &entries {
        let start = Instant::now();
        cache.set(
            key,
            value.clone(),
            SetOptions::ttl(Duration::from_secs(300))
                .with_tags([*tag])
                .with_priority(*priority),
        );
        println!("   └─ {} → tier {:?} ({:?})", key, cache.tier_of(key), start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read back
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Reading entries back...");
    for (key, _, _, _) in &entries {
        let start = Instant::now();
        match cache.get(key) {
            Some(value) => {
                let preview: String = value.to_string().chars().take(40).collect();
                println!("   └─ {} → {} ({:?})", key, preview, start.elapsed());
            }
            None => println!("   └─ {} → NOT FOUND", key),
        }
    }
    println!("   └─ user:nobody → {:?}", cache.get("user:nobody"));

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Read-through
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔁 Read-through with cache_query...");
    for attempt in 1..=2 {
        let start = Instant::now();
        let value = cache
            .cache_query(
                "query:top-products",
                || async {
                    // Pretend this is a slow database query
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, std::io::Error>(json!(["widget", "gadget", "gizmo"]))
                },
                QueryOptions::ttl(Duration::from_secs(30))
                    .with_tags(["products"])
                    .refresh_in_background(),
            )
            .await?;
        println!("   └─ attempt {}: {} ({:?})", attempt, value, start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Invalidate and sweep
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🏷️  Invalidating tag 'users'...");
    let removed = cache.invalidate_by_tags(["users"]);
    println!("   └─ Removed {} entries", removed);
    println!("   └─ user:alice present: {}", cache.contains("user:alice"));

    println!("\n🧹 Running a sweep...");
    let outcome = cache.sweep().await;
    match outcome.report() {
        Some(report) => println!(
            "   └─ expired {} / evicted {} in {:?}",
            report.expired, report.evicted, report.duration
        ),
        None => println!("   └─ skipped (another sweep was running)"),
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Stats, health, Prometheus
    // ─────────────────────────────────────────────────────────────────────────
    let stats = cache.get_stats();
    println!("\n📊 Cache Stats:");
    println!("   ┌─ Entries: {} (L1 {}, L2 {})", stats.total_keys, stats.l1_keys, stats.l2_keys);
    println!("   ├─ Memory: {} bytes ({:.3}%)", stats.memory_usage_bytes, stats.memory_usage_percent());
    println!("   ├─ Hit rate: {:.1}%", stats.hit_rate * 100.0);
    println!("   └─ Pressure: {}", cache.pressure_level().description());

    let health = cache.health_check();
    println!("\n🩺 Health: {}", health.status);
    for issue in &health.details.issues {
        println!("   └─ ⚠️  {}", issue);
    }

    println!("\n📈 Prometheus snapshot:");
    for line in cache.export_prometheus_text().lines().filter(|l| !l.starts_with('#') && !l.is_empty()) {
        println!("   │  {}", line);
    }

    println!("\n📡 Events seen:");
    let mut seen = std::collections::BTreeMap::new();
    while let Ok(event) = events.try_recv() {
        *seen.entry(event.kind()).or_insert(0usize) += 1;
    }
    for (kind, count) in &seen {
        println!("   └─ {}: {}", kind, count);
    }

    println!("\n📈 Raw Metrics (metrics crate):");
    cache.update_gauge_metrics();
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Destroying cache...");
    cache.destroy();
    println!("   ✅ Done! State: {}, entries: {}", cache.state(), cache.len());

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = Vec::new();
    let mut gauges = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let name = format!("{}{}", key.name(), label_str);

        match value {
            DebugValue::Counter(v) => counters.push((name, v)),
            DebugValue::Gauge(v) => gauges.push((name, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, count, sum));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    println!("   ┌─ Counters (cumulative)");
    for (name, value) in &counters {
        println!("   │  └─ {} = {}", name, value);
    }
    println!("   ├─ Gauges (current value)");
    for (name, value) in &gauges {
        println!("   │  └─ {} = {:.2}", name, value);
    }
    println!("   └─ Histograms");
    for (name, count, sum) in &histograms {
        let avg = if *count > 0 { sum / *count as f64 } else { 0.0 };
        println!("      └─ {} count={} avg={:.6}", name, count, avg);
    }
}
