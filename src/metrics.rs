// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the cache.
//!
//! Two surfaces:
//!
//! 1. Backend-agnostic emission through the `metrics` crate. The host
//!    application chooses the exporter; with no recorder installed these
//!    calls are no-ops.
//! 2. A self-contained Prometheus text rendering of the cache's own counters
//!    ([`PrometheusMetric`], [`render_prometheus`]), for hosts without a
//!    metrics pipeline.
//!
//! # Metric Naming Convention
//! - `cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_bytes` suffix for sizes
//! - `_percent` / `_ratio` suffix for derived gauges
//!
//! # Labels
//! - `tier`: L1, L2
//! - `operation`: get, set, delete, query
//! - `status`: hit, miss, success, ignored, error

use std::fmt::Write as _;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use serde::Serialize;

/// Label attached to every line of the text exposition.
pub const SERVICE_LABEL: &str = "cache";

/// Record a cache operation
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "cache_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record loader latency for read-through queries
pub fn record_loader_latency(status: &str, duration: Duration) {
    histogram!(
        "cache_loader_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record eviction event
pub fn record_eviction(reason: &str, count: usize, bytes: usize) {
    counter!("cache_evictions_total", "reason" => reason.to_string()).increment(count as u64);
    counter!("cache_evicted_bytes_total").increment(bytes as u64);
}

/// Record expired entries removed (lazily or by the sweep)
pub fn record_expired(count: usize) {
    counter!("cache_expired_total").increment(count as u64);
}

/// Record an L2 → L1 promotion
pub fn record_promotion() {
    counter!("cache_promotions_total").increment(1);
}

/// Record a completed sweep
pub fn record_sweep(duration: Duration) {
    counter!("cache_cleanup_operations_total").increment(1);
    histogram!("cache_sweep_seconds").record(duration.as_secs_f64());
}

/// Record a sweep tick dropped because another sweep was running
pub fn record_sweep_skipped() {
    counter!("cache_sweeps_skipped_total").increment(1);
}

/// Record the set-path guard running out of victims
pub fn record_memory_pressure_signal() {
    counter!("cache_memory_pressure_signals_total").increment(1);
}

/// Record keys removed by tag invalidation
pub fn record_invalidation(count: usize) {
    counter!("cache_invalidated_total").increment(count as u64);
}

/// Record a codec failure (compress or decompress)
pub fn record_codec_error(direction: &str) {
    counter!(
        "cache_codec_errors_total",
        "direction" => direction.to_string()
    )
    .increment(1);
}

/// Set current tracked memory usage
pub fn set_memory_bytes(bytes: usize) {
    gauge!("cache_memory_bytes").set(bytes as f64);
}

/// Set current budget
pub fn set_max_memory_bytes(bytes: usize) {
    gauge!("cache_max_memory_bytes").set(bytes as f64);
}

/// Set per-tier usage
pub fn set_tier_bytes(tier: &str, bytes: usize) {
    gauge!("cache_tier_bytes", "tier" => tier.to_string()).set(bytes as f64);
}

/// Set live key count
pub fn set_keys(count: usize) {
    gauge!("cache_keys").set(count as f64);
}

/// Set memory pressure (usage / budget)
pub fn set_memory_pressure(pressure: f64) {
    gauge!("cache_memory_pressure").set(pressure);
}

/// Set active cleanup interval
pub fn set_cleanup_interval(interval: Duration) {
    gauge!("cache_cleanup_interval_seconds").set(interval.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// TEXT EXPOSITION - Prometheus format without an exporter
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        }
    }
}

/// One named value of the text exposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrometheusMetric {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub value: f64,
}

impl PrometheusMetric {
    pub fn gauge(name: &'static str, help: &'static str, value: f64) -> Self {
        Self { name, help, kind: MetricKind::Gauge, value }
    }

    pub fn counter(name: &'static str, help: &'static str, value: f64) -> Self {
        Self { name, help, kind: MetricKind::Counter, value }
    }
}

/// Render metrics as Prometheus text: `# HELP`, `# TYPE`, then
/// `name{service="cache"} value` for each.
pub fn render_prometheus(metrics: &[PrometheusMetric]) -> String {
    let mut out = String::with_capacity(metrics.len() * 128);
    for (i, m) in metrics.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // Writing into a String cannot fail
        let _ = writeln!(out, "# HELP {} {}", m.name, m.help);
        let _ = writeln!(out, "# TYPE {} {}", m.name, m.kind.as_str());
        let _ = writeln!(out, "{}{{service=\"{}\"}} {}", m.name, SERVICE_LABEL, format_value(m.value));
    }
    out
}

fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else if value.is_finite() {
        format!("{:.4}", value)
    } else {
        "NaN".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_emission_without_recorder_is_noop() {
        record_operation("L1", "get", "hit");
        record_eviction("threshold", 3, 300);
        record_sweep(Duration::from_millis(2));
        set_memory_bytes(1024);
        set_tier_bytes("L2", 512);
        set_memory_pressure(0.4);
    }

    #[test]
    fn test_counters_reach_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_operation("L1", "get", "hit");
            record_operation("L1", "get", "hit");
            record_eviction("capacity", 2, 20);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let ops: u64 = snapshot
            .iter()
            .filter(|(k, _, _, _)| k.key().name() == "cache_operations_total")
            .map(|(_, _, _, v)| match v {
                DebugValue::Counter(n) => *n,
                _ => 0,
            })
            .sum();
        assert_eq!(ops, 2);

        let evictions = snapshot
            .iter()
            .find(|(k, _, _, _)| k.key().name() == "cache_evictions_total")
            .map(|(_, _, _, v)| v.clone());
        assert_eq!(evictions, Some(&DebugValue::Counter(2)));
    }

    #[test]
    fn test_render_prometheus_format() {
        let text = render_prometheus(&[
            PrometheusMetric::gauge("cache_hit_ratio", "Ratio of hits to lookups", 0.75),
            PrometheusMetric::counter("cache_evictions_total", "Entries evicted", 12.0),
        ]);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# HELP cache_hit_ratio Ratio of hits to lookups");
        assert_eq!(lines[1], "# TYPE cache_hit_ratio gauge");
        assert_eq!(lines[2], "cache_hit_ratio{service=\"cache\"} 0.7500");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "# HELP cache_evictions_total Entries evicted");
        assert_eq!(lines[5], "# TYPE cache_evictions_total counter");
        assert_eq!(lines[6], "cache_evictions_total{service=\"cache\"} 12");
    }

    #[test]
    fn test_format_value_non_finite() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(3.0), "3");
    }
}
