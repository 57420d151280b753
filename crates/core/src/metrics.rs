//! A small process-wide metrics registry, grounded on the teacher's practice
//! of hand-rolling atomic stat structs (`media-core::types::stats`) rather
//! than depending on the `metrics`/`prometheus` crates in the hot path.
//! `voxgate-server` renders this registry as Prometheus text exposition at
//! `/metrics` (§4.9); that HTTP route itself is the external collaborator
//! named in spec §1.

use dashmap_or_std::CounterMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Internal substitute for a `DashMap<String, AtomicU64>` using only the
/// standard library plus a mutex, so `voxgate-core` doesn't need to pull in
/// `dashmap` just for this; crates that already depend on `dashmap` for
/// session maps keep using it directly.
mod dashmap_or_std {
    use super::{AtomicI64, AtomicU64};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct CounterMap {
        counters: Mutex<HashMap<String, AtomicU64>>,
        gauges: Mutex<HashMap<String, AtomicI64>>,
    }

    impl CounterMap {
        pub fn incr(&self, key: &str, by: u64) {
            let counters = self.counters.lock().unwrap();
            if let Some(c) = counters.get(key) {
                c.fetch_add(by, std::sync::atomic::Ordering::Relaxed);
                return;
            }
            drop(counters);
            let mut counters = self.counters.lock().unwrap();
            counters
                .entry(key.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(by, std::sync::atomic::Ordering::Relaxed);
        }

        pub fn set_gauge(&self, key: &str, value: i64) {
            let gauges = self.gauges.lock().unwrap();
            if let Some(g) = gauges.get(key) {
                g.store(value, std::sync::atomic::Ordering::Relaxed);
                return;
            }
            drop(gauges);
            let mut gauges = self.gauges.lock().unwrap();
            gauges
                .entry(key.to_string())
                .or_insert_with(|| AtomicI64::new(0))
                .store(value, std::sync::atomic::Ordering::Relaxed);
        }

        pub fn snapshot_counters(&self) -> Vec<(String, u64)> {
            let counters = self.counters.lock().unwrap();
            let mut out: Vec<_> = counters
                .iter()
                .map(|(k, v)| (k.clone(), v.load(std::sync::atomic::Ordering::Relaxed)))
                .collect();
            out.sort();
            out
        }

        pub fn snapshot_gauges(&self) -> Vec<(String, i64)> {
            let gauges = self.gauges.lock().unwrap();
            let mut out: Vec<_> = gauges
                .iter()
                .map(|(k, v)| (k.clone(), v.load(std::sync::atomic::Ordering::Relaxed)))
                .collect();
            out.sort();
            out
        }
    }
}

/// Process-wide counter/gauge registry, shared by `Arc`.
#[derive(Default, Clone)]
pub struct MetricsRegistry {
    inner: Arc<CounterMap>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a named, labeled counter, e.g.
    /// `incr("ingest_frames_dropped_total", &[("reason", "dup_or_reorder")], 1)`.
    pub fn incr(&self, name: &str, labels: &[(&str, &str)], by: u64) {
        self.inner.incr(&metric_key(name, labels), by);
    }

    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: i64) {
        self.inner.set_gauge(&metric_key(name, labels), value);
    }

    /// Render the whole registry as Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.inner.snapshot_counters() {
            let _ = writeln!(out, "{key} {value}");
        }
        for (key, value) in self.inner.snapshot_gauges() {
            let _ = writeln!(out, "{key} {value}");
        }
        out
    }
}

fn metric_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let mut label_str = String::new();
    for (i, (k, v)) in labels.iter().enumerate() {
        if i > 0 {
            label_str.push(',');
        }
        let _ = write!(label_str, "{k}=\"{v}\"");
    }
    format!("{name}{{{label_str}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_label_set() {
        let registry = MetricsRegistry::new();
        registry.incr("ingest_frames_dropped_total", &[("reason", "dup_or_reorder")], 1);
        registry.incr("ingest_frames_dropped_total", &[("reason", "dup_or_reorder")], 2);
        registry.incr("ingest_frames_dropped_total", &[("reason", "wrong_stream")], 5);

        let rendered = registry.render_prometheus();
        assert!(rendered.contains("ingest_frames_dropped_total{reason=\"dup_or_reorder\"} 3"));
        assert!(rendered.contains("ingest_frames_dropped_total{reason=\"wrong_stream\"} 5"));
    }

    #[test]
    fn gauges_overwrite_rather_than_accumulate() {
        let registry = MetricsRegistry::new();
        registry.set_gauge("capacity_global_active", &[], 3);
        registry.set_gauge("capacity_global_active", &[], 7);
        assert!(registry
            .render_prometheus()
            .contains("capacity_global_active 7"));
    }
}
