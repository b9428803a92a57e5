//! Metrics for the workflow exporter
//!
//! In-process counters, gauges and histograms, exported as JSON or in the
//! Prometheus text format. Output is sorted by metric name.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Metrics registry shared by the runner and its callers
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
            histograms: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub async fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1).await;
    }

    /// Add to a counter, creating it on first use
    pub async fn add_counter(&self, name: &str, value: u64) {
        {
            let counters = self.counters.read().await;
            if let Some(counter) = counters.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }

        let mut counters = self.counters.write().await;
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub async fn set_gauge(&self, name: &str, value: u64) {
        {
            let gauges = self.gauges.read().await;
            if let Some(gauge) = gauges.get(name) {
                gauge.store(value, Ordering::Relaxed);
                return;
            }
        }

        let mut gauges = self.gauges.write().await;
        gauges
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .store(value, Ordering::Relaxed);
    }

    pub async fn get_counter(&self, name: &str) -> u64 {
        let counters = self.counters.read().await;
        counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub async fn get_gauge(&self, name: &str) -> u64 {
        let gauges = self.gauges.read().await;
        gauges
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a histogram observation with the default latency buckets
    pub async fn observe_histogram(&self, name: &str, value: f64) {
        {
            let histograms = self.histograms.read().await;
            if let Some(histogram) = histograms.get(name) {
                histogram.observe(value);
                return;
            }
        }

        let mut histograms = self.histograms.write().await;
        histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::default()))
            .observe(value);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let counters = self.counters.read().await;
        let gauges = self.gauges.read().await;
        let histograms = self.histograms.read().await;

        let counter_values: BTreeMap<&str, u64> = counters
            .iter()
            .map(|(k, v)| (k.as_str(), v.load(Ordering::Relaxed)))
            .collect();
        let gauge_values: BTreeMap<&str, u64> = gauges
            .iter()
            .map(|(k, v)| (k.as_str(), v.load(Ordering::Relaxed)))
            .collect();
        let histogram_values: BTreeMap<&str, serde_json::Value> = histograms
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_json()))
            .collect();

        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "counters": counter_values,
            "gauges": gauge_values,
            "histograms": histogram_values,
        })
    }

    pub async fn to_prometheus(&self) -> String {
        let counters = self.counters.read().await;
        let gauges = self.gauges.read().await;
        let histograms = self.histograms.read().await;

        let mut output = String::new();
        output.push_str("# HELP exporter_uptime_seconds Time since exporter start\n");
        output.push_str("# TYPE exporter_uptime_seconds gauge\n");
        output.push_str(&format!("exporter_uptime_seconds {}\n\n", self.uptime_seconds()));

        for (name, counter) in counters.iter() {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.load(Ordering::Relaxed)));
        }

        for (name, gauge) in gauges.iter() {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, gauge.load(Ordering::Relaxed)));
        }

        for (name, histogram) in histograms.iter() {
            output.push_str(&histogram.to_prometheus(name));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn prometheus_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

/// Fixed-bucket histogram
pub struct Histogram {
    /// Upper bounds, ascending
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    /// Sum of observations in thousandths
    sum_millis: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum_millis: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.sum_millis
            .fetch_add((value.max(0.0) * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if let Some(slot) = self.buckets.iter().position(|bound| value <= *bound) {
            if let Some(count) = self.counts.get(slot) {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        self.sum_millis.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn to_json(&self) -> serde_json::Value {
        let bucket_counts: Vec<u64> = self
            .counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect();

        serde_json::json!({
            "buckets": self.buckets,
            "counts": bucket_counts,
            "sum": self.sum(),
            "count": self.count(),
        })
    }

    pub fn to_prometheus(&self, name: &str) -> String {
        let name = prometheus_name(name);
        let mut output = format!("# TYPE {} histogram\n", name);

        let mut cumulative = 0u64;
        for (bound, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            output.push_str(&format!("{}_bucket{{le=\"{}\"}} {}\n", name, bound, cumulative));
        }
        output.push_str(&format!("{}_bucket{{le=\"+Inf\"}} {}\n", name, self.count()));
        output.push_str(&format!("{}_sum {}\n", name, self.sum()));
        output.push_str(&format!("{}_count {}\n", name, self.count()));
        output
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // seconds
        Self::new(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ])
    }
}

/// Metric names recorded by the exporter
pub mod metric_names {
    pub const RECORDS_RECEIVED: &str = "exporter.records.received";
    pub const RECORDS_SKIPPED: &str = "exporter.records.skipped";

    pub const BATCHES_EXPORTED: &str = "exporter.batches.exported";

    pub const DOCUMENTS_WRITTEN: &str = "exporter.documents.written";
    /// Writes turned into no-ops by a position guard
    pub const DOCUMENTS_UNCHANGED: &str = "exporter.documents.unchanged";
    pub const DOCUMENTS_FAILED: &str = "exporter.documents.failed";

    pub const MAPPING_FAILURES: &str = "exporter.errors.mapping";

    pub const MAPPING_LATENCY: &str = "exporter.mapping.latency_seconds";
    pub const BULK_LATENCY: &str = "exporter.bulk.latency_seconds";

    pub const LAST_EXPORTED_POSITION: &str = "exporter.last_exported_position";
}

/// Time an async operation into the histogram `metric_name`
pub async fn timed<F, T>(metrics: &MetricsRegistry, metric_name: &str, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f.await;
    metrics
        .observe_histogram(metric_name, start.elapsed().as_secs_f64())
        .await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter() {
        let registry = MetricsRegistry::new();

        registry.inc_counter(metric_names::DOCUMENTS_WRITTEN).await;
        registry.add_counter(metric_names::DOCUMENTS_WRITTEN, 4).await;

        assert_eq!(registry.get_counter(metric_names::DOCUMENTS_WRITTEN).await, 5);
        assert_eq!(registry.get_counter(metric_names::DOCUMENTS_FAILED).await, 0);
    }

    #[tokio::test]
    async fn test_gauge_overwrites() {
        let registry = MetricsRegistry::new();

        registry.set_gauge("exporter.position", 100).await;
        registry.set_gauge("exporter.position", 50).await;
        assert_eq!(registry.get_gauge("exporter.position").await, 50);
    }

    #[tokio::test]
    async fn test_timed_records_histogram() {
        let registry = MetricsRegistry::new();

        let value = timed(&registry, metric_names::BULK_LATENCY, async { 7 }).await;
        assert_eq!(value, 7);

        let json = registry.to_json().await;
        assert_eq!(json["histograms"][metric_names::BULK_LATENCY]["count"], 1);
    }

    #[test]
    fn test_histogram_buckets() {
        let histogram = Histogram::new(vec![0.1, 1.0]);
        histogram.observe(0.05);
        histogram.observe(0.5);
        histogram.observe(3.0);

        let prometheus = histogram.to_prometheus("exporter.bulk.latency_seconds");
        assert!(prometheus.contains("exporter_bulk_latency_seconds_bucket{le=\"0.1\"} 1"));
        assert!(prometheus.contains("exporter_bulk_latency_seconds_bucket{le=\"1\"} 2"));
        assert!(prometheus.contains("exporter_bulk_latency_seconds_bucket{le=\"+Inf\"} 3"));
        assert_eq!(histogram.count(), 3);
    }

    #[tokio::test]
    async fn test_prometheus_format() {
        let registry = MetricsRegistry::new();

        registry.inc_counter(metric_names::MAPPING_FAILURES).await;
        registry.set_gauge(metric_names::LAST_EXPORTED_POSITION, 42).await;

        let prometheus = registry.to_prometheus().await;
        assert!(prometheus.contains("exporter_errors_mapping 1"));
        assert!(prometheus.contains("exporter_last_exported_position 42"));
    }
}
