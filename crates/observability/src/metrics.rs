//! Sensor bus metrics
//!
//! Metric helpers over the `metrics` facade, and an in-memory aggregator for
//! run summaries.

use std::collections::{BTreeMap, HashMap};

use metrics::{counter, gauge, histogram};

/// Record an envelope handed to the bus by a source
pub fn record_envelope_emitted(source_id: &str, kind: &str) {
    counter!(
        "sensor_bus_envelopes_emitted_total",
        "source_id" => source_id.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a source reaching the Failed state
pub fn record_source_failed(source_id: &str) {
    counter!(
        "sensor_bus_source_failures_total",
        "source_id" => source_id.to_string()
    )
    .increment(1);
}

/// Record a listener call that completed
pub fn record_envelope_delivered(listener: &str) {
    counter!(
        "sensor_bus_envelopes_delivered_total",
        "listener" => listener.to_string()
    )
    .increment(1);
}

/// Record an envelope evicted from a listener queue
pub fn record_envelope_dropped(listener: &str) {
    counter!(
        "sensor_bus_envelopes_dropped_total",
        "listener" => listener.to_string()
    )
    .increment(1);
}

/// Record a listener call that returned an error or panicked
pub fn record_listener_fault(listener: &str, panicked: bool) {
    let cause = if panicked { "panic" } else { "error" };
    counter!(
        "sensor_bus_listener_faults_total",
        "listener" => listener.to_string(),
        "cause" => cause.to_string()
    )
    .increment(1);
}

/// Record the current queue length of a listener
pub fn record_queue_depth(listener: &str, depth: usize) {
    gauge!(
        "sensor_bus_queue_depth",
        "listener" => listener.to_string()
    )
    .set(depth as f64);
}

/// Record the time between enqueue and the listener call
pub fn record_delivery_latency_ms(listener: &str, latency_ms: f64) {
    histogram!(
        "sensor_bus_delivery_latency_ms",
        "listener" => listener.to_string()
    )
    .record(latency_ms);
}

/// Bus statistics aggregator
///
/// Aggregates what a listener observes in memory, for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct BusStatsAggregator {
    /// Envelopes observed
    pub total_envelopes: u64,

    /// Terminal error envelopes observed
    pub total_errors: u64,

    /// Envelopes per sample kind
    pub kind_counts: BTreeMap<String, u64>,

    /// Per-source statistics
    pub sources: HashMap<String, SourceStats>,
}

/// What was observed from one source
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    pub envelopes: u64,
    pub errors: u64,
    /// Interval between consecutive sample timestamps (ms)
    pub interval_ms: RunningStats,
    last_timestamp: Option<f64>,
}

impl BusStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with one observed envelope
    pub fn record(&mut self, source_id: &str, kind: &str, timestamp: Option<f64>) {
        self.total_envelopes += 1;
        *self.kind_counts.entry(kind.to_string()).or_insert(0) += 1;

        let source = self.sources.entry(source_id.to_string()).or_default();
        source.envelopes += 1;
        if kind == "error" {
            self.total_errors += 1;
            source.errors += 1;
        }
        if let Some(timestamp) = timestamp {
            if let Some(last) = source.last_timestamp {
                source.interval_ms.push((timestamp - last) * 1000.0);
            }
            source.last_timestamp = Some(timestamp);
        }
    }

    /// Generate the summary report
    pub fn summary(&self) -> BusSummary {
        let mut sources: Vec<SourceSummary> = self
            .sources
            .iter()
            .map(|(source_id, stats)| SourceSummary {
                source_id: source_id.clone(),
                envelopes: stats.envelopes,
                errors: stats.errors,
                interval_ms: StatsSummary::from(&stats.interval_ms),
            })
            .collect();
        sources.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        BusSummary {
            total_envelopes: self.total_envelopes,
            total_errors: self.total_errors,
            kind_counts: self.kind_counts.clone(),
            sources,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct BusSummary {
    pub total_envelopes: u64,
    pub total_errors: u64,
    pub kind_counts: BTreeMap<String, u64>,
    pub sources: Vec<SourceSummary>,
}

/// Per-source part of [`BusSummary`]
#[derive(Debug, Clone, Default)]
pub struct SourceSummary {
    pub source_id: String,
    pub envelopes: u64,
    pub errors: u64,
    pub interval_ms: StatsSummary,
}

impl std::fmt::Display for BusSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sensor Bus Summary ===")?;
        writeln!(f, "Total envelopes: {}", self.total_envelopes)?;
        writeln!(f, "Source errors: {}", self.total_errors)?;

        if !self.kind_counts.is_empty() {
            writeln!(f, "By kind:")?;
            for (kind, count) in &self.kind_counts {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        for source in &self.sources {
            writeln!(
                f,
                "Source {}: {} envelopes, {} errors, interval (ms): {}",
                source.source_id, source.envelopes, source.errors, source.interval_ms
            )?;
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_record() {
        let mut aggregator = BusStatsAggregator::new();
        aggregator.record("gps", "connection", None);
        aggregator.record("gps", "location", Some(1.0));
        aggregator.record("gps", "location", Some(1.1));
        aggregator.record("gps", "location", Some(1.3));
        aggregator.record("gps", "error", None);
        aggregator.record("baro", "connection", None);

        assert_eq!(aggregator.total_envelopes, 6);
        assert_eq!(aggregator.total_errors, 1);
        assert_eq!(aggregator.kind_counts.get("location"), Some(&3));

        let gps = &aggregator.sources["gps"];
        assert_eq!(gps.envelopes, 5);
        assert_eq!(gps.interval_ms.count(), 2);
        assert!((gps.interval_ms.mean() - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = BusStatsAggregator::new();
        aggregator.record("vario", "vario", Some(0.0));
        aggregator.record("vario", "vario", Some(0.1));
        aggregator.record("baro", "error", None);

        let output = aggregator.summary().to_string();
        assert!(output.contains("Total envelopes: 3"));
        assert!(output.contains("Source errors: 1"));
        assert!(output.contains("vario: 2"));
        // sorted by id
        assert!(output.find("Source baro").unwrap() < output.find("Source vario").unwrap());
    }
}
