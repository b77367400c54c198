//! Run statistics.

use std::time::Duration;

use contracts::{ListenerResult, SampleEnvelope, SensorListener};
use event_bus::ListenerMetricsReport;
use observability::{BusStatsAggregator, BusSummary};

/// Listener that feeds every envelope into a [`BusStatsAggregator`]
#[derive(Default)]
pub struct StatsListener {
    aggregator: BusStatsAggregator,
}

impl StatsListener {
    pub fn summary(&self) -> BusSummary {
        self.aggregator.summary()
    }
}

impl SensorListener for StatsListener {
    fn name(&self) -> &str {
        "stats"
    }

    fn on_envelope(&mut self, envelope: &SampleEnvelope) -> ListenerResult {
        self.aggregator.record(
            envelope.source_id(),
            envelope.kind().as_str(),
            envelope.timestamp(),
        );
        Ok(())
    }
}

/// Statistics from a bus run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Sources that started successfully
    pub active_sources: usize,

    /// Configured listeners that were subscribed
    pub active_listeners: usize,

    /// Diagnostics observed during the run
    pub diagnostics: u64,

    /// What the stats listener saw
    pub summary: BusSummary,

    /// Per-subscription delivery counters at shutdown
    pub listeners: Vec<ListenerMetricsReport>,
}

impl PipelineStats {
    /// Envelopes per second seen by the stats listener
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.total_envelopes as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Sensor Bus Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Envelopes: {}", self.summary.total_envelopes);
        println!("   ├─ Throughput: {:.2}/s", self.throughput());
        println!("   ├─ Source errors: {}", self.summary.total_errors);
        println!("   ├─ Diagnostics: {}", self.diagnostics);
        println!("   ├─ Active sources: {}", self.active_sources);
        println!("   └─ Active listeners: {}", self.active_listeners);

        if !self.summary.sources.is_empty() {
            println!("\n📡 Sources");
            for source in &self.summary.sources {
                println!(
                    "   ├─ {}: {} envelopes, {} errors, interval (ms) {}",
                    source.source_id, source.envelopes, source.errors, source.interval_ms
                );
            }
        }

        if !self.listeners.is_empty() {
            println!("\n👂 Listeners");
            for report in &self.listeners {
                println!(
                    "   ├─ {} [{}]: delivered {}, faults {}, dropped {}",
                    report.listener,
                    report.subscription,
                    report.metrics.delivered,
                    report.metrics.faults,
                    report.metrics.dropped
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Sample;

    #[test]
    fn test_stats_listener_aggregates() {
        let mut listener = StatsListener::default();
        for (sequence, timestamp) in [(1, 0.0), (2, 0.5), (3, 1.0)] {
            let envelope = SampleEnvelope::new(
                "hrm".into(),
                sequence,
                Sample::HeartRate { timestamp, bpm: 70 },
            )
            .unwrap();
            listener.on_envelope(&envelope).unwrap();
        }
        let error = SampleEnvelope::new("hrm".into(), 4, Sample::error("device lost")).unwrap();
        listener.on_envelope(&error).unwrap();

        let summary = listener.summary();
        assert_eq!(summary.total_envelopes, 4);
        assert_eq!(summary.total_errors, 1);
        assert_eq!(summary.sources[0].interval_ms.count, 2);
        assert!((summary.sources[0].interval_ms.mean - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput() {
        let mut stats = PipelineStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        stats.summary.total_envelopes = 10;
        assert!((stats.throughput() - 5.0).abs() < 1e-9);

        stats.duration = Duration::ZERO;
        assert_eq!(stats.throughput(), 0.0);
    }
}
