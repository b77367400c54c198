//! Pipeline orchestrator - wires configured sources and listeners to the bus.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::{BusBlueprint, SensorSource, SourceState};
use event_bus::{build_listener, EventBus, SharedListener, SubscriptionOptions};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::stats::StatsListener;
use super::PipelineStats;
use crate::error::CliError;

/// How often the orchestrator checks whether every source has ended
const SOURCE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The bus blueprint
    pub blueprint: BusBlueprint,

    /// Stop after this long (None = until sources end or shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DurationElapsed,
    SourcesEnded,
    Shutdown,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the duration elapses, every source has ended, or `shutdown`
    /// resolves
    pub async fn run<S>(self, shutdown: S) -> Result<(PipelineStats, StopReason)>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let bus = EventBus::builder(blueprint.bus.clone())
            .build()
            .map_err(CliError::from)?;

        // Listeners are subscribed before any source starts so that each one
        // sees every stream from its first envelope
        let stats_listener = Arc::new(Mutex::new(StatsListener::default()));
        bus.subscribe(&stats_listener);

        let mut listeners: Vec<SharedListener> = Vec::with_capacity(blueprint.listeners.len());
        for config in &blueprint.listeners {
            let listener = build_listener(config)
                .map_err(|e| CliError::listener_creation(&config.name, e.to_string()))?;
            bus.subscribe_with(&listener, SubscriptionOptions::from(config));
            listeners.push(listener);
        }
        info!(listeners = listeners.len(), "Listeners subscribed");

        if blueprint.listeners.is_empty() {
            warn!("No listeners configured - only statistics will be collected");
        }

        let mut diagnostics = bus.diagnostics();

        let mut sources: Vec<Arc<dyn SensorSource>> = Vec::with_capacity(blueprint.sources.len());
        for config in &blueprint.sources {
            let source = ingestion::build_source(config)
                .map_err(|e| CliError::source_start(&config.id, e.to_string()))?;
            match bus.attach(Arc::clone(&source)) {
                Ok(_) => sources.push(source),
                Err(e) => {
                    // One unavailable device does not take the others down
                    warn!(source_id = %config.id, error = %e, "Source not started");
                }
            }
        }

        if sources.is_empty() && !blueprint.sources.is_empty() {
            bus.shutdown().await;
            return Err(CliError::source_start("*", "no configured source could be started").into());
        }

        info!(
            sources = sources.len(),
            duration = ?self.config.duration,
            "Sensor bus running"
        );

        let mut diagnostic_count = 0u64;
        let deadline = async {
            match self.config.duration {
                Some(duration) => sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let mut progress = SourceProgress::new(sources.len());
        let mut ticker = interval(SOURCE_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = &mut deadline => break StopReason::DurationElapsed,
                _ = &mut shutdown => break StopReason::Shutdown,
                received = diagnostics.recv() => match received {
                    Ok(diagnostic) => {
                        diagnostic_count += 1;
                        debug!(?diagnostic, "Diagnostic received");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        diagnostic_count += skipped;
                        warn!(skipped, "Diagnostics lagged");
                    }
                    Err(RecvError::Closed) => break StopReason::Shutdown,
                },
                _ = ticker.tick() => {
                    if progress.all_ended(&sources) {
                        break StopReason::SourcesEnded;
                    }
                }
            }
        };

        info!(reason = ?reason, "Shutting down sensor bus...");
        let listener_reports = bus.metrics();
        bus.shutdown().await;

        let summary = stats_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            active_sources: sources.len(),
            active_listeners: listeners.len(),
            diagnostics: diagnostic_count,
            summary,
            listeners: listener_reports,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            envelopes = stats.summary.total_envelopes,
            "Sensor bus shutdown complete"
        );

        Ok((stats, reason))
    }
}

/// Tracks which sources have been seen connected
///
/// A started source may still be `Disconnected` until its producer thread
/// emits `Connected`, so that state only counts as ended once the source was
/// seen running.
struct SourceProgress {
    connected: Vec<bool>,
}

impl SourceProgress {
    fn new(sources: usize) -> Self {
        Self {
            connected: vec![false; sources],
        }
    }

    /// Every started source has failed or disconnected after running
    fn all_ended(&mut self, sources: &[Arc<dyn SensorSource>]) -> bool {
        let mut ended = 0;
        for (source, connected) in sources.iter().zip(self.connected.iter_mut()) {
            match source.state() {
                SourceState::Connected => *connected = true,
                SourceState::Failed => ended += 1,
                SourceState::Disconnected if *connected => ended += 1,
                SourceState::Disconnected => {}
            }
        }
        !sources.is_empty() && ended == sources.len()
    }
}
