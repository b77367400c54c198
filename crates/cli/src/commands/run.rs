//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::pipeline::{Pipeline, PipelineConfig, StopReason};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(depth) = args.queue_depth {
        info!(queue_depth = depth, "Overriding bus queue depth from CLI");
        blueprint.bus.queue_depth = depth;
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Invalid --queue-depth override")?;
    }

    info!(
        sources = blueprint.sources.len(),
        listeners = blueprint.listeners.len(),
        queue_depth = blueprint.bus.queue_depth,
        backpressure = ?blueprint.bus.backpressure,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: if args.duration == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!("Starting sensor bus...");

    let (stats, reason) = pipeline
        .run(shutdown_signal())
        .await
        .context("Sensor bus run failed")?;

    match reason {
        StopReason::Shutdown => warn!("Stopped by shutdown signal"),
        StopReason::DurationElapsed => info!("Run duration elapsed"),
        StopReason::SourcesEnded => info!("All sources ended"),
    }

    info!(
        envelopes = stats.summary.total_envelopes,
        source_errors = stats.summary.total_errors,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Run completed"
    );
    stats.print_summary();

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::BusBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Bus:");
    println!("  Queue depth: {}", blueprint.bus.queue_depth);
    println!("  Back-pressure: {:?}", blueprint.bus.backpressure);

    println!("\nSources ({}):", blueprint.sources.len());
    for source in &blueprint.sources {
        match source.kind {
            Some(kind) => println!(
                "  - {} ({:?} {:?}, {} Hz)",
                source.id, source.source_type, kind, source.frequency_hz
            ),
            None => println!(
                "  - {} ({:?}, {} Hz)",
                source.id, source.source_type, source.frequency_hz
            ),
        }
    }

    if !blueprint.listeners.is_empty() {
        println!("\nListeners ({}):", blueprint.listeners.len());
        for listener in &blueprint.listeners {
            println!("  - {} ({:?})", listener.name, listener.listener_type);
        }
    }

    println!();
}
