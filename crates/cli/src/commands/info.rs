//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::BusBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    bus: BusInfo,
    sources: Vec<SourceInfo>,
    listeners: Vec<ListenerInfo>,
}

#[derive(Serialize)]
struct BusInfo {
    queue_depth: usize,
    backpressure: String,
    diagnostics_capacity: usize,
}

#[derive(Serialize)]
struct SourceInfo {
    id: String,
    source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    frequency_hz: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ListenerInfo {
    name: String,
    listener_type: String,
    queue_depth: usize,
    backpressure: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &BusBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sources = blueprint
        .sources
        .iter()
        .map(|s| SourceInfo {
            id: s.id.clone(),
            source_type: format!("{:?}", s.source_type),
            kind: s.kind.map(|kind| format!("{:?}", kind)),
            frequency_hz: s.frequency_hz,
            params: if args.params {
                s.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    // Listener rows show the effective settings, overrides applied
    let listeners = blueprint
        .listeners
        .iter()
        .map(|l| ListenerInfo {
            name: l.name.clone(),
            listener_type: format!("{:?}", l.listener_type),
            queue_depth: l.queue_depth.unwrap_or(blueprint.bus.queue_depth),
            backpressure: format!(
                "{:?}",
                l.backpressure.unwrap_or(blueprint.bus.backpressure)
            ),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        bus: BusInfo {
            queue_depth: blueprint.bus.queue_depth,
            backpressure: format!("{:?}", blueprint.bus.backpressure),
            diagnostics_capacity: blueprint.bus.diagnostics_capacity,
        },
        sources,
        listeners,
    }
}

fn branch(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Sensor Bus Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🚌 Bus");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Queue depth: {}", info.bus.queue_depth);
    println!("   ├─ Back-pressure: {}", info.bus.backpressure);
    println!("   └─ Diagnostics capacity: {}", info.bus.diagnostics_capacity);

    println!("\n📡 Sources ({})", info.sources.len());
    for (i, source) in info.sources.iter().enumerate() {
        let kind = source.kind.as_deref().unwrap_or("-");
        println!(
            "   {} {} ({}, {}, {} Hz)",
            branch(i, info.sources.len()),
            source.id,
            source.source_type,
            kind,
            source.frequency_hz
        );
        for (key, value) in &source.params {
            println!("        {} = {}", key, value);
        }
    }

    if !info.listeners.is_empty() {
        println!("\n👂 Listeners ({})", info.listeners.len());
        for (i, listener) in info.listeners.iter().enumerate() {
            println!(
                "   {} {} ({}, depth {}, {})",
                branch(i, info.listeners.len()),
                listener.name,
                listener.listener_type,
                listener.queue_depth,
                listener.backpressure
            );
        }
    }

    println!();
}
