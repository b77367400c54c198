//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BusBlueprint, ListenerType, SourceType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    queue_depth: usize,
    backpressure: String,
    source_count: usize,
    listener_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    queue_depth: blueprint.bus.queue_depth,
                    backpressure: format!("{:?}", blueprint.bus.backpressure),
                    source_count: blueprint.sources.len(),
                    listener_count: blueprint.listeners.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &BusBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sources.is_empty() {
        warnings.push("No sources configured - listeners will receive nothing".to_string());
    }

    if blueprint.listeners.is_empty() {
        warnings.push("No listeners configured - envelopes will be discarded".to_string());
    }

    for source in &blueprint.sources {
        if source.source_type != SourceType::Mock && source.kind.is_some() {
            warnings.push(format!(
                "Source '{}' sets 'kind', which only applies to mock sources",
                source.id
            ));
        }
    }

    let recorders = blueprint
        .listeners
        .iter()
        .filter(|listener| listener.listener_type == ListenerType::File)
        .filter(|listener| {
            listener
                .backpressure
                .unwrap_or(blueprint.bus.backpressure)
                == contracts::BackpressurePolicy::DropOldest
        });
    for listener in recorders {
        warnings.push(format!(
            "File listener '{}' uses drop_oldest - recordings may have gaps",
            listener.name
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Queue depth: {}", summary.queue_depth);
            println!("  Back-pressure: {}", summary.backpressure);
            println!("  Sources: {}", summary.source_count);
            println!("  Listeners: {}", summary.listener_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
