//! Configuration validation
//!
//! Rules:
//! - source ids unique and non-empty
//! - listener names unique and non-empty
//! - frequency_hz > 0 and finite
//! - queue depths and diagnostics capacity > 0
//! - mock sources name a kind, other sources do not
//! - scripted/nmea sources and file listeners have a `path` param

use std::collections::HashSet;

use contracts::{BusBlueprint, ContractError, ListenerType, SourceType};

/// Validate a BusBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &BusBlueprint) -> Result<(), ContractError> {
    validate_bus(blueprint)?;
    validate_source_ids(blueprint)?;
    validate_sources(blueprint)?;
    validate_listeners(blueprint)?;
    Ok(())
}

fn validate_bus(blueprint: &BusBlueprint) -> Result<(), ContractError> {
    if blueprint.bus.queue_depth == 0 {
        return Err(ContractError::config_validation(
            "bus.queue_depth",
            "queue_depth must be > 0",
        ));
    }
    if blueprint.bus.diagnostics_capacity == 0 {
        return Err(ContractError::config_validation(
            "bus.diagnostics_capacity",
            "diagnostics_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_source_ids(blueprint: &BusBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, source) in blueprint.sources.iter().enumerate() {
        if source.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}].id"),
                "source id cannot be empty",
            ));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("sources[id={}]", source.id),
                "duplicate source id",
            ));
        }
    }
    Ok(())
}

fn validate_sources(blueprint: &BusBlueprint) -> Result<(), ContractError> {
    for source in &blueprint.sources {
        if !(source.frequency_hz.is_finite() && source.frequency_hz > 0.0) {
            return Err(ContractError::config_validation(
                format!("sources[{}].frequency_hz", source.id),
                format!("frequency_hz must be > 0, got {}", source.frequency_hz),
            ));
        }

        match (source.source_type, source.kind) {
            (SourceType::Mock, None) => {
                return Err(ContractError::config_validation(
                    format!("sources[{}].kind", source.id),
                    "mock sources need a kind",
                ));
            }
            (SourceType::Scripted | SourceType::Nmea, Some(_)) => {
                return Err(ContractError::config_validation(
                    format!("sources[{}].kind", source.id),
                    "kind only applies to mock sources",
                ));
            }
            _ => {}
        }

        if matches!(source.source_type, SourceType::Scripted | SourceType::Nmea)
            && !source.params.contains_key("path")
        {
            return Err(ContractError::config_validation(
                format!("sources[{}].params.path", source.id),
                "path is required for scripted and nmea sources",
            ));
        }
    }
    Ok(())
}

fn validate_listeners(blueprint: &BusBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, listener) in blueprint.listeners.iter().enumerate() {
        if listener.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("listeners[{idx}].name"),
                "listener name cannot be empty",
            ));
        }
        if !seen.insert(listener.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("listeners[name={}]", listener.name),
                "duplicate listener name",
            ));
        }
        if listener.queue_depth == Some(0) {
            return Err(ContractError::config_validation(
                format!("listeners[{}].queue_depth", listener.name),
                "queue_depth must be > 0",
            ));
        }
        if listener.listener_type == ListenerType::File && !listener.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("listeners[{}].params.path", listener.name),
                "path is required for file listeners",
            ));
        }
    }
    Ok(())
}
