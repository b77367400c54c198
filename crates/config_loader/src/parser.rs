//! Configuration parsing
//!
//! TOML (primary) and JSON.

use contracts::{BusBlueprint, ContractError};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<BusBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<BusBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<BusBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BackpressurePolicy, ListenerType, MockKind, SourceType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[bus]
queue_depth = 16
backpressure = "drop_oldest"

[[sources]]
id = "vario"
source_type = "mock"
kind = "vario"
frequency_hz = 5.0

[[sources]]
id = "flight_log"
source_type = "nmea"
[sources.params]
path = "flight.nmea"

[[listeners]]
name = "console"
listener_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.bus.queue_depth, 16);
        assert_eq!(bp.bus.backpressure, BackpressurePolicy::DropOldest);
        assert_eq!(bp.sources.len(), 2);
        assert_eq!(bp.sources[0].kind, Some(MockKind::Vario));
        assert_eq!(bp.sources[1].source_type, SourceType::Nmea);
        assert_eq!(bp.sources[1].params["path"], "flight.nmea");
        assert_eq!(bp.listeners[0].listener_type, ListenerType::Log);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "sources": [{ "id": "hrm", "source_type": "mock", "kind": "heart_rate" }],
            "listeners": [{
                "name": "recorder",
                "listener_type": "file",
                "queue_depth": 128,
                "params": { "path": "out.jsonl" }
            }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.listeners[0].queue_depth, Some(128));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_source_type() {
        let content = r#"
[[sources]]
id = "cam"
source_type = "camera"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
