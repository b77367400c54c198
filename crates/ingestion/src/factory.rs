//! Source factory
//!
//! Builds a [`SensorSource`] from its [`SourceConfig`].
//!
//! Recognised `params`:
//! - mock: `seed`, `fail_after`, `available` (`true`/`false`)
//! - scripted: `path` (required), `on_end` (`idle`/`lost`), `lost_message`
//! - nmea: `path` (required)

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, SensorSource, SourceConfig, SourceType};
use tracing::{debug, instrument};

use crate::mock::{MockDevice, MockDeviceConfig};
use crate::nmea::NmeaDevice;
use crate::polled::PolledSource;
use crate::scripted::{ScriptEnd, ScriptedDevice};

/// Build a source from its configuration
///
/// # Errors
/// `ConfigValidation` for a missing or malformed parameter.
#[instrument(name = "build_source", skip(config), fields(source_id = %config.id))]
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn SensorSource>, ContractError> {
    let source: Arc<dyn SensorSource> = match config.source_type {
        SourceType::Mock => {
            let kind = config.kind.ok_or_else(|| {
                ContractError::config_validation(
                    format!("sources[{}].kind", config.id),
                    "mock sources need a kind",
                )
            })?;
            let device_config = MockDeviceConfig {
                frequency_hz: config.frequency_hz,
                fail_after: param(config, "fail_after")?,
                available: param(config, "available")?.unwrap_or(true),
                seed: param(config, "seed")?,
            };
            Arc::new(PolledSource::new(
                config.id.as_str(),
                MockDevice::new(kind, device_config),
            ))
        }
        SourceType::Scripted => {
            let end = match config.params.get("on_end").map(String::as_str) {
                None | Some("idle") => ScriptEnd::Idle,
                Some("lost") => ScriptEnd::Lost(
                    config
                        .params
                        .get("lost_message")
                        .cloned()
                        .unwrap_or_else(|| "device lost".to_string()),
                ),
                Some(other) => {
                    return Err(ContractError::config_validation(
                        format!("sources[{}].params.on_end", config.id),
                        format!("expected 'idle' or 'lost', got '{other}'"),
                    ))
                }
            };
            let device = ScriptedDevice::from_path(required_path(config)?)
                .ending_with(end)
                .with_interval(interval(config));
            Arc::new(PolledSource::new(config.id.as_str(), device))
        }
        SourceType::Nmea => {
            let device =
                NmeaDevice::from_path(required_path(config)?).with_interval(interval(config));
            Arc::new(PolledSource::new(config.id.as_str(), device))
        }
    };

    debug!(source_type = ?config.source_type, "source built");
    Ok(source)
}

fn interval(config: &SourceConfig) -> Duration {
    Duration::try_from_secs_f64(1.0 / config.frequency_hz).unwrap_or(Duration::from_millis(100))
}

fn required_path(config: &SourceConfig) -> Result<&str, ContractError> {
    config.params.get("path").map(String::as_str).ok_or_else(|| {
        ContractError::config_validation(
            format!("sources[{}].params.path", config.id),
            "path is required",
        )
    })
}

fn param<T: FromStr>(config: &SourceConfig, key: &str) -> Result<Option<T>, ContractError>
where
    T::Err: std::fmt::Display,
{
    config
        .params
        .get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                ContractError::config_validation(
                    format!("sources[{}].params.{key}", config.id),
                    format!("invalid value '{raw}': {e}"),
                )
            })
        })
        .transpose()
}
