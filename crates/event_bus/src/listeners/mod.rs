//! Built-in listeners

mod file;
mod log;

use std::sync::{Arc, Mutex};

use contracts::{ListenerConfig, ListenerType, SensorListener};
use tracing::instrument;

use crate::error::BusError;

pub use file::FileListener;
pub use log::LogListener;

/// Shared handle to a listener of any type
pub type SharedListener = Arc<Mutex<dyn SensorListener + Send>>;

/// Create a built-in listener from configuration
///
/// The bus holds listeners weakly, so the caller keeps the returned handle
/// alive for as long as the subscription should last.
#[instrument(
    name = "event_bus_build_listener",
    skip(config),
    fields(listener = %config.name, listener_type = ?config.listener_type)
)]
pub fn build_listener(config: &ListenerConfig) -> Result<SharedListener, BusError> {
    let listener: SharedListener = match config.listener_type {
        ListenerType::Log => Arc::new(Mutex::new(LogListener::new(&config.name))),
        ListenerType::File => {
            let listener = FileListener::from_params(&config.name, &config.params)
                .map_err(|e| BusError::listener_creation(&config.name, e.to_string()))?;
            Arc::new(Mutex::new(listener))
        }
    };
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn listener_config(name: &str, listener_type: ListenerType) -> ListenerConfig {
        ListenerConfig {
            name: name.to_string(),
            listener_type,
            queue_depth: None,
            backpressure: None,
            params: HashMap::new(),
        }
    }

    #[test]
    fn test_build_log_listener() {
        let listener = build_listener(&listener_config("console", ListenerType::Log)).unwrap();
        assert_eq!(listener.lock().unwrap().name(), "console");
    }

    #[test]
    fn test_build_file_listener_in_bad_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let mut config = listener_config("recorder", ListenerType::File);
        config.params.insert(
            "path".into(),
            blocker.join("out.jsonl").display().to_string(),
        );
        let err = build_listener(&config).err().unwrap();
        assert!(matches!(err, BusError::ListenerCreation { .. }));
    }
}
