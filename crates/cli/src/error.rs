//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A configured source could not be built or started
    #[error("Source '{source_id}' failed to start: {message}")]
    SourceStart { source_id: String, message: String },

    /// A configured listener could not be created
    #[error("Listener '{name}' could not be created: {message}")]
    ListenerCreation { name: String, message: String },

    /// Bus construction error
    #[error("Failed to build event bus: {0}")]
    Bus(#[from] event_bus::BusError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn source_start(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceStart {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn listener_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Fail with `ConfigNotFound` unless the configuration file exists
pub fn ensure_config_exists(path: &std::path::Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = ensure_config_exists(&missing).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
        assert!(err.to_string().contains("absent.toml"));

        assert!(ensure_config_exists(dir.path()).is_ok());
    }
}
