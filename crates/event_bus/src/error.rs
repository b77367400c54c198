//! Event bus error types

use thiserror::Error;

/// Bus-specific errors
#[derive(Debug, Error)]
pub enum BusError {
    /// `build` was called outside a tokio runtime
    #[error("no tokio runtime available, build the bus inside a runtime or pass a handle")]
    NoRuntime,

    /// Listener creation error
    #[error("failed to create listener '{name}': {message}")]
    ListenerCreation { name: String, message: String },

    /// Error from a source or listener contract
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl BusError {
    /// Create a listener creation error
    pub fn listener_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
