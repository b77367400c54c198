//! Layered error definitions
//!
//! Categorized by origin: source lifecycle / listener / sample / config

use thiserror::Error;

use crate::{SampleKind, SourceId};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Source Lifecycle Errors =====
    /// The underlying device or platform service could not be acquired
    #[error("device unavailable for source '{source_id}': {message}")]
    DeviceUnavailable { source_id: SourceId, message: String },

    /// `start` called on a source that was already started
    #[error("source '{source_id}' already started")]
    AlreadyStarted { source_id: SourceId },

    /// Terminal source failure; ends that source's stream
    #[error("source '{source_id}' failed: {message}")]
    SourceError { source_id: SourceId, message: String },

    // ===== Listener Errors =====
    /// A listener failed while handling an envelope
    #[error("listener '{listener}' fault: {message}")]
    ListenerFault { listener: String, message: String },

    // ===== Sample Errors =====
    /// Sample rejected at construction
    #[error("invalid {kind:?} sample: {message}")]
    InvalidSample { kind: SampleKind, message: String },

    /// Raw device input could not be decoded
    #[error("payload parse error for source '{source_id}': {message}")]
    PayloadParse { source_id: SourceId, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create device unavailable error
    pub fn device_unavailable(source_id: &SourceId, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            source_id: source_id.clone(),
            message: message.into(),
        }
    }

    /// Create already started error
    pub fn already_started(source_id: &SourceId) -> Self {
        Self::AlreadyStarted {
            source_id: source_id.clone(),
        }
    }

    /// Create terminal source error
    pub fn source_error(source_id: &SourceId, message: impl Into<String>) -> Self {
        Self::SourceError {
            source_id: source_id.clone(),
            message: message.into(),
        }
    }

    /// Human-readable message suitable for an `Error` envelope.
    ///
    /// Source errors yield their bare message; everything else its display form.
    pub fn terminal_message(&self) -> String {
        match self {
            Self::SourceError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Create listener fault
    pub fn listener_fault(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerFault {
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// Create invalid sample error
    pub fn invalid_sample(kind: SampleKind, message: impl Into<String>) -> Self {
        Self::InvalidSample {
            kind,
            message: message.into(),
        }
    }

    /// Create payload parse error
    pub fn payload_parse(source_id: &SourceId, message: impl Into<String>) -> Self {
        Self::PayloadParse {
            source_id: source_id.clone(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}
