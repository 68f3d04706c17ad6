//! Layered error definitions
//!
//! Categorized by collaborator: config / metadata / sink / publish / alert

use thiserror::Error;

/// Unified error type returned by collaborators
#[derive(Debug, Error)]
pub enum ContractError {
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

    // ===== Metadata Errors =====
    /// Metadata store query failed
    #[error("metadata fetch error for '{query}': {message}")]
    MetadataFetch { query: String, message: String },

    // ===== Payload Errors =====
    /// Observation payload could not be decoded
    #[error("payload parse error: {message}")]
    PayloadParse { message: String },

    // ===== Output Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Publisher emit error
    #[error("publisher '{publisher}' error on topic '{topic}': {message}")]
    Publish {
        publisher: String,
        topic: String,
        message: String,
    },

    /// Alert transport error
    #[error("alert transport '{transport}' error for sensor '{sensor}': {message}")]
    AlertTransport {
        transport: String,
        sensor: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
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

    /// Create metadata fetch error
    pub fn metadata_fetch(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetadataFetch {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create publisher error
    pub fn publish(
        publisher: impl Into<String>,
        topic: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Publish {
            publisher: publisher.into(),
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create alert transport error
    pub fn alert_transport(
        transport: impl Into<String>,
        sensor: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::AlertTransport {
            transport: transport.into(),
            sensor: sensor.into(),
            message: message.into(),
        }
    }
}
