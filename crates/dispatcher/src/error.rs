//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Output creation error
    #[error("failed to create output '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Output kind cannot serve the requested role
    #[error("output '{name}' of kind '{kind}' cannot act as {role}")]
    UnsupportedRole {
        name: String,
        kind: String,
        role: &'static str,
    },

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
