//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Output construction failed
    #[error("Failed to start outputs: {message}")]
    OutputSetup { message: String },

    /// Input could not be opened or read
    #[error("Failed to read input: {message}")]
    Input { message: String },

    /// Metadata document could not be loaded
    #[error("Failed to load metadata: {message}")]
    Metadata { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn output_setup(message: impl Into<String>) -> Self {
        Self::OutputSetup {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }
}
