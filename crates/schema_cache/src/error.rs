//! Metadata cache error types

use thiserror::Error;

/// Refresh failure, shared by every caller that joined the same refresh
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// One of the metadata queries failed
    #[error("metadata store '{store}' fetch failed: {message}")]
    Fetch { store: String, message: String },

    /// The metadata queries did not finish in time
    #[error("metadata refresh from '{store}' timed out after {timeout_ms}ms")]
    Timeout { store: String, timeout_ms: u64 },
}
