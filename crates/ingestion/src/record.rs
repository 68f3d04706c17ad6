//! Stream records and decoding

use bytes::Bytes;
use contracts::Observation;
use tracing::error;

use crate::config::IngestionMetrics;
use crate::error::{IngestionError, Result};

/// One line of the input stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Position in the stream, starting at 1; blank lines are not counted
    pub sequence: u64,
    /// Raw line without the trailing newline
    pub data: Bytes,
}

impl StreamRecord {
    pub fn new(sequence: u64, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            data: data.into(),
        }
    }

    /// Decode the payload into an observation (not yet normalized)
    pub fn decode(&self) -> Result<Observation> {
        Observation::from_json_slice(&self.data).map_err(|e| IngestionError::Decode {
            sequence: self.sequence,
            message: e.to_string(),
        })
    }
}

/// Decode `record`, logging and counting it when malformed
pub fn decode_or_skip(record: &StreamRecord, metrics: &IngestionMetrics) -> Option<Observation> {
    match record.decode() {
        Ok(observation) => Some(observation),
        Err(e) => {
            metrics.record_malformed();
            error!(sequence = record.sequence, error = %e, "skipping malformed record");
            None
        }
    }
}
