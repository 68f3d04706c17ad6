//! # Ingestion
//!
//! Stream record ingestion module.
//!
//! Responsibilities:
//! - Read JSON-lines input (file or stdin) into `StreamRecord`s
//! - Decode records into observations, skipping malformed ones
//! - Backpressure via a bounded async-channel
//! - Track the contiguous checkpoint watermark
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{decode_or_skip, RecordReader, ReaderConfig};
//!
//! let reader = RecordReader::new(ReaderConfig::default());
//! let stream = reader.open(path).await?;
//! let metrics = reader.metrics();
//! while let Ok(record) = stream.records.recv().await {
//!     if let Some(observation) = decode_or_skip(&record, &metrics) {
//!         // route it
//!     }
//! }
//! ```

mod checkpoint;
mod config;
mod error;
mod reader;
mod record;

pub use checkpoint::CheckpointTracker;
pub use config::{IngestionMetrics, MetricsSnapshot, ReaderConfig};
pub use error::{IngestionError, Result};
pub use reader::{RecordReader, RecordStream};
pub use record::{decode_or_skip, StreamRecord};
