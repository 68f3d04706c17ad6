//! JSON-lines record reader
//!
//! A background task reads the input line by line and feeds
//! [`StreamRecord`]s into a bounded async-channel; the channel gives the
//! pipeline natural backpressure on the reader.

use std::path::Path;
use std::sync::Arc;

use async_channel::{bounded, Receiver};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::config::{IngestionMetrics, ReaderConfig};
use crate::error::{IngestionError, Result};
use crate::record::StreamRecord;

/// Records plus the task producing them.
///
/// The task resolves to the number of records sent once the input is
/// exhausted.
pub struct RecordStream {
    pub records: Receiver<StreamRecord>,
    pub task: JoinHandle<Result<u64>>,
}

/// Spawns reader tasks over files, stdin or any buffered reader
pub struct RecordReader {
    config: ReaderConfig,
    metrics: Arc<IngestionMetrics>,
}

impl RecordReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Read records from a file
    pub async fn open(&self, path: &Path) -> Result<RecordStream> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| IngestionError::Read {
                source_name: path.display().to_string(),
                source,
            })?;
        Ok(self.spawn(path.display().to_string(), BufReader::new(file)))
    }

    /// Read records from standard input
    pub fn stdin(&self) -> RecordStream {
        self.spawn("stdin", BufReader::new(tokio::io::stdin()))
    }

    /// Read records from `reader` on a background task
    pub fn spawn<R>(&self, source_name: impl Into<String>, reader: R) -> RecordStream
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, rx) = bounded(self.config.channel_capacity.max(1));
        let metrics = self.metrics.clone();
        let source_name = source_name.into();

        let task = tokio::spawn(async move {
            let sent = read_lines(&source_name, reader, tx, metrics).await?;
            info!(source = %source_name, records = sent, "input exhausted");
            Ok(sent)
        });

        RecordStream { records: rx, task }
    }
}

#[instrument(name = "ingestion_read_lines", skip(reader, tx, metrics))]
async fn read_lines<R>(
    source_name: &str,
    mut reader: R,
    tx: async_channel::Sender<StreamRecord>,
    metrics: Arc<IngestionMetrics>,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut sequence = 0u64;
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|source| IngestionError::Read {
                source_name: source_name.to_string(),
                source,
            })?;
        if n == 0 {
            return Ok(sequence);
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            metrics.record_blank();
            continue;
        }

        sequence += 1;
        metrics.record_read();
        let record = StreamRecord::new(sequence, std::mem::take(&mut line));
        if tx.send(record).await.is_err() {
            debug!(sequence, "record receiver dropped, stopping reader");
            return Err(IngestionError::ChannelClosed {
                sequence: sequence - 1,
            });
        }
        metrics.update_queue_len(tx.len());
    }
}
