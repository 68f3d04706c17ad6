//! FileSink - appends JSON lines, one file per destination table
//!
//! Layout under `base_path`:
//! - `<network>__<feature>.jsonl` feature rows
//! - `<network>__unknown_feature.jsonl` misfit rows
//! - `<topic>.jsonl` publications
//! - `alerts.jsonl` alerts

use contracts::{
    Alert, AlertTransport, ContractError, FeatureInsert, FeatureSink, MisfitRecord, MisfitSink,
    Publication, Publisher,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let base_path = params
            .get("base_path")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| "missing 'base_path' parameter".to_string())?;
        Ok(Self {
            base_path: PathBuf::from(base_path),
        })
    }
}

/// Output that writes JSON lines to disk, usable in every role
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writers: HashMap<String, BufWriter<File>>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        Ok(Self {
            name: name.into(),
            config,
            writers: HashMap::new(),
        })
    }

    /// Create from params map (for the dispatcher factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config =
            FileSinkConfig::from_params(params).map_err(|e| ContractError::sink_write(&name, e))?;
        Self::new(&name, config).map_err(|e| ContractError::SinkConnection {
            sink_name: name.clone(),
            message: e.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Path of the file that stores `stem`
    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.config.base_path.join(format!("{stem}.jsonl"))
    }

    fn append<T: Serialize>(&mut self, stem: &str, value: &T) -> Result<(), ContractError> {
        let line = serde_json::to_vec(value)
            .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}")))?;

        if !self.writers.contains_key(stem) {
            let path = self.path_for(stem);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    ContractError::sink_write(&self.name, format!("{}: {e}", path.display()))
                })?;
            debug!(sink = %self.name, path = %path.display(), "Opened output file");
            self.writers.insert(stem.to_string(), BufWriter::new(file));
        }

        let Some(writer) = self.writers.get_mut(stem) else {
            return Err(ContractError::sink_write(&self.name, "writer missing"));
        };
        writer
            .write_all(&line)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    fn flush_all(&mut self) -> Result<(), ContractError> {
        for (stem, writer) in &mut self.writers {
            if let Err(e) = writer.flush() {
                error!(sink = %self.name, file = %stem, error = %e, "Flush failed");
                return Err(ContractError::sink_write(&self.name, e.to_string()));
            }
        }
        Ok(())
    }

    fn close_all(&mut self) -> Result<(), ContractError> {
        let result = self.flush_all();
        self.writers.clear();
        debug!(sink = %self.name, "FileSink closed");
        result
    }
}

impl FeatureSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_insert_feature",
        skip(self, row),
        fields(sink = %self.name, table = %row.table())
    )]
    async fn insert_feature_row(&mut self, row: &FeatureInsert) -> Result<(), ContractError> {
        self.append(&row.table(), row)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_all()
    }
}

impl MisfitSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_misfit_row(&mut self, record: &MisfitRecord) -> Result<(), ContractError> {
        self.append(&record.table(), record)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_all()
    }
}

impl Publisher for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn emit(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.append(&publication.topic, &publication.payload)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_all()
    }
}

impl AlertTransport for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&mut self, alert: &Alert) -> Result<(), ContractError> {
        self.append("alerts", alert)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_all()
    }
}
