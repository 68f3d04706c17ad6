//! FileMetadataStore - metadata document on disk
//!
//! The document is re-read on every fetch so edits are picked up by the next
//! refresh without a restart.

use std::path::{Path, PathBuf};

use contracts::{ContractError, FeatureRow, MetadataStore, SensorRow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// On-disk metadata document
///
/// ```json
/// { "sensors":  [{ "name": "htu21d", "observed_properties": { "temp": "temperature.temperature" } }],
///   "features": [{ "name": "temperature", "observed_properties": [{ "name": "temperature", "type": "float" }] }] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub sensors: Vec<SensorRow>,
    #[serde(default)]
    pub features: Vec<FeatureRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Metadata store backed by a JSON or TOML document
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    name: String,
    path: PathBuf,
    format: DocumentFormat,
}

impl FileMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            format: DocumentFormat::from_path(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole document
    pub async fn load(&self, query: &str) -> Result<MetadataDocument, ContractError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ContractError::metadata_fetch(query, format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), query, bytes = content.len(), "metadata document read");

        match self.format {
            DocumentFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ContractError::metadata_fetch(query, format!("invalid JSON: {e}"))),
            DocumentFormat::Toml => toml::from_str(&content)
                .map_err(|e| ContractError::metadata_fetch(query, format!("invalid TOML: {e}"))),
        }
    }
}

impl MetadataStore for FileMetadataStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_sensor_map(&self) -> Result<Vec<SensorRow>, ContractError> {
        Ok(self.load("sensor_map").await?.sensors)
    }

    async fn fetch_feature_type_map(&self) -> Result<Vec<FeatureRow>, ContractError> {
        Ok(self.load("feature_type_map").await?.features)
    }
}
