//! MapperBlueprint - Config Loader output
//!
//! Describes where metadata comes from, how the router runs and where each
//! of its four outputs goes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete mapper configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MapperBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Metadata store settings
    #[validate(nested)]
    pub metadata: MetadataConfig,

    /// Router settings
    #[serde(default)]
    #[validate(nested)]
    pub router: RouterConfig,

    /// Feature and misfit table output
    #[validate(nested)]
    pub storage: OutputConfig,

    /// Pub/sub output
    #[validate(nested)]
    pub publisher: OutputConfig,

    /// Alert feed output
    #[validate(nested)]
    pub alerts: OutputConfig,
}

impl MapperBlueprint {
    /// All outputs with their role name
    pub fn outputs(&self) -> [(&'static str, &OutputConfig); 3] {
        [
            ("storage", &self.storage),
            ("publisher", &self.publisher),
            ("alerts", &self.alerts),
        ]
    }
}

/// Metadata store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetadataConfig {
    /// Metadata document path
    #[validate(length(min = 1))]
    pub path: String,

    /// Timeout for one refresh (both queries)
    #[serde(default = "default_fetch_timeout_ms")]
    #[validate(range(min = 1))]
    pub fetch_timeout_ms: u64,
}

impl MetadataConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_fetch_timeout_ms() -> u64 {
    5000
}

/// Router settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouterConfig {
    /// Observations routed concurrently
    #[serde(default = "default_max_in_flight")]
    #[validate(range(min = 1))]
    pub max_in_flight: usize,

    /// Topic of published results
    #[serde(default = "default_publish_topic")]
    #[validate(length(min = 1))]
    pub publish_topic: String,

    /// Log the checkpoint watermark every N records
    #[serde(default = "default_checkpoint_every")]
    #[validate(range(min = 1))]
    pub checkpoint_every: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            publish_topic: default_publish_topic(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

fn default_max_in_flight() -> usize {
    16
}

fn default_publish_topic() -> String {
    "internal_data".to_string()
}

fn default_checkpoint_every() -> u64 {
    100
}

/// One output (sink, publisher or alert transport)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutputConfig {
    /// Output name
    #[validate(length(min = 1))]
    pub name: String,

    /// Output type
    pub kind: OutputKind,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Behavior when the queue is full
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    256
}

/// Output type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Tracing output
    Log,
    /// JSON lines files
    File,
    /// UDP datagrams
    Network,
    /// In-process recording
    Memory,
}

/// Queue-full behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for queue space
    #[default]
    Block,
    /// Drop the new item
    DropNewest,
}
