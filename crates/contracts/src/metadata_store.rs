//! MetadataStore trait - source of the sensor and feature metadata
//!
//! Query execution, pooling and retries belong to the implementation; the
//! cache only ever asks for full row sets.

use crate::{ContractError, FeatureRow, SensorRow};

/// Metadata store interface
#[trait_variant::make(MetadataStore: Send)]
pub trait LocalMetadataStore {
    /// Store name (used for logging)
    fn name(&self) -> &str;

    /// All sensor rows
    async fn fetch_sensor_map(&self) -> Result<Vec<SensorRow>, ContractError>;

    /// All feature-of-interest rows
    async fn fetch_feature_type_map(&self) -> Result<Vec<FeatureRow>, ContractError>;
}
