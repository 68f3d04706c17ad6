//! Records handed to collaborators
//!
//! Everything the router produces for the outside world: feature rows,
//! misfit rows, publications and alerts.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{ObservationData, SensorId};

/// Reserved alert value meaning "previous error for this sensor is cleared"
pub const RESOLVE_SENTINEL: &str = "resolve";

/// Suffix of the per-network misfit table
pub const MISFIT_TABLE: &str = "unknown_feature";

/// Destination table of a feature
pub fn feature_table(network: &str, feature: &str) -> String {
    format!("{network}__{feature}")
}

/// Destination table of the misfits of a network
pub fn misfit_table(network: &str) -> String {
    feature_table(network, MISFIT_TABLE)
}

/// One logical row of a feature table, keyed by (node_id, datetime)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInsert {
    pub network: String,
    pub feature: String,
    pub node_id: String,
    pub datetime: String,
    pub meta_id: i64,
    pub sensor: SensorId,
    /// Property -> coerced value
    pub values: Map<String, Value>,
}

impl FeatureInsert {
    pub fn table(&self) -> String {
        feature_table(&self.network, &self.feature)
    }

    /// Normalized form emitted to the publisher
    pub fn to_published(&self) -> PublishedResult {
        PublishedResult {
            feature: self.feature.clone(),
            node: self.node_id.clone(),
            sensor: self.sensor.clone(),
            network: self.network.clone(),
            datetime: self.datetime.clone(),
            results: self.values.clone(),
        }
    }
}

/// The subset of an observation that could not be routed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisfitRecord {
    pub network: String,
    pub node_id: String,
    pub datetime: String,
    pub meta_id: i64,
    pub sensor: SensorId,
    /// Raw key -> value exactly as received
    pub data: ObservationData,
}

impl MisfitRecord {
    pub fn table(&self) -> String {
        misfit_table(&self.network)
    }

    /// Opaque blob stored in the misfit table
    pub fn data_blob(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }
}

/// Normalized per-feature result object emitted to pub/sub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedResult {
    pub feature: String,
    pub node: String,
    pub sensor: SensorId,
    pub network: String,
    pub datetime: String,
    pub results: Map<String, Value>,
}

/// A published result bound to its topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub topic: String,
    pub payload: PublishedResult,
}

/// Alert body: either the resolve sentinel or problem descriptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertMessage {
    Resolve,
    Problems(Vec<String>),
}

impl AlertMessage {
    pub fn is_resolve(&self) -> bool {
        matches!(self, Self::Resolve)
    }
}

impl Serialize for AlertMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Resolve => serializer.serialize_str(RESOLVE_SENTINEL),
            Self::Problems(problems) => problems.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AlertMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) if s == RESOLVE_SENTINEL => Ok(Self::Resolve),
            Value::String(s) => Ok(Self::Problems(vec![s])),
            other => Vec::<String>::deserialize(other)
                .map(Self::Problems)
                .map_err(D::Error::custom),
        }
    }
}

/// Alert posted to the alert feed, wire body `{ "name": .., "value": .. }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "name")]
    pub sensor: SensorId,
    #[serde(rename = "value")]
    pub message: AlertMessage,
}
