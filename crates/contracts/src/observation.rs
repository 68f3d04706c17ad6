//! Observation - one decoded stream record
//!
//! Raw sensor reading as delivered by the node network:
//!
//! ```json
//! { "node_id": "00A", "meta_id": 23, "datetime": "2016-08-05T00:00:08.246000",
//!   "sensor": "HTU21D", "network": "array_of_things_chicago",
//!   "data": { "Temp": 37.90, "Humidity": 27.48 } }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{ContractError, SensorId};

/// Key/value payload of an observation
pub type ObservationData = Map<String, Value>;

/// Single sensor observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Node that produced the reading
    pub node_id: String,

    /// Metadata version id reported by the node
    pub meta_id: i64,

    /// Reading timestamp, stored verbatim
    pub datetime: String,

    /// Sensor name
    pub sensor: SensorId,

    /// Owning network, prefix of every destination table
    pub network: String,

    /// Raw property key -> value
    #[serde(default)]
    pub data: ObservationData,
}

impl Observation {
    /// Decode an observation from JSON bytes
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ContractError> {
        serde_json::from_slice(bytes).map_err(|e| ContractError::PayloadParse {
            message: e.to_string(),
        })
    }

    /// Lowercase node id, sensor and every data key.
    ///
    /// When several keys collapse onto one lowercase key, a key already
    /// written in lowercase wins, otherwise the last in key order. The
    /// displaced entries are returned under their original key.
    pub fn normalize(&mut self) -> ObservationData {
        if self.node_id.chars().any(char::is_uppercase) {
            self.node_id = self.node_id.to_lowercase();
        }
        if !self.sensor.is_normalized() {
            self.sensor = SensorId::normalized(&self.sensor);
        }

        if self.data.keys().all(|k| !k.chars().any(char::is_uppercase)) {
            return Map::new();
        }

        let data = std::mem::take(&mut self.data);
        let mut winners: HashMap<String, String> = HashMap::with_capacity(data.len());
        for key in data.keys() {
            let lower = key.to_lowercase();
            let keep_current = winners.get(&lower).is_some_and(|current| *current == lower);
            if !keep_current {
                winners.insert(lower, key.clone());
            }
        }

        let mut displaced = Map::new();
        for (key, value) in data {
            let lower = key.to_lowercase();
            if winners.get(&lower) == Some(&key) {
                self.data.insert(lower, value);
            } else {
                displaced.insert(key, value);
            }
        }

        if !displaced.is_empty() {
            warn!(
                sensor = %self.sensor,
                node_id = %self.node_id,
                keys = ?displaced.keys().collect::<Vec<_>>(),
                "data keys collided after case normalization"
            );
        }
        displaced
    }

    /// Copy of this observation carrying a different payload
    pub fn with_data(&self, data: ObservationData) -> Self {
        Self {
            node_id: self.node_id.clone(),
            meta_id: self.meta_id,
            datetime: self.datetime.clone(),
            sensor: self.sensor.clone(),
            network: self.network.clone(),
            data,
        }
    }
}
