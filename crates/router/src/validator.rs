//! Key validation and the combined validate + coerce pass

use std::collections::BTreeSet;

use contracts::{Observation, SensorMap};
use schema_cache::MetadataSnapshot;

use crate::coercer::{coerce, Coerced};

/// Keys of `observation` that the sensor map cannot resolve.
///
/// Every key is invalid when the sensor itself is unknown.
pub fn invalid_keys(observation: &Observation, sensors: &SensorMap) -> BTreeSet<String> {
    match sensors.sensor(&observation.sensor) {
        None => observation.data.keys().cloned().collect(),
        Some(mapping) => observation
            .data
            .keys()
            .filter(|key| !mapping.contains_key(key.as_str()))
            .cloned()
            .collect(),
    }
}

/// Result of validating and coercing one observation against one snapshot
#[derive(Debug, Clone)]
pub struct Assessment {
    pub sensor_known: bool,
    pub invalid: BTreeSet<String>,
    pub coerced: Coerced,
}

impl Assessment {
    /// Known sensor, every key mapped, every value coercible
    pub fn is_clean(&self) -> bool {
        self.sensor_known && self.invalid.is_empty() && self.coerced.errors.is_empty()
    }

    /// Unknown keys plus keys whose value failed coercion
    pub fn bad_keys(&self) -> BTreeSet<String> {
        self.invalid
            .iter()
            .chain(self.coerced.errors.keys())
            .cloned()
            .collect()
    }
}

/// Validate then coerce, both against the same snapshot
pub fn assess(observation: &Observation, snapshot: &MetadataSnapshot) -> Assessment {
    let invalid = invalid_keys(observation, snapshot.sensors());
    let coerced = coerce(observation, snapshot, &invalid);
    Assessment {
        sensor_known: snapshot.sensors().contains_sensor(&observation.sensor),
        invalid,
        coerced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FeatureRow, PropertyType, SensorRow, TypeMap};
    use serde_json::json;
    use std::collections::HashMap;

    fn snapshot() -> MetadataSnapshot {
        MetadataSnapshot::new(
            1,
            SensorMap::from_rows([SensorRow {
                name: "htu21d".into(),
                observed_properties: HashMap::from([
                    ("temp".into(), "temperature.temperature".into()),
                    ("humidity".into(), "relative_humidity.humidity".into()),
                ]),
            }]),
            TypeMap::from_rows([
                FeatureRow {
                    name: "temperature".into(),
                    observed_properties: vec![PropertyType {
                        name: "temperature".into(),
                        type_name: "float".into(),
                    }],
                },
                FeatureRow {
                    name: "relative_humidity".into(),
                    observed_properties: vec![PropertyType {
                        name: "humidity".into(),
                        type_name: "float".into(),
                    }],
                },
            ]),
        )
    }

    fn observation(sensor: &str, data: serde_json::Value) -> Observation {
        Observation {
            node_id: "00a".into(),
            meta_id: 23,
            datetime: "2016-08-05T00:00:08.246000".into(),
            sensor: sensor.into(),
            network: "array_of_things_chicago".into(),
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_unknown_sensor_invalidates_every_key() {
        let obs = observation("wubdb89", json!({ "temp": 1.0, "x": 2 }));
        let invalid = invalid_keys(&obs, snapshot().sensors());
        assert_eq!(invalid.len(), 2);
    }

    #[test]
    fn test_unmapped_key_is_invalid() {
        let obs = observation("htu21d", json!({ "temp": 37.91, "x1": 2 }));
        let invalid = invalid_keys(&obs, snapshot().sensors());
        assert_eq!(invalid.into_iter().collect::<Vec<_>>(), vec!["x1"]);
    }

    #[test]
    fn test_assess_clean_and_bad_keys() {
        let snapshot = snapshot();
        let clean = assess(
            &observation("htu21d", json!({ "temp": 37.91, "humidity": 27.48 })),
            &snapshot,
        );
        assert!(clean.is_clean());

        let dirty = assess(
            &observation("htu21d", json!({ "temp": "high", "humidity": 27.48, "x1": 1 })),
            &snapshot,
        );
        assert!(!dirty.is_clean());
        assert_eq!(
            dirty.bad_keys().into_iter().collect::<Vec<_>>(),
            vec!["temp", "x1"]
        );
    }

    #[test]
    fn test_unknown_sensor_without_data_is_not_clean() {
        let a = assess(&observation("wubdb89", json!({})), &snapshot());
        assert!(a.invalid.is_empty());
        assert!(!a.is_clean());
    }
}
