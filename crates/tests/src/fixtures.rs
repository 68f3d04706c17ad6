//! Shared metadata rows, observations and orchestrator wiring

use std::collections::HashMap;
use std::time::Duration;

use contracts::{FeatureRow, Observation, PropertyType, SensorRow};
use dispatcher::{Dispatcher, MemorySink};
use router::{Orchestrator, Router};
use schema_cache::{InMemoryMetadataStore, MetadataCache};
use serde_json::Value;

pub fn sensor(name: &str, mapping: &[(&str, &str)]) -> SensorRow {
    SensorRow {
        name: name.into(),
        observed_properties: mapping
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    }
}

pub fn feature(name: &str, properties: &[(&str, &str)]) -> FeatureRow {
    FeatureRow {
        name: name.into(),
        observed_properties: properties
            .iter()
            .map(|(p, t)| PropertyType {
                name: p.to_string(),
                type_name: t.to_string(),
            })
            .collect(),
    }
}

pub fn htu21d() -> SensorRow {
    sensor(
        "htu21d",
        &[
            ("Temp", "temperature.temperature"),
            ("Humidity", "relative_humidity.humidity"),
        ],
    )
}

pub fn weather_features() -> Vec<FeatureRow> {
    vec![
        feature("temperature", &[("temperature", "float")]),
        feature("relative_humidity", &[("humidity", "float")]),
    ]
}

pub fn observation(sensor: &str, data: Value) -> Observation {
    Observation {
        node_id: "00A".into(),
        meta_id: 23,
        datetime: "2016-08-05T00:00:08.246000".into(),
        sensor: sensor.into(),
        network: "array_of_things_chicago".into(),
        data: data.as_object().cloned().unwrap_or_default(),
    }
}

pub struct Harness {
    pub store: InMemoryMetadataStore,
    pub sink: MemorySink,
    pub orchestrator: Orchestrator<InMemoryMetadataStore>,
}

pub fn harness(sensors: Vec<SensorRow>, features: Vec<FeatureRow>) -> Harness {
    let store = InMemoryMetadataStore::new(sensors, features);
    let sink = MemorySink::new("memory");
    let cache = MetadataCache::new(store.clone(), Duration::from_secs(2));
    let router = Router::new(Dispatcher::memory(&sink), "internal_data");
    Harness {
        store,
        sink,
        orchestrator: Orchestrator::new(cache, router),
    }
}
