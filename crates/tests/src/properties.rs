//! Randomized and concurrent checks of the routing guarantees

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use contracts::SensorId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use router::{coerce, AlertKind, NotificationDeduplicator, RouteClass};
use schema_cache::MetadataSnapshot;
use serde_json::{json, Map, Value};
use tokio::task::JoinSet;

use crate::fixtures::{feature, harness, observation, sensor};

/// Keys equal their property names so feature columns map back to keys
fn columns_sensor() -> contracts::SensorRow {
    sensor(
        "tsys01",
        &[("a", "f1.a"), ("b", "f1.b"), ("c", "f2.c"), ("d", "f2.d")],
    )
}

fn columns_features() -> Vec<contracts::FeatureRow> {
    vec![
        feature("f1", &[("a", "float"), ("b", "integer")]),
        feature("f2", &[("c", "bool"), ("d", "string")]),
    ]
}

fn random_value(rng: &mut StdRng) -> Value {
    match rng.random_range(0..7) {
        0 => json!(rng.random_range(-100.0..100.0)),
        1 => json!(rng.random_range(-50..50)),
        2 => json!(rng.random_bool(0.5)),
        3 => json!("high"),
        4 => json!(format!("{}", rng.random_range(0..10))),
        5 => Value::Null,
        _ => json!([1, 2]),
    }
}

#[tokio::test]
async fn test_every_key_lands_exactly_once() {
    let h = harness(vec![columns_sensor()], columns_features());
    let mut rng = StdRng::seed_from_u64(7);
    let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for i in 0..200 {
        let mut data = Map::new();
        for key in ["a", "b", "c", "d", "e", "F"] {
            if rng.random_bool(0.7) {
                data.insert(key.to_string(), random_value(&mut rng));
            }
        }
        let sensor_name = if rng.random_bool(0.9) { "TSYS01" } else { "ghost" };
        let mut obs = observation(sensor_name, Value::Object(data));
        obs.node_id = format!("n{i:03}");

        expected.insert(
            obs.node_id.clone(),
            obs.data.keys().map(|k| k.to_lowercase()).collect(),
        );
        h.orchestrator.route(obs).await;
    }
    h.orchestrator.shutdown().await;

    let mut routed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for row in h.sink.feature_rows() {
        let keys = routed.entry(row.node_id.clone()).or_default();
        for column in row.values.keys() {
            assert!(keys.insert(column.clone()), "{column} routed twice");
        }
    }
    let mut misfit: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in h.sink.misfit_rows() {
        let previous = misfit.insert(record.node_id.clone(), record.data.keys().cloned().collect());
        assert!(previous.is_none(), "two misfit records for {}", record.node_id);
    }

    for (node, keys) in expected {
        let routed = routed.remove(&node).unwrap_or_default();
        let misfit = misfit.remove(&node).unwrap_or_default();
        assert!(routed.is_disjoint(&misfit), "{node}: {routed:?} / {misfit:?}");
        let union: BTreeSet<String> = routed.union(&misfit).cloned().collect();
        assert_eq!(union, keys, "{node}");
    }
}

/// Expected destination key of every original key: its lowercase form for
/// the key that survives normalization, the original key for displaced ones
fn expected_keys(data: &Map<String, Value>) -> BTreeSet<String> {
    let mut groups: BTreeMap<String, Vec<&String>> = BTreeMap::new();
    for key in data.keys() {
        groups.entry(key.to_lowercase()).or_default().push(key);
    }
    let mut expected = BTreeSet::new();
    for (lower, keys) in groups {
        let winner = if keys.iter().any(|k| **k == lower) {
            lower.clone()
        } else {
            keys.iter().max().map(|k| k.to_string()).unwrap_or_default()
        };
        for key in keys {
            if *key == winner {
                expected.insert(lower.clone());
            } else {
                expected.insert(key.clone());
            }
        }
    }
    expected
}

#[tokio::test]
async fn test_case_colliding_keys_are_not_lost() {
    let h = harness(vec![columns_sensor()], columns_features());
    let mut rng = StdRng::seed_from_u64(23);
    let mut expected: BTreeMap<String, (BTreeSet<String>, Map<String, Value>)> = BTreeMap::new();

    for i in 0..200 {
        let mut data = Map::new();
        for key in ["a", "A", "b", "B", "c", "C", "e", "E", "dD", "Dd"] {
            if rng.random_bool(0.5) {
                data.insert(key.to_string(), random_value(&mut rng));
            }
        }
        let mut obs = observation("tsys01", Value::Object(data));
        obs.node_id = format!("n{i:03}");
        expected.insert(obs.node_id.clone(), (expected_keys(&obs.data), obs.data.clone()));
        h.orchestrator.route(obs).await;
    }
    h.orchestrator.shutdown().await;

    let mut landed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in h.sink.feature_rows() {
        landed
            .entry(row.node_id.clone())
            .or_default()
            .extend(row.values.keys().cloned());
    }
    let mut misfits: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for record in h.sink.misfit_rows() {
        landed
            .entry(record.node_id.clone())
            .or_default()
            .extend(record.data.keys().cloned());
        misfits.insert(record.node_id.clone(), record.data.clone());
    }

    for (node, (keys, original)) in expected {
        let landed = landed.remove(&node).unwrap_or_default();
        let unique: BTreeSet<String> = landed.iter().cloned().collect();
        assert_eq!(unique.len(), landed.len(), "{node}: key landed twice");
        assert_eq!(unique, keys, "{node}");

        // Displaced values keep their original key and raw value
        let misfit = misfits.remove(&node).unwrap_or_default();
        for (key, value) in misfit {
            if key.chars().any(char::is_uppercase) {
                assert_eq!(original.get(&key), Some(&value), "{node}: {key}");
            }
        }
    }
}

#[test]
fn test_typed_values_coerce_unchanged() {
    let snapshot = MetadataSnapshot::new(
        1,
        contracts::SensorMap::from_rows([columns_sensor()]),
        contracts::TypeMap::from_rows(columns_features()),
    );
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..200 {
        let mut obs = observation(
            "tsys01",
            json!({
                "a": rng.random_range(-1000.0..1000.0),
                "b": rng.random_range(-1000..1000),
                "c": rng.random_bool(0.5),
                "d": format!("v{}", rng.random_range(0..100)),
            }),
        );
        obs.normalize();
        let coerced = coerce(&obs, &snapshot, &BTreeSet::new());
        assert!(coerced.errors.is_empty(), "{:?}", coerced.errors);
        assert_eq!(coerced.data, obs.data);
    }
}

#[test]
fn test_dedup_raise_resolve_cycle() {
    let dedup = NotificationDeduplicator::new();
    let sensor = SensorId::from("bmp180");

    assert!(dedup.report_error(&sensor, &AlertKind::DoesNotExist).is_some());
    let second = AlertKind::InvalidKey {
        unknown_keys: vec!["x".into()],
        coercion_errors: Vec::new(),
    };
    assert!(dedup.report_error(&sensor, &second).is_none());

    assert!(dedup.report_resolve(&sensor).is_some());
    assert!(!dedup.is_blacklisted("bmp180"));
    assert!(dedup.report_resolve(&sensor).is_none());

    // A new error after a resolve raises again
    assert!(dedup.report_error(&sensor, &second).is_some());
}

/// Two self-consistent metadata generations swapped while routing runs.
/// Mixing one's sensor map with the other's type map would leave `v`
/// undeclared and the observation invalid.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_maps_never_mix() {
    let generation_a = || {
        (
            vec![sensor("s1", &[("v", "alpha.v")])],
            vec![feature("alpha", &[("v", "float")])],
        )
    };
    let generation_b = || {
        (
            vec![sensor("s1", &[("v", "beta.v")])],
            vec![feature("beta", &[("v", "float")])],
        )
    };

    let (sensors, features) = generation_a();
    let h = harness(sensors, features);
    let store = h.store.clone();
    let sink = h.sink.clone();
    let orchestrator = Arc::new(h.orchestrator);

    let mut tasks = JoinSet::new();
    {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move {
            for i in 0..50 {
                let (sensors, features) = if i % 2 == 0 {
                    generation_b()
                } else {
                    generation_a()
                };
                store.replace(sensors, features);
                orchestrator.cache().refresh().await.unwrap();

                let snapshot = orchestrator.cache().lookup();
                let reference = snapshot.sensors().resolve("s1", "v").unwrap();
                assert!(snapshot.types().type_of(reference).is_some());
                tokio::task::yield_now().await;
            }
            None
        });
    }
    for i in 0..200 {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move {
            let outcome = orchestrator
                .route(observation("s1", json!({ "v": i as f64 })))
                .await;
            Some(outcome.class)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Some(class) = joined.unwrap() {
            assert!(
                matches!(class, RouteClass::Clean | RouteClass::Resolved),
                "{class:?}"
            );
        }
    }

    let Ok(orchestrator) = Arc::try_unwrap(orchestrator) else {
        panic!("tasks still running");
    };
    orchestrator.shutdown().await;
    assert_eq!(sink.feature_rows().len(), 200);
    assert!(sink.misfit_rows().is_empty());
    assert!(sink.alerts().is_empty());
}
