//! End-to-end routing scenarios over an in-memory store and sink

use std::sync::Arc;
use std::time::Duration;

use contracts::{AlertMessage, Alert};
use dispatcher::{Dispatcher, MemorySink};
use router::{Orchestrator, RouteClass, Router};
use schema_cache::{InMemoryMetadataStore, MetadataCache};
use serde_json::json;
use tokio::task::JoinSet;

use crate::fixtures::{feature, harness, htu21d, observation, sensor, weather_features, Harness};

fn problems(alert: &Alert) -> &[String] {
    match &alert.message {
        AlertMessage::Problems(lines) => lines,
        AlertMessage::Resolve => panic!("expected a problem alert for {}", alert.sensor),
    }
}

#[tokio::test]
async fn test_known_sensor_routes_every_feature() {
    let Harness {
        sink, orchestrator, ..
    } = harness(vec![htu21d()], weather_features());

    let outcome = orchestrator
        .route(observation("HTU21D", json!({ "Temp": 37.91, "Humidity": 27.48 })))
        .await;
    assert_eq!(outcome.feature_rows, 2);
    assert_eq!(outcome.misfit_keys, 0);

    orchestrator.shutdown().await;
    let rows = sink.feature_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].table(), "array_of_things_chicago__relative_humidity");
    assert_eq!(rows[0].values["humidity"], json!(27.48));
    assert_eq!(rows[1].table(), "array_of_things_chicago__temperature");
    assert_eq!(rows[1].values["temperature"], json!(37.91));

    let publications = sink.publications();
    assert_eq!(publications.len(), 2);
    assert!(publications.iter().all(|p| p.topic == "internal_data"));
    assert_eq!(publications[1].payload.feature, "temperature");
    assert_eq!(publications[1].payload.node, "00a");

    assert!(sink.misfit_rows().is_empty());
    assert!(sink.alerts().is_empty());
}

#[tokio::test]
async fn test_unknown_keys_go_to_misfit_and_alert_once() {
    let Harness {
        sink, orchestrator, ..
    } = harness(vec![htu21d()], weather_features());

    let obs = || {
        observation(
            "htu21d",
            json!({ "Temp": 37.91, "Humidity": 27.48, "x1": 1, "X2": "a" }),
        )
    };
    for _ in 0..3 {
        let outcome = orchestrator.route(obs()).await;
        assert_eq!(outcome.class, RouteClass::StillInvalid);
        assert_eq!(outcome.feature_rows, 2);
        assert_eq!(outcome.misfit_keys, 2);
    }

    orchestrator.shutdown().await;
    assert_eq!(sink.feature_rows().len(), 6);
    let misfits = sink.misfit_rows();
    assert_eq!(misfits.len(), 3);
    assert_eq!(misfits[0].table(), "array_of_things_chicago__unknown_feature");
    assert_eq!(misfits[0].data.get("x1"), Some(&json!(1)));
    assert_eq!(misfits[0].data.get("x2"), Some(&json!("a")));

    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        problems(&alerts[0]),
        ["Received data from sensor htu21d with unknown key(s) x1,x2. \
          Please update the keys and properties in this sensors metadata."]
    );
}

#[tokio::test]
async fn test_unknown_sensor_is_entirely_misfit() {
    let Harness {
        sink, orchestrator, ..
    } = harness(vec![htu21d()], weather_features());

    for _ in 0..2 {
        let outcome = orchestrator
            .route(observation("WUBDB89", json!({ "Temp": 37.91, "Humidity": 27.48 })))
            .await;
        assert_eq!(outcome.class, RouteClass::UnknownSensor);
        assert_eq!(outcome.feature_rows, 0);
    }

    orchestrator.shutdown().await;
    assert!(sink.feature_rows().is_empty());
    assert!(sink.publications().is_empty());
    let misfits = sink.misfit_rows();
    assert_eq!(misfits.len(), 2);
    assert_eq!(misfits[0].data.len(), 2);
    assert_eq!(misfits[0].sensor.as_str(), "wubdb89");

    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        problems(&alerts[0]),
        ["Sensor wubdb89 not found in sensor metadata. Please add this sensor."]
    );
}

#[tokio::test]
async fn test_coercion_failure_routes_key_to_misfit() {
    let Harness {
        sink, orchestrator, ..
    } = harness(vec![htu21d()], weather_features());

    let outcome = orchestrator
        .route(observation("htu21d", json!({ "Temp": "high", "Humidity": "27.48" })))
        .await;
    assert_eq!(outcome.class, RouteClass::StillInvalid);
    assert_eq!(outcome.feature_rows, 1);

    orchestrator.shutdown().await;
    let rows = sink.feature_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["humidity"], json!(27.48));
    assert_eq!(sink.misfit_rows()[0].data.get("temp"), Some(&json!("high")));

    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        problems(&alerts[0]),
        ["Property temperature expected type FLOAT and could not coerce value \
          high of type string"]
    );
}

#[tokio::test]
async fn test_metadata_fix_resolves_exactly_once() {
    let Harness {
        store,
        sink,
        orchestrator,
    } = harness(vec![htu21d()], weather_features());

    let obs = || observation("htu21d", json!({ "Temp": "high", "Humidity": 27.48, "x1": 4 }));
    assert_eq!(orchestrator.route(obs()).await.class, RouteClass::StillInvalid);

    // Metadata updated externally
    store.replace(
        vec![sensor(
            "htu21d",
            &[
                ("Temp", "temperature.temperature"),
                ("Humidity", "relative_humidity.humidity"),
                ("x1", "relative_humidity.x1"),
            ],
        )],
        vec![
            feature("temperature", &[("temperature", "string")]),
            feature("relative_humidity", &[("humidity", "float"), ("x1", "integer")]),
        ],
    );

    assert_eq!(orchestrator.route(obs()).await.class, RouteClass::Resolved);
    assert_eq!(orchestrator.route(obs()).await.class, RouteClass::Clean);
    assert_eq!(orchestrator.route(obs()).await.class, RouteClass::Clean);
    assert!(!orchestrator.notifier().is_blacklisted("htu21d"));

    orchestrator.shutdown().await;
    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(problems(&alerts[0]).len(), 2);
    assert_eq!(alerts[1].message, AlertMessage::Resolve);
    assert_eq!(sink.misfit_rows().len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_routes_share_one_refresh() {
    let Harness {
        store,
        sink,
        orchestrator,
    } = harness(vec![htu21d()], weather_features());
    store.set_latency(Duration::from_millis(50));
    let orchestrator = Arc::new(orchestrator);

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move {
            orchestrator
                .route(observation("htu21d", json!({ "Temp": 20.0 })))
                .await
        });
    }
    while let Some(outcome) = tasks.join_next().await {
        let outcome = outcome.unwrap();
        assert!(
            matches!(outcome.class, RouteClass::Resolved | RouteClass::Clean),
            "{:?}",
            outcome.class
        );
    }
    assert_eq!(store.sensor_fetches(), 1);

    let Ok(orchestrator) = Arc::try_unwrap(orchestrator) else {
        panic!("tasks still running");
    };
    orchestrator.shutdown().await;
    assert_eq!(sink.feature_rows().len(), 8);
}

#[tokio::test]
async fn test_concurrent_errors_raise_one_alert() {
    let Harness {
        sink, orchestrator, ..
    } = harness(vec![htu21d()], weather_features());
    let orchestrator = Arc::new(orchestrator);

    let mut tasks = JoinSet::new();
    for i in 0..16 {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move {
            orchestrator
                .route(observation("htu21d", json!({ "Temp": i, "bogus": i })))
                .await
        });
    }
    while let Some(outcome) = tasks.join_next().await {
        assert_eq!(outcome.unwrap().class, RouteClass::StillInvalid);
    }

    let Ok(orchestrator) = Arc::try_unwrap(orchestrator) else {
        panic!("tasks still running");
    };
    orchestrator.shutdown().await;
    assert_eq!(sink.alerts().len(), 1);
    assert_eq!(sink.misfit_rows().len(), 16);
}

#[tokio::test]
async fn test_failed_refresh_keeps_stale_snapshot() {
    let Harness {
        store,
        sink,
        orchestrator,
    } = harness(vec![htu21d()], weather_features());

    let clean = || observation("htu21d", json!({ "Temp": 20.0 }));
    assert_eq!(orchestrator.route(clean()).await.class, RouteClass::Resolved);
    assert_eq!(orchestrator.cache().lookup().generation(), 1);

    store.fail_with("connection refused");
    let outcome = orchestrator
        .route(observation("htu21d", json!({ "Temp": 20.0, "extra": 1 })))
        .await;
    assert_eq!(outcome.class, RouteClass::Dropped);

    // Clean observations keep flowing against the stale snapshot
    assert_eq!(orchestrator.route(clean()).await.class, RouteClass::Clean);
    assert_eq!(orchestrator.cache().lookup().generation(), 1);

    store.clear_failure();
    let outcome = orchestrator
        .route(observation("htu21d", json!({ "Temp": 20.0, "extra": 1 })))
        .await;
    assert_eq!(outcome.class, RouteClass::StillInvalid);
    assert_eq!(orchestrator.cache().lookup().generation(), 2);

    orchestrator.shutdown().await;
    assert_eq!(sink.feature_rows().len(), 3);
    assert_eq!(sink.misfit_rows().len(), 1);
    assert_eq!(sink.alerts().len(), 1);
}

#[tokio::test]
async fn test_slow_store_times_out_and_drops() {
    let store = InMemoryMetadataStore::new(vec![htu21d()], weather_features());
    store.set_latency(Duration::from_millis(500));
    let sink = MemorySink::new("memory");
    let cache = MetadataCache::new(store.clone(), Duration::from_millis(20));
    let orchestrator = Orchestrator::new(
        cache,
        Router::new(Dispatcher::memory(&sink), "internal_data"),
    );

    let outcome = orchestrator
        .route(observation("htu21d", json!({ "Temp": 20.0 })))
        .await;
    assert_eq!(outcome.class, RouteClass::Dropped);
    assert!(!orchestrator.cache().lookup().is_loaded());

    orchestrator.shutdown().await;
    assert!(sink.feature_rows().is_empty());
    assert!(sink.misfit_rows().is_empty());
}

#[tokio::test]
async fn test_json_lines_stream_routes_each_record() {
    use ingestion::{decode_or_skip, CheckpointTracker, ReaderConfig, RecordReader};

    let Harness {
        sink, orchestrator, ..
    } = harness(vec![htu21d()], weather_features());

    let input: &'static [u8] = br#"{"node_id":"00A","meta_id":1,"datetime":"t1","sensor":"HTU21D","network":"array_of_things_chicago","data":{"Temp":1.5}}

not json
{"node_id":"00B","meta_id":2,"datetime":"t2","sensor":"HTU21D","network":"array_of_things_chicago","data":{"Humidity":"40"}}
"#;
    let reader = RecordReader::new(ReaderConfig::default());
    let stream = reader.spawn("inline", input);
    let metrics = reader.metrics();

    let mut tracker = CheckpointTracker::new();
    while let Ok(record) = stream.records.recv().await {
        if let Some(observation) = decode_or_skip(&record, &metrics) {
            orchestrator.route(observation).await;
        }
        tracker.complete(record.sequence);
    }
    assert_eq!(stream.task.await.unwrap().unwrap(), 3);
    assert_eq!(tracker.watermark(), 3);
    assert_eq!(metrics.snapshot().records_malformed, 1);

    orchestrator.shutdown().await;
    let rows = sink.feature_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].node_id, "00b");
    assert_eq!(rows[1].values["humidity"], json!(40.0));
}
