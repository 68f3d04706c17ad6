//! Orchestrator - per-observation state machine
//!
//! ```text
//! VALIDATING ─ clean ──────────────────────────────► SPLITTING ─► DISPATCHED
//!     │                                                  ▲
//!     └─ miss ─► REFRESHING ─ ok ─► RECLASSIFIED ────────┘
//!                    │
//!                    └─ failed ─► dropped (nothing dispatched)
//! ```

use std::time::Instant;

use contracts::{MetadataStore, Observation, ObservationData};
use dispatcher::MetricsSnapshot;
use schema_cache::{MetadataCache, MetadataSnapshot};
use tracing::{debug, instrument, warn};

use crate::notifier::{AlertKind, NotificationDeduplicator};
use crate::outcome::{RouteClass, RouteOutcome};
use crate::router::{split, Router};
use crate::validator::{assess, Assessment};

/// Entry point: routes one observation at a time, many concurrently
pub struct Orchestrator<M> {
    cache: MetadataCache<M>,
    notifier: NotificationDeduplicator,
    router: Router,
}

impl<M: MetadataStore + Sync> Orchestrator<M> {
    pub fn new(cache: MetadataCache<M>, router: Router) -> Self {
        Self {
            cache,
            notifier: NotificationDeduplicator::new(),
            router,
        }
    }

    pub fn cache(&self) -> &MetadataCache<M> {
        &self.cache
    }

    pub fn notifier(&self) -> &NotificationDeduplicator {
        &self.notifier
    }

    /// Route one observation to completion.
    ///
    /// Never fails: a refresh failure drops the observation, every other
    /// problem degrades to a misfit record plus a deduplicated alert.
    #[instrument(
        name = "orchestrator_route",
        skip(self, observation),
        fields(sensor = %observation.sensor, node_id = %observation.node_id)
    )]
    pub async fn route(&self, mut observation: Observation) -> RouteOutcome {
        let started = Instant::now();
        let displaced = observation.normalize();

        let outcome = self.route_normalized(&observation, &displaced).await;

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_observation_routed(outcome.class.as_str());
        observability::record_misfit_keys(outcome.misfit_keys);
        observability::record_route_latency_ms(latency_ms);
        debug!(
            class = %outcome.class,
            feature_rows = outcome.feature_rows,
            misfit_keys = outcome.misfit_keys,
            latency_ms,
            "observation routed"
        );
        outcome
    }

    async fn route_normalized(
        &self,
        observation: &Observation,
        displaced: &ObservationData,
    ) -> RouteOutcome {
        // An empty start-up snapshot is always a miss
        let seen = self.cache.attempts();
        let cached = self.cache.lookup();
        if cached.is_loaded() {
            let assessment = assess(observation, &cached);
            if assessment.is_clean() {
                self.resolve(observation).await;
                return self
                    .split_and_dispatch(
                        observation,
                        displaced,
                        &cached,
                        &assessment,
                        RouteClass::Clean,
                    )
                    .await;
            }
        }

        let snapshot = match self.cache.refresh_since(seen).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    sensor = %observation.sensor,
                    node_id = %observation.node_id,
                    error = %e,
                    "metadata refresh failed, dropping observation"
                );
                return RouteOutcome::dropped();
            }
        };

        let assessment = assess(observation, &snapshot);
        let class = if !assessment.sensor_known {
            self.raise(observation, AlertKind::DoesNotExist).await;
            RouteClass::UnknownSensor
        } else if !assessment.is_clean() {
            let kind = AlertKind::InvalidKey {
                unknown_keys: assessment.invalid.iter().cloned().collect(),
                coercion_errors: assessment.coerced.errors.values().cloned().collect(),
            };
            self.raise(observation, kind).await;
            RouteClass::StillInvalid
        } else {
            self.resolve(observation).await;
            RouteClass::Resolved
        };

        self.split_and_dispatch(observation, displaced, &snapshot, &assessment, class)
            .await
    }

    async fn split_and_dispatch(
        &self,
        observation: &Observation,
        displaced: &ObservationData,
        snapshot: &MetadataSnapshot,
        assessment: &Assessment,
        class: RouteClass,
    ) -> RouteOutcome {
        let mut plan = split(observation, snapshot, &assessment.bad_keys());
        plan.add_displaced(observation, displaced);
        let misfit_keys = plan.misfit_keys.len();
        let feature_rows = self.router.dispatch(plan).await;
        RouteOutcome {
            class,
            feature_rows,
            misfit_keys,
        }
    }

    async fn raise(&self, observation: &Observation, kind: AlertKind) {
        if let Some(alert) = self.notifier.report_error(&observation.sensor, &kind) {
            self.router.send_alert(alert).await;
        }
    }

    async fn resolve(&self, observation: &Observation) {
        if let Some(alert) = self.notifier.report_resolve(&observation.sensor) {
            self.router.send_alert(alert).await;
        }
    }

    /// Drain every output; call once all routings have finished
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        self.router.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlertMessage, FeatureRow, PropertyType, SensorRow};
    use dispatcher::{Dispatcher, MemorySink};
    use schema_cache::InMemoryMetadataStore;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    fn htu21d(mapping: &[(&str, &str)]) -> SensorRow {
        SensorRow {
            name: "htu21d".into(),
            observed_properties: mapping
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn features() -> Vec<FeatureRow> {
        vec![
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
        ]
    }

    fn observation(data: Value) -> Observation {
        Observation {
            node_id: "00A".into(),
            meta_id: 23,
            datetime: "2016-08-05T00:00:08.246000".into(),
            sensor: "HTU21D".into(),
            network: "array_of_things_chicago".into(),
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }

    fn setup(store: &InMemoryMetadataStore) -> (Orchestrator<InMemoryMetadataStore>, MemorySink) {
        let sink = MemorySink::new("memory");
        let cache = MetadataCache::new(store.clone(), Duration::from_secs(1));
        let router = Router::new(Dispatcher::memory(&sink), "internal_data");
        (Orchestrator::new(cache, router), sink)
    }

    #[tokio::test]
    async fn test_first_observation_refreshes_then_fast_path() {
        let store = InMemoryMetadataStore::new(
            vec![htu21d(&[("Temp", "temperature.temperature")])],
            features(),
        );
        let (orchestrator, sink) = setup(&store);

        let first = orchestrator.route(observation(json!({ "Temp": 37.91 }))).await;
        assert_eq!(first.class, RouteClass::Resolved);
        let second = orchestrator.route(observation(json!({ "Temp": 37.5 }))).await;
        assert_eq!(second.class, RouteClass::Clean);
        assert_eq!(store.sensor_fetches(), 1);

        orchestrator.shutdown().await;
        assert_eq!(sink.feature_rows().len(), 2);
        assert_eq!(sink.feature_rows()[0].node_id, "00a");
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_case_colliding_key_lands_in_misfit() {
        let store = InMemoryMetadataStore::new(
            vec![htu21d(&[
                ("Temp", "temperature.temperature"),
                ("Humidity", "relative_humidity.humidity"),
            ])],
            features(),
        );
        let (orchestrator, sink) = setup(&store);

        let outcome = orchestrator
            .route(observation(json!({ "Temp": 1.0, "temp": 2.0, "Humidity": 3.0 })))
            .await;
        assert_eq!(outcome.class, RouteClass::Resolved);
        assert_eq!(outcome.feature_rows, 2);
        assert_eq!(outcome.misfit_keys, 1);

        orchestrator.shutdown().await;
        let rows = sink.feature_rows();
        let temperature = rows.iter().find(|r| r.feature == "temperature").unwrap();
        assert_eq!(temperature.values["temperature"], json!(2.0));
        let misfits = sink.misfit_rows();
        assert_eq!(misfits.len(), 1);
        assert_eq!(misfits[0].data.get("Temp"), Some(&json!(1.0)));
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_drops_observation() {
        let store = InMemoryMetadataStore::new(vec![], features());
        store.fail_with("metadata store down");
        let (orchestrator, sink) = setup(&store);

        let outcome = orchestrator.route(observation(json!({ "Temp": 37.91 }))).await;
        assert_eq!(outcome, RouteOutcome::dropped());

        orchestrator.shutdown().await;
        assert!(sink.feature_rows().is_empty());
        assert!(sink.misfit_rows().is_empty());
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_then_fixed_resolves_once() {
        let store = InMemoryMetadataStore::new(
            vec![htu21d(&[("Temp", "temperature.temperature")])],
            features(),
        );
        let (orchestrator, sink) = setup(&store);

        let obs = || observation(json!({ "Temp": 37.91, "Humidity": 27.48 }));
        assert_eq!(orchestrator.route(obs()).await.class, RouteClass::StillInvalid);
        assert_eq!(orchestrator.route(obs()).await.class, RouteClass::StillInvalid);
        assert!(orchestrator.notifier().is_blacklisted("htu21d"));

        store.set_sensors(vec![htu21d(&[
            ("Temp", "temperature.temperature"),
            ("Humidity", "relative_humidity.humidity"),
        ])]);
        assert_eq!(orchestrator.route(obs()).await.class, RouteClass::Resolved);
        assert_eq!(orchestrator.route(obs()).await.class, RouteClass::Clean);

        orchestrator.shutdown().await;
        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 2);
        assert!(matches!(alerts[0].message, AlertMessage::Problems(_)));
        assert_eq!(alerts[1].message, AlertMessage::Resolve);
        assert_eq!(sink.misfit_rows().len(), 2);
    }
}
