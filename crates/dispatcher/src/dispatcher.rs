//! Dispatcher - one output handle per collaborator

use contracts::{
    Alert, FeatureInsert, MapperBlueprint, MisfitRecord, OutputConfig, OutputKind, OverflowPolicy,
    Publication,
};
use tracing::{info, instrument};

use crate::error::DispatcherError;
use crate::handle::OutputHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, MemorySink, NetworkSink};

/// Queue capacity used by [`Dispatcher::memory`]
const MEMORY_QUEUE_CAPACITY: usize = 1024;

/// The four collaborator outputs of the router
pub struct Dispatcher {
    features: OutputHandle<FeatureInsert>,
    misfits: OutputHandle<MisfitRecord>,
    publications: OutputHandle<Publication>,
    alerts: OutputHandle<Alert>,
}

impl Dispatcher {
    /// Create a dispatcher from already spawned handles
    pub fn with_handles(
        features: OutputHandle<FeatureInsert>,
        misfits: OutputHandle<MisfitRecord>,
        publications: OutputHandle<Publication>,
        alerts: OutputHandle<Alert>,
    ) -> Self {
        Self {
            features,
            misfits,
            publications,
            alerts,
        }
    }

    /// Every role backed by clones of one [`MemorySink`]
    pub fn memory(sink: &MemorySink) -> Self {
        let policy = OverflowPolicy::Block;
        Self::with_handles(
            OutputHandle::features(sink.clone(), MEMORY_QUEUE_CAPACITY, policy),
            OutputHandle::misfits(sink.clone(), MEMORY_QUEUE_CAPACITY, policy),
            OutputHandle::publisher(sink.clone(), MEMORY_QUEUE_CAPACITY, policy),
            OutputHandle::alerts(sink.clone(), MEMORY_QUEUE_CAPACITY, policy),
        )
    }

    /// Build every output described by the blueprint.
    ///
    /// The storage output backs both the feature and misfit handles.
    #[instrument(name = "dispatcher_from_blueprint", skip(blueprint))]
    pub async fn from_blueprint(blueprint: &MapperBlueprint) -> Result<Self, DispatcherError> {
        let storage = &blueprint.storage;
        let features = create_feature_handle(storage)?;
        let misfits = create_misfit_handle(storage)?;
        let publications = create_publisher_handle(&blueprint.publisher).await?;
        let alerts = create_alert_handle(&blueprint.alerts).await?;

        info!(
            storage = %storage.name,
            publisher = %blueprint.publisher.name,
            alerts = %blueprint.alerts.name,
            "Dispatcher started"
        );

        Ok(Self::with_handles(features, misfits, publications, alerts))
    }

    pub async fn insert_feature(&self, row: FeatureInsert) -> bool {
        self.features.send(row).await
    }

    pub async fn insert_misfit(&self, record: MisfitRecord) -> bool {
        self.misfits.send(record).await
    }

    pub async fn publish(&self, publication: Publication) -> bool {
        self.publications.send(publication).await
    }

    pub async fn alert(&self, alert: Alert) -> bool {
        self.alerts.send(alert).await
    }

    /// Counters of every handle, keyed by role and output name
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        vec![
            role_metrics("features", self.features.name(), self.features.metrics().snapshot()),
            role_metrics("misfits", self.misfits.name(), self.misfits.metrics().snapshot()),
            role_metrics(
                "publisher",
                self.publications.name(),
                self.publications.metrics().snapshot(),
            ),
            role_metrics("alerts", self.alerts.name(), self.alerts.metrics().snapshot()),
        ]
    }

    /// Drain and close every handle, returning the final counters
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        let counters = [
            ("features", self.features.name().to_string(), self.features.metrics().clone()),
            ("misfits", self.misfits.name().to_string(), self.misfits.metrics().clone()),
            (
                "publisher",
                self.publications.name().to_string(),
                self.publications.metrics().clone(),
            ),
            ("alerts", self.alerts.name().to_string(), self.alerts.metrics().clone()),
        ];

        self.features.shutdown().await;
        self.misfits.shutdown().await;
        self.publications.shutdown().await;
        self.alerts.shutdown().await;
        info!("Dispatcher shutdown complete");

        counters
            .into_iter()
            .map(|(role, name, metrics)| role_metrics(role, &name, metrics.snapshot()))
            .collect()
    }
}

fn role_metrics(role: &str, name: &str, snapshot: MetricsSnapshot) -> (String, MetricsSnapshot) {
    (format!("{role}:{name}"), snapshot)
}

fn kind_name(kind: OutputKind) -> String {
    format!("{kind:?}").to_lowercase()
}

fn creation_error(config: &OutputConfig, e: impl ToString) -> DispatcherError {
    DispatcherError::sink_creation(&config.name, e.to_string())
}

#[instrument(
    name = "dispatcher_create_feature_handle",
    skip(config),
    fields(sink = %config.name, kind = ?config.kind)
)]
fn create_feature_handle(
    config: &OutputConfig,
) -> Result<OutputHandle<FeatureInsert>, DispatcherError> {
    let (capacity, overflow) = (config.queue_capacity, config.overflow);
    match config.kind {
        OutputKind::Log => Ok(OutputHandle::features(
            LogSink::new(&config.name),
            capacity,
            overflow,
        )),
        OutputKind::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| creation_error(config, e))?;
            Ok(OutputHandle::features(sink, capacity, overflow))
        }
        OutputKind::Memory => Ok(OutputHandle::features(
            MemorySink::new(&config.name),
            capacity,
            overflow,
        )),
        OutputKind::Network => Err(DispatcherError::UnsupportedRole {
            name: config.name.clone(),
            kind: kind_name(config.kind),
            role: "feature sink",
        }),
    }
}

fn create_misfit_handle(
    config: &OutputConfig,
) -> Result<OutputHandle<MisfitRecord>, DispatcherError> {
    let (capacity, overflow) = (config.queue_capacity, config.overflow);
    match config.kind {
        OutputKind::Log => Ok(OutputHandle::misfits(
            LogSink::new(&config.name),
            capacity,
            overflow,
        )),
        OutputKind::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| creation_error(config, e))?;
            Ok(OutputHandle::misfits(sink, capacity, overflow))
        }
        OutputKind::Memory => Ok(OutputHandle::misfits(
            MemorySink::new(&config.name),
            capacity,
            overflow,
        )),
        OutputKind::Network => Err(DispatcherError::UnsupportedRole {
            name: config.name.clone(),
            kind: kind_name(config.kind),
            role: "misfit sink",
        }),
    }
}

#[instrument(
    name = "dispatcher_create_publisher_handle",
    skip(config),
    fields(sink = %config.name, kind = ?config.kind)
)]
async fn create_publisher_handle(
    config: &OutputConfig,
) -> Result<OutputHandle<Publication>, DispatcherError> {
    let (capacity, overflow) = (config.queue_capacity, config.overflow);
    match config.kind {
        OutputKind::Log => Ok(OutputHandle::publisher(
            LogSink::new(&config.name),
            capacity,
            overflow,
        )),
        OutputKind::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| creation_error(config, e))?;
            Ok(OutputHandle::publisher(sink, capacity, overflow))
        }
        OutputKind::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| creation_error(config, e))?;
            Ok(OutputHandle::publisher(sink, capacity, overflow))
        }
        OutputKind::Memory => Ok(OutputHandle::publisher(
            MemorySink::new(&config.name),
            capacity,
            overflow,
        )),
    }
}

#[instrument(
    name = "dispatcher_create_alert_handle",
    skip(config),
    fields(sink = %config.name, kind = ?config.kind)
)]
async fn create_alert_handle(config: &OutputConfig) -> Result<OutputHandle<Alert>, DispatcherError> {
    let (capacity, overflow) = (config.queue_capacity, config.overflow);
    match config.kind {
        OutputKind::Log => Ok(OutputHandle::alerts(
            LogSink::new(&config.name),
            capacity,
            overflow,
        )),
        OutputKind::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| creation_error(config, e))?;
            Ok(OutputHandle::alerts(sink, capacity, overflow))
        }
        OutputKind::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| creation_error(config, e))?;
            Ok(OutputHandle::alerts(sink, capacity, overflow))
        }
        OutputKind::Memory => Ok(OutputHandle::alerts(
            MemorySink::new(&config.name),
            capacity,
            overflow,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlertMessage, ConfigVersion, MetadataConfig, RouterConfig};
    use serde_json::{json, Map};
    use std::collections::HashMap;

    fn output(name: &str, kind: OutputKind, params: HashMap<String, String>) -> OutputConfig {
        OutputConfig {
            name: name.into(),
            kind,
            queue_capacity: 16,
            overflow: OverflowPolicy::Block,
            params,
        }
    }

    fn blueprint(storage: OutputConfig) -> MapperBlueprint {
        MapperBlueprint {
            version: ConfigVersion::V1,
            metadata: MetadataConfig {
                path: "metadata.json".into(),
                fetch_timeout_ms: 100,
            },
            router: RouterConfig::default(),
            storage,
            publisher: output("socket", OutputKind::Log, HashMap::new()),
            alerts: output("apiary", OutputKind::Log, HashMap::new()),
        }
    }

    fn row() -> FeatureInsert {
        FeatureInsert {
            network: "n".into(),
            feature: "temperature".into(),
            node_id: "00a".into(),
            datetime: "t".into(),
            meta_id: 1,
            sensor: "htu21d".into(),
            values: Map::from_iter([("temperature".to_string(), json!(1.0))]),
        }
    }

    #[tokio::test]
    async fn test_memory_dispatcher_records_every_role() {
        let sink = MemorySink::new("memory");
        let dispatcher = Dispatcher::memory(&sink);

        let row = row();
        assert!(dispatcher.insert_feature(row.clone()).await);
        assert!(
            dispatcher
                .publish(Publication {
                    topic: "internal_data".into(),
                    payload: row.to_published(),
                })
                .await
        );
        assert!(
            dispatcher
                .alert(Alert {
                    sensor: "htu21d".into(),
                    message: AlertMessage::Resolve,
                })
                .await
        );
        dispatcher.shutdown().await;

        assert_eq!(sink.feature_rows(), vec![row]);
        assert_eq!(sink.publications().len(), 1);
        assert_eq!(sink.alerts().len(), 1);
        assert!(sink.misfit_rows().is_empty());
    }

    #[tokio::test]
    async fn test_from_blueprint_log_outputs() {
        let bp = blueprint(output("warehouse", OutputKind::Log, HashMap::new()));
        let dispatcher = Dispatcher::from_blueprint(&bp).await.unwrap();
        assert!(dispatcher.insert_feature(row()).await);

        let names: Vec<String> = dispatcher.metrics().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "features:warehouse",
                "misfits:warehouse",
                "publisher:socket",
                "alerts:apiary"
            ]
        );
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_network_storage_is_rejected() {
        let params = HashMap::from([("addr".to_string(), "127.0.0.1:9100".to_string())]);
        let bp = blueprint(output("warehouse", OutputKind::Network, params));
        let err = Dispatcher::from_blueprint(&bp).await.err().unwrap();
        assert!(matches!(err, DispatcherError::UnsupportedRole { .. }));
    }

    #[tokio::test]
    async fn test_file_storage_without_base_path_fails() {
        let bp = blueprint(output("warehouse", OutputKind::File, HashMap::new()));
        let err = Dispatcher::from_blueprint(&bp).await.err().unwrap();
        assert!(matches!(err, DispatcherError::SinkCreation { .. }));
    }
}
