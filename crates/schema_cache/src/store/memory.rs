//! InMemoryMetadataStore - mutable in-process metadata, for tests and demos

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use contracts::{ContractError, FeatureRow, MetadataStore, SensorRow};

#[derive(Debug, Default)]
struct State {
    sensors: Vec<SensorRow>,
    features: Vec<FeatureRow>,
    failure: Option<String>,
    latency: Duration,
}

/// Shared handle; clones see the same rows
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    state: Arc<RwLock<State>>,
    sensor_fetches: Arc<AtomicU64>,
}

impl InMemoryMetadataStore {
    pub fn new(sensors: Vec<SensorRow>, features: Vec<FeatureRow>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                sensors,
                features,
                ..State::default()
            })),
            sensor_fetches: Arc::default(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_sensors(&self, sensors: Vec<SensorRow>) {
        self.write().sensors = sensors;
    }

    pub fn set_features(&self, features: Vec<FeatureRow>) {
        self.write().features = features;
    }

    /// Replace both row sets at once
    pub fn replace(&self, sensors: Vec<SensorRow>, features: Vec<FeatureRow>) {
        let mut state = self.write();
        state.sensors = sensors;
        state.features = features;
    }

    /// Make every subsequent fetch fail
    pub fn fail_with(&self, message: impl Into<String>) {
        self.write().failure = Some(message.into());
    }

    pub fn clear_failure(&self) {
        self.write().failure = None;
    }

    /// Delay applied to every fetch
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = latency;
    }

    /// Number of sensor-map queries served (one per real refresh)
    pub fn sensor_fetches(&self) -> u64 {
        self.sensor_fetches.load(Ordering::Relaxed)
    }

    async fn delay(&self) {
        let latency = self.read().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(&self, query: &str) -> Result<(), ContractError> {
        match &self.read().failure {
            Some(message) => Err(ContractError::metadata_fetch(query, message.clone())),
            None => Ok(()),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_sensor_map(&self) -> Result<Vec<SensorRow>, ContractError> {
        self.sensor_fetches.fetch_add(1, Ordering::Relaxed);
        self.delay().await;
        self.check("sensor_map")?;
        Ok(self.read().sensors.clone())
    }

    async fn fetch_feature_type_map(&self) -> Result<Vec<FeatureRow>, ContractError> {
        self.delay().await;
        self.check("feature_type_map")?;
        Ok(self.read().features.clone())
    }
}
