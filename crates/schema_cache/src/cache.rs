//! MetadataCache - atomic snapshot read, single-flight refresh

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{MetadataStore, SensorMap, TypeMap};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::error::MetadataError;

/// Both maps of one refresh generation
///
/// Generation 0 is the empty start-up snapshot.
#[derive(Debug, Default)]
pub struct MetadataSnapshot {
    generation: u64,
    sensors: SensorMap,
    types: TypeMap,
}

impl MetadataSnapshot {
    pub fn new(generation: u64, sensors: SensorMap, types: TypeMap) -> Self {
        Self {
            generation,
            sensors,
            types,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sensors(&self) -> &SensorMap {
        &self.sensors
    }

    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    /// False until the first successful refresh
    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }
}

/// Outcome of the most recent completed refresh attempt
struct RefreshRecord {
    attempt: u64,
    outcome: Result<Arc<MetadataSnapshot>, MetadataError>,
}

/// Metadata cache over a [`MetadataStore`]
pub struct MetadataCache<M> {
    store: M,
    current: watch::Sender<Arc<MetadataSnapshot>>,
    /// Completed refresh attempts; mirrors `RefreshRecord::attempt`
    attempts: AtomicU64,
    gate: Mutex<RefreshRecord>,
    fetch_timeout: Duration,
}

impl<M: MetadataStore> MetadataCache<M> {
    /// Create an empty cache; the first routed observation forces a refresh
    pub fn new(store: M, fetch_timeout: Duration) -> Self {
        let empty = Arc::new(MetadataSnapshot::default());
        let (current, _) = watch::channel(Arc::clone(&empty));
        Self {
            store,
            current,
            attempts: AtomicU64::new(0),
            gate: Mutex::new(RefreshRecord {
                attempt: 0,
                outcome: Ok(empty),
            }),
            fetch_timeout,
        }
    }

    /// Current snapshot
    pub fn lookup(&self) -> Arc<MetadataSnapshot> {
        Arc::clone(&self.current.borrow())
    }

    /// Completed refresh attempts; read it before [`lookup`](Self::lookup)
    /// and hand it to [`refresh_since`](Self::refresh_since)
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Fetch both maps and swap them in together.
    ///
    /// If another refresh completes while this call waits for the gate, its
    /// outcome is returned instead of fetching again. On failure the previous
    /// snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<MetadataSnapshot>, MetadataError> {
        self.refresh_since(self.attempts()).await
    }

    /// Refresh unless an attempt completed after `seen` was read.
    ///
    /// A caller whose lookup missed passes the count it read before that
    /// lookup, so a refresh that finished in between is joined, not repeated.
    #[instrument(name = "metadata_cache_refresh", skip(self), fields(store = %self.store.name()))]
    pub async fn refresh_since(&self, seen: u64) -> Result<Arc<MetadataSnapshot>, MetadataError> {
        let mut record = self.gate.lock().await;

        if record.attempt > seen {
            debug!(attempt = record.attempt, "joined concurrent refresh");
            return record.outcome.clone();
        }

        let started = Instant::now();
        let outcome = self.fetch_and_swap().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_metadata_refresh(outcome.is_ok(), elapsed_ms);

        match &outcome {
            Ok(snapshot) => info!(
                generation = snapshot.generation(),
                sensors = snapshot.sensors().len(),
                features = snapshot.types().len(),
                elapsed_ms,
                "metadata refreshed"
            ),
            Err(e) => warn!(
                error = %e,
                generation = self.current.borrow().generation(),
                "metadata refresh failed, keeping previous snapshot"
            ),
        }

        record.attempt += 1;
        record.outcome = outcome.clone();
        self.attempts.store(record.attempt, Ordering::Release);
        outcome
    }

    async fn fetch_and_swap(&self) -> Result<Arc<MetadataSnapshot>, MetadataError> {
        let store_name = self.store.name().to_string();
        let fetch = async {
            tokio::try_join!(
                self.store.fetch_sensor_map(),
                self.store.fetch_feature_type_map()
            )
        };

        let (sensor_rows, feature_rows) = match tokio::time::timeout(self.fetch_timeout, fetch)
            .await
        {
            Err(_) => {
                return Err(MetadataError::Timeout {
                    store: store_name,
                    timeout_ms: self.fetch_timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                return Err(MetadataError::Fetch {
                    store: store_name,
                    message: e.to_string(),
                })
            }
            Ok(Ok(rows)) => rows,
        };

        let generation = self.current.borrow().generation() + 1;
        let snapshot = Arc::new(MetadataSnapshot::new(
            generation,
            SensorMap::from_rows(sensor_rows),
            TypeMap::from_rows(feature_rows),
        ));
        self.current.send_replace(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
