//! Pipeline driver - reader, bounded concurrent routing, graceful drain.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::MapperBlueprint;
use dispatcher::Dispatcher;
use ingestion::{
    decode_or_skip, CheckpointTracker, IngestionError, ReaderConfig, RecordReader, RecordStream,
};
use router::{Orchestrator, RouteOutcome, Router};
use schema_cache::{FileMetadataStore, MetadataCache};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Where records come from
#[derive(Debug, Clone)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The mapper configuration
    pub blueprint: MapperBlueprint,

    /// Record input
    pub input: InputSource,

    /// Stop after this many records (None = unlimited)
    pub max_records: Option<u64>,

    /// Reader channel capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Result of one routing task
struct Completed {
    sequence: u64,
    outcome: RouteOutcome,
    latency_ms: f64,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the input is exhausted or `shutdown` resolves.
    ///
    /// Either way every in-flight routing finishes and every output is
    /// drained before this returns.
    #[instrument(name = "pipeline_run", skip(self, shutdown))]
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let store = FileMetadataStore::new(&blueprint.metadata.path);
        let cache = MetadataCache::new(store, blueprint.metadata.fetch_timeout());
        // Warm the cache; a failure here is retried by the first observation
        if let Err(e) = cache.refresh().await {
            warn!(error = %e, "initial metadata load failed");
        }

        let dispatcher = Dispatcher::from_blueprint(blueprint)
            .await
            .map_err(|e| CliError::output_setup(e.to_string()))?;
        let router = Router::new(dispatcher, blueprint.router.publish_topic.clone());
        let orchestrator = Arc::new(Orchestrator::new(cache, router));

        let reader = RecordReader::new(ReaderConfig {
            channel_capacity: self.config.buffer_size,
        });
        let stream = match &self.config.input {
            InputSource::Stdin => reader.stdin(),
            InputSource::File(path) => reader
                .open(path)
                .await
                .map_err(|e| CliError::input(e.to_string()))?,
        };
        info!(input = ?self.config.input, "Pipeline running");

        let mut stats = route_stream(
            &self.config,
            Arc::clone(&orchestrator),
            &reader,
            stream,
            shutdown,
        )
        .await;

        info!("Shutting down pipeline...");
        match Arc::try_unwrap(orchestrator) {
            Ok(orchestrator) => {
                stats.outputs = orchestrator.shutdown().await;
            }
            Err(_) => error!("routing tasks still hold the orchestrator, outputs not drained"),
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            throughput = format!("{:.2}", stats.throughput()),
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }
}

async fn route_stream<F>(
    config: &PipelineConfig,
    orchestrator: Arc<Orchestrator<FileMetadataStore>>,
    reader: &RecordReader,
    stream: RecordStream,
    shutdown: F,
) -> PipelineStats
where
    F: Future<Output = ()>,
{
    let blueprint = &config.blueprint;
    let checkpoint_every = blueprint.router.checkpoint_every.max(1);
    let permits = Arc::new(Semaphore::new(blueprint.router.max_in_flight.max(1)));
    let ingestion_metrics = reader.metrics();

    let mut stats = PipelineStats::default();
    let mut tracker = CheckpointTracker::new();
    let mut tasks: JoinSet<Completed> = JoinSet::new();
    let RecordStream { records, task } = stream;

    tokio::pin!(shutdown);

    loop {
        if config.max_records.is_some_and(|max| stats.records_read >= max) {
            info!(records = stats.records_read, "Reached max records limit");
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping input");
                stats.interrupted = true;
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                on_completed(joined, &mut stats, &mut tracker, checkpoint_every);
            }
            received = records.recv() => {
                let Ok(record) = received else {
                    break;
                };
                stats.records_read += 1;

                let Some(observation) = decode_or_skip(&record, &ingestion_metrics) else {
                    tracker.complete(record.sequence);
                    continue;
                };

                let permit = match Arc::clone(&permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let orchestrator = Arc::clone(&orchestrator);
                let sequence = record.sequence;
                tasks.spawn(async move {
                    let started = Instant::now();
                    let outcome = orchestrator.route(observation).await;
                    drop(permit);
                    Completed {
                        sequence,
                        outcome,
                        latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                    }
                });
            }
        }
    }

    // Stop the reader before draining
    drop(records);
    if stats.interrupted {
        task.abort();
    }
    match tokio::time::timeout(Duration::from_secs(1), task).await {
        Ok(Ok(Ok(sent))) => debug!(sent, "reader finished"),
        Ok(Ok(Err(IngestionError::ChannelClosed { sequence }))) => {
            debug!(sequence, "reader stopped early")
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "input failed");
            stats.input_error = Some(e.to_string());
        }
        Ok(Err(e)) if e.is_cancelled() => debug!("reader cancelled"),
        Ok(Err(e)) => error!(error = %e, "reader task panicked"),
        Err(_) => warn!("reader did not stop in time"),
    }

    info!(in_flight = tasks.len(), "Waiting for in-flight routings");
    while let Some(joined) = tasks.join_next().await {
        on_completed(joined, &mut stats, &mut tracker, checkpoint_every);
    }

    stats.records_malformed = ingestion_metrics.snapshot().records_malformed;
    stats.watermark = tracker.watermark();
    info!(watermark = stats.watermark, "Final checkpoint");
    stats
}

fn on_completed(
    joined: Result<Completed, tokio::task::JoinError>,
    stats: &mut PipelineStats,
    tracker: &mut CheckpointTracker,
    checkpoint_every: u64,
) {
    let done = match joined {
        Ok(done) => done,
        Err(e) => {
            error!(error = %e, "routing task failed");
            return;
        }
    };

    let outcome = done.outcome;
    stats.routing.update(
        outcome.class.as_str(),
        outcome.feature_rows,
        outcome.misfit_keys,
        done.latency_ms,
    );
    let watermark = tracker.complete(done.sequence);
    stats.records_completed += 1;
    if stats.records_completed % checkpoint_every == 0 {
        info!(
            watermark,
            completed = stats.records_completed,
            pending = tracker.pending(),
            "Checkpoint"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, MetadataConfig, OutputConfig, OutputKind, OverflowPolicy, RouterConfig};
    use std::collections::HashMap;
    use std::io::Write;

    const METADATA: &str = r#"{
        "sensors": [ { "name": "htu21d", "observed_properties": {
            "Temp": "temperature.temperature", "Humidity": "relative_humidity.humidity" } } ],
        "features": [
            { "name": "temperature", "observed_properties": [ { "name": "temperature", "type": "float" } ] },
            { "name": "relative_humidity", "observed_properties": [ { "name": "humidity", "type": "float" } ] }
        ]
    }"#;

    fn observation(node: &str, data: &str) -> String {
        format!(
            r#"{{"node_id":"{node}","meta_id":23,"datetime":"2016-08-05T00:00:08.246000","sensor":"HTU21D","network":"array_of_things_chicago","data":{data}}}"#
        )
    }

    fn output(name: &str, kind: OutputKind, base: &std::path::Path) -> OutputConfig {
        let mut params = HashMap::new();
        if kind == OutputKind::File {
            params.insert("base_path".to_string(), base.display().to_string());
        }
        OutputConfig {
            name: name.into(),
            kind,
            queue_capacity: 64,
            overflow: OverflowPolicy::Block,
            params,
        }
    }

    fn read_lines(path: std::path::PathBuf) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_file_pipeline_routes_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let metadata_path = dir.path().join("metadata.json");
        std::fs::write(&metadata_path, METADATA).unwrap();

        let input_path = dir.path().join("records.jsonl");
        let mut input = std::fs::File::create(&input_path).unwrap();
        writeln!(input, "{}", observation("00A", r#"{"Temp":37.91,"Humidity":"27.48"}"#)).unwrap();
        writeln!(input).unwrap();
        writeln!(input, "{{broken").unwrap();
        writeln!(input, "{}", observation("00B", r#"{"Temp":"high","Pressure":1.0}"#)).unwrap();
        writeln!(input, "{}", observation("00C", r#"{"Temp":20.0}"#)).unwrap();
        drop(input);

        let out = dir.path().join("out");
        let blueprint = MapperBlueprint {
            version: ConfigVersion::V1,
            metadata: MetadataConfig {
                path: metadata_path.display().to_string(),
                fetch_timeout_ms: 1000,
            },
            router: RouterConfig {
                max_in_flight: 1,
                ..RouterConfig::default()
            },
            storage: output("warehouse", OutputKind::File, &out),
            publisher: output("socket", OutputKind::File, &out),
            alerts: output("apiary", OutputKind::File, &out),
        };

        let pipeline = Pipeline::new(PipelineConfig {
            blueprint,
            input: InputSource::File(input_path),
            max_records: None,
            buffer_size: 8,
            metrics_port: None,
        });
        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.records_read, 4);
        assert_eq!(stats.records_malformed, 1);
        assert_eq!(stats.records_completed, 3);
        assert_eq!(stats.watermark, 4);
        assert!(!stats.interrupted);

        let temperature = read_lines(out.join("array_of_things_chicago__temperature.jsonl"));
        assert_eq!(temperature.len(), 2);
        let humidity = read_lines(out.join("array_of_things_chicago__relative_humidity.jsonl"));
        assert_eq!(humidity.len(), 1);
        let misfits = read_lines(out.join("array_of_things_chicago__unknown_feature.jsonl"));
        assert_eq!(misfits.len(), 1);
        // raised by 00B, resolved by 00C
        let alerts = read_lines(out.join("alerts.jsonl"));
        assert_eq!(alerts.len(), 2);
        let published = read_lines(out.join("internal_data.jsonl"));
        assert_eq!(published.len(), 3);
    }
}
