//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{InputSource, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref metadata) = args.metadata {
        info!(path = %metadata.display(), "Overriding metadata path from CLI");
        blueprint.metadata.path = metadata.display().to_string();
    }
    if let Some(max_in_flight) = args.max_in_flight {
        if max_in_flight == 0 {
            anyhow::bail!("--max-in-flight must be greater than 0");
        }
        info!(max_in_flight, "Overriding max_in_flight from CLI");
        blueprint.router.max_in_flight = max_in_flight;
    }

    info!(
        metadata = %blueprint.metadata.path,
        storage = %blueprint.storage.name,
        publisher = %blueprint.publisher.name,
        alerts = %blueprint.alerts.name,
        max_in_flight = blueprint.router.max_in_flight,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        input: match &args.input {
            Some(path) => InputSource::File(path.clone()),
            None => InputSource::Stdin,
        },
        max_records: (args.max_records > 0).then_some(args.max_records),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    if stats.interrupted {
        warn!(
            watermark = stats.watermark,
            "Pipeline stopped by signal; resume after the watermark"
        );
    }
    info!(
        records = stats.records_read,
        routed = stats.routing.total_observations,
        watermark = stats.watermark,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("Stream Mapper finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::MapperBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Metadata:");
    println!("  Path: {}", blueprint.metadata.path);
    println!("  Fetch timeout: {} ms", blueprint.metadata.fetch_timeout_ms);
    println!("\nRouter:");
    println!("  Max in flight: {}", blueprint.router.max_in_flight);
    println!("  Publish topic: {}", blueprint.router.publish_topic);
    println!("  Checkpoint every: {}", blueprint.router.checkpoint_every);
    println!("\nOutputs:");
    for (role, output) in blueprint.outputs() {
        println!(
            "  - {role}: {} ({:?}, queue {}, {:?})",
            output.name, output.kind, output.queue_capacity, output.overflow
        );
    }
    println!();
}
