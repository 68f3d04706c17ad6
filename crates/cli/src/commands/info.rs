//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{MapperBlueprint, MetadataStore, SensorRow};
use schema_cache::FileMetadataStore;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    metadata: MetadataInfo,
    router: RouterInfo,
    outputs: Vec<OutputInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensors: Option<Vec<SensorInfo>>,
}

#[derive(Serialize)]
struct MetadataInfo {
    path: String,
    fetch_timeout_ms: u64,
}

#[derive(Serialize)]
struct RouterInfo {
    max_in_flight: usize,
    publish_topic: String,
    checkpoint_every: u64,
}

#[derive(Serialize)]
struct OutputInfo {
    role: String,
    name: String,
    kind: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SensorInfo {
    name: String,
    keys: BTreeMap<String, String>,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let sensors = if args.sensors {
        Some(load_sensors(&blueprint).await?)
    } else {
        None
    };

    let info = build_config_info(&blueprint, sensors);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

async fn load_sensors(blueprint: &MapperBlueprint) -> Result<Vec<SensorInfo>> {
    let store = FileMetadataStore::new(&blueprint.metadata.path);
    let rows = MetadataStore::fetch_sensor_map(&store)
        .await
        .map_err(|e| CliError::metadata(e.to_string()))?;
    Ok(rows.into_iter().map(sensor_info).collect())
}

fn sensor_info(row: SensorRow) -> SensorInfo {
    SensorInfo {
        name: row.name,
        keys: row.observed_properties.into_iter().collect(),
    }
}

fn build_config_info(blueprint: &MapperBlueprint, sensors: Option<Vec<SensorInfo>>) -> ConfigInfo {
    let outputs = blueprint
        .outputs()
        .into_iter()
        .map(|(role, output)| OutputInfo {
            role: role.to_string(),
            name: output.name.clone(),
            kind: format!("{:?}", output.kind).to_lowercase(),
            queue_capacity: output.queue_capacity,
            params: output
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        metadata: MetadataInfo {
            path: blueprint.metadata.path.clone(),
            fetch_timeout_ms: blueprint.metadata.fetch_timeout_ms,
        },
        router: RouterInfo {
            max_in_flight: blueprint.router.max_in_flight,
            publish_topic: blueprint.router.publish_topic.clone(),
            checkpoint_every: blueprint.router.checkpoint_every,
        },
        outputs,
        sensors,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Stream Mapper Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📚 Metadata");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Document: {}", info.metadata.path);
    println!("   └─ Fetch timeout: {} ms", info.metadata.fetch_timeout_ms);

    println!("\n⚙️  Router");
    println!("   ├─ Max in flight: {}", info.router.max_in_flight);
    println!("   ├─ Publish topic: {}", info.router.publish_topic);
    println!("   └─ Checkpoint every: {} records", info.router.checkpoint_every);

    println!("\n📤 Outputs ({})", info.outputs.len());
    for (i, output) in info.outputs.iter().enumerate() {
        let prefix = if i == info.outputs.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {}: {} ({}, queue {})",
            prefix, output.role, output.name, output.kind, output.queue_capacity
        );
    }

    if let Some(ref sensors) = info.sensors {
        println!("\n📡 Sensors ({})", sensors.len());
        for (i, sensor) in sensors.iter().enumerate() {
            let is_last = i == sensors.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };
            println!("   {} {} ({} keys)", prefix, sensor.name, sensor.keys.len());
            for (key, target) in &sensor.keys {
                println!("   {}   {} → {}", child_prefix, key, target);
            }
        }
    }

    println!();
}
