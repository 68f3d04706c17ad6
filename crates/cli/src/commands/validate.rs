//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::OutputKind;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    metadata_path: String,
    storage: String,
    publisher: String,
    alerts: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    metadata_path: blueprint.metadata.path.clone(),
                    storage: describe(&blueprint.storage),
                    publisher: describe(&blueprint.publisher),
                    alerts: describe(&blueprint.alerts),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn describe(output: &contracts::OutputConfig) -> String {
    format!("{} ({:?})", output.name, output.kind)
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::MapperBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if !std::path::Path::new(&blueprint.metadata.path).exists() {
        warnings.push(format!(
            "Metadata document '{}' does not exist yet - every refresh will fail until it does",
            blueprint.metadata.path
        ));
    }

    for (role, output) in blueprint.outputs() {
        if output.kind == OutputKind::Memory {
            warnings.push(format!(
                "{role} output '{}' is in-memory - nothing will be persisted",
                output.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Metadata: {}", summary.metadata_path);
            println!("  Storage: {}", summary.storage);
            println!("  Publisher: {}", summary.publisher);
            println!("  Alerts: {}", summary.alerts);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
