//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stream Mapper - schema-driven router for sensor observations
#[derive(Parser, Debug)]
#[command(
    name = "stream-mapper",
    author,
    version,
    about = "Schema-driven router for sensor observations",
    long_about = "Routes JSON sensor observations into per-feature tables.\n\n\
                  Validates every observation against cached sensor metadata, \n\
                  coerces values to their declared types, splits them by feature \n\
                  and sends misfits plus deduplicated alerts to the configured outputs."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAM_MAPPER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STREAM_MAPPER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route observations from a JSON-lines input
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "mapper.toml",
        env = "STREAM_MAPPER_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines input file (default: stdin)
    #[arg(short, long, env = "STREAM_MAPPER_INPUT")]
    pub input: Option<PathBuf>,

    /// Override the metadata document path from configuration
    #[arg(long, env = "STREAM_MAPPER_METADATA")]
    pub metadata: Option<PathBuf>,

    /// Override the number of observations routed concurrently
    #[arg(long, env = "STREAM_MAPPER_MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// Stop after this many records (0 = unlimited)
    #[arg(long, default_value = "0", env = "STREAM_MAPPER_MAX_RECORDS")]
    pub max_records: u64,

    /// Channel buffer size between the reader and the router
    #[arg(long, default_value = "1024", env = "STREAM_MAPPER_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "STREAM_MAPPER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "mapper.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "mapper.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Also load the metadata document and list its sensors
    #[arg(long)]
    pub sensors: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
