use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::locate::strategy::LocatorConfig;
use crate::page::session::SessionConfig;
use crate::run::orchestrator::BatchConfig;
use crate::run::pacing::PacingConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "replay-engine",
    version,
    about = "Replay recorded web interactions against rows of tabular data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to config file (default: replay-engine.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded sequence once per data row
    Run {
        /// Sequence file (JSON or YAML)
        #[arg(long)]
        sequence: String,

        /// Tabular data file (CSV with a header row, or a JSON/YAML list of rows)
        #[arg(long)]
        data: Option<String>,

        /// Start URL, overriding the one stored in the sequence
        #[arg(long)]
        url: Option<String>,

        /// Output format: console, junit
        #[arg(long)]
        format: Option<String>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// JSONL trace file
        #[arg(long)]
        trace: Option<String>,

        /// Store the run result under this project id
        #[arg(long)]
        project: Option<String>,
    },

    /// Locate a bundle in a saved DOM snapshot and report which strategy matched
    Locate {
        /// DOM snapshot JSON
        #[arg(long)]
        snapshot: String,

        /// Element bundle JSON
        #[arg(long)]
        bundle: String,
    },

    /// Check a sequence for invalid steps and suspicious ordering
    Validate {
        /// Sequence file (JSON or YAML)
        #[arg(long)]
        sequence: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

pub const DEFAULT_CONFIG_PATH: &str = "replay-engine.yaml";

/// Optional YAML config file: `replay-engine.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_console")]
    pub format: String,

    pub output: Option<String>,

    pub trace: Option<String>,

    /// Directory of the JSON project store.
    pub store_dir: Option<String>,

    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            format: default_console(),
            output: None,
            trace: None,
            store_dir: None,
            load_timeout_ms: default_load_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

// Serde default helpers
fn default_console() -> String { "console".to_string() }
fn default_load_timeout_ms() -> u64 { BatchConfig::default().load_timeout_ms }
fn default_settle_delay_ms() -> u64 { BatchConfig::default().settle_delay_ms }

// ============================================================================
// Config File Loading
// ============================================================================

/// Read and parse a config file.
pub fn load_config_file(path: &str) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    match load_config_file(config_path) {
        Ok(config) => config,
        Err(ConfigError::Read { .. }) if path.is_none() => AppConfig::default(),
        Err(e) => {
            warn!(error = %e, "using default configuration");
            AppConfig::default()
        }
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Build the batch settings from resolved CLI/config values.
pub fn build_batch_config(config: &AppConfig, url: Option<&str>) -> BatchConfig {
    BatchConfig {
        url: url.map(str::to_string),
        load_timeout_ms: config.run.load_timeout_ms,
        settle_delay_ms: config.run.settle_delay_ms,
        locator: config.locator,
        pacing: config.pacing.clone(),
    }
}
