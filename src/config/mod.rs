//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::distributed::DEFAULT_PORT;
use crate::evaluator::EvaluatorSelection;
use crate::weight::Weight;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
///
/// The TOML file may provide `[evaluator]`, `[distributed]` and `[output]`.
/// Mode and partitions only come from the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub mode: Mode,
    #[serde(skip)]
    pub partitions: Vec<Weight>,
    #[serde(skip)]
    pub weight_multiplicity: bool,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub distributed: DistributedConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What the process does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Evaluate every item in this process
    #[default]
    Serial,
    /// Host the work queue
    Master,
    /// Pull items from a master
    Worker,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Serial => write!(f, "serial"),
            Mode::Master => write!(f, "master"),
            Mode::Worker => write!(f, "worker"),
        }
    }
}

/// Evaluator back-end selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Path to `barvinok_count`
    pub barvinok: Option<PathBuf>,
    /// Path to LattE's `count`
    pub latte: Option<PathBuf>,
    /// Use the in-process enumeration back-end
    #[serde(default)]
    pub enumerate: bool,
}

impl EvaluatorConfig {
    pub fn selection(&self) -> EvaluatorSelection {
        EvaluatorSelection {
            barvinok: self.barvinok.clone(),
            latte: self.latte.clone(),
            enumerate: self.enumerate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.barvinok.is_none() && self.latte.is_none() && !self.enumerate
    }
}

/// Master and worker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedConfig {
    /// Master hostname (worker only)
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret
    pub authkey: Option<String>,
    /// Concurrent workers on this host (worker only)
    pub jobs: Option<usize>,
    /// Re-queue leases held longer than this many seconds (master only)
    pub lease_timeout_secs: Option<u64>,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            authkey: None,
            jobs: None,
            lease_timeout_secs: None,
        }
    }
}

impl DistributedConfig {
    pub fn lease_timeout(&self) -> Option<Duration> {
        self.lease_timeout_secs.map(Duration::from_secs)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON report here
    pub json_output: Option<PathBuf>,
}

/// Build the run configuration from the command line and optional config file
pub fn load_config(cli: &cli::Cli) -> anyhow::Result<Config> {
    let base = match &cli.config {
        Some(path) => toml::parse_toml_file(path)?,
        None => Config::default(),
    };
    toml::merge_cli_with_config(cli, base)
}
