//! TOML configuration file parsing
//!
//! ```toml
//! [evaluator]
//! latte = "/opt/latte/bin/count"
//!
//! [distributed]
//! host = "master.example.org"
//! port = 12345
//! authkey = "secret"
//! jobs = 8
//! lease_timeout_secs = 600
//!
//! [output]
//! json_output = "result.json"
//! ```

use super::*;
use crate::config::cli::{Cli, Command};
use crate::config::cli_convert::{apply_evaluator_args, evaluator_from_env, parse_duration, parse_partitions};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    match &cli.command {
        Command::Serial(args) => {
            config.mode = Mode::Serial;
            config.partitions = parse_partitions(&args.partitions)?;
            config.weight_multiplicity = args.weight_multiplicity;
            apply_evaluator_args(&args.evaluator, &mut config.evaluator);
            if args.json_output.is_some() {
                config.output.json_output = args.json_output.clone();
            }
        }
        Command::Master(args) => {
            config.mode = Mode::Master;
            config.partitions = parse_partitions(&args.partitions)?;
            if let Some(port) = args.port {
                config.distributed.port = port;
            }
            if args.authkey.is_some() {
                config.distributed.authkey = args.authkey.clone();
            }
            if let Some(timeout) = &args.lease_timeout {
                config.distributed.lease_timeout_secs = Some(parse_duration(timeout)?);
            }
            if args.json_output.is_some() {
                config.output.json_output = args.json_output.clone();
            }
        }
        Command::Worker(args) => {
            config.mode = Mode::Worker;
            apply_evaluator_args(&args.evaluator, &mut config.evaluator);
            if args.host.is_some() {
                config.distributed.host = args.host.clone();
            }
            if let Some(port) = args.port {
                config.distributed.port = port;
            }
            if args.authkey.is_some() {
                config.distributed.authkey = args.authkey.clone();
            }
            if args.jobs.is_some() {
                config.distributed.jobs = args.jobs;
            }
            if config.distributed.jobs.is_none() {
                config.distributed.jobs = Some(num_cpus::get());
            }
        }
    }

    if config.mode != Mode::Master && config.evaluator.is_empty() {
        config.evaluator = evaluator_from_env();
    }

    Ok(config)
}
