//! CLI argument parsing using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// kronvpf - Kronecker coefficients via vector partition functions
#[derive(Parser, Debug)]
#[command(name = "kronvpf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log progress (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// TOML configuration file (command-line options take precedence)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute a coefficient in this process
    Serial(SerialArgs),
    /// Host the work queue and sum the workers' results
    Master(MasterArgs),
    /// Evaluate items pulled from a master
    Worker(WorkerArgs),
}

/// Evaluator back-end options
///
/// Without any of these, `KRONVPF_BARVINOK` and then `KRONVPF_LATTE` are
/// consulted.
#[derive(Args, Debug, Clone, Default)]
pub struct EvaluatorArgs {
    /// Evaluate partition functions using barvinok (http://barvinok.gforge.inria.fr/)
    #[arg(long, value_name = "PATH")]
    pub barvinok: Option<PathBuf>,

    /// Evaluate partition functions using LattE (https://www.math.ucdavis.edu/~latte/)
    #[arg(long, value_name = "PATH")]
    pub latte: Option<PathBuf>,

    /// Evaluate partition functions by enumeration (small inputs only)
    #[arg(long)]
    pub enumerate: bool,
}

#[derive(Args, Debug)]
pub struct SerialArgs {
    #[command(flatten)]
    pub evaluator: EvaluatorArgs,

    /// Compute a single weight multiplicity instead of the coefficient
    #[arg(long)]
    pub weight_multiplicity: bool,

    /// Write a JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Partitions, e.g. `[2,1] [2,1] [3]` or `2,1 2,1 3`
    #[arg(value_name = "PARTITION", required = true, num_args = 1.., allow_hyphen_values = true)]
    pub partitions: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MasterArgs {
    /// Shared secret workers must present
    #[arg(short = 'K', long)]
    pub authkey: Option<String>,

    /// Port to listen on [default: 12345]
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Re-queue items a worker holds longer than this (e.g. 30s, 5m)
    #[arg(long, value_name = "DURATION")]
    pub lease_timeout: Option<String>,

    /// Write a JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Partitions, e.g. `[2,1] [2,1] [3]` or `2,1 2,1 3`
    #[arg(value_name = "PARTITION", required = true, num_args = 1.., allow_hyphen_values = true)]
    pub partitions: Vec<String>,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub evaluator: EvaluatorArgs,

    /// Master hostname or address
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Master port [default: 12345]
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Shared secret
    #[arg(short = 'K', long)]
    pub authkey: Option<String>,

    /// Number of concurrent workers [default: number of CPUs]
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serial() {
        let cli = Cli::try_parse_from(["kronvpf", "serial", "--enumerate", "-v", "[2,1]", "2,1", "(3)"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Serial(args) => {
                assert!(args.evaluator.enumerate);
                assert!(!args.weight_multiplicity);
                assert_eq!(args.partitions, vec!["[2,1]", "2,1", "(3)"]);
            }
            other => panic!("expected serial, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_master() {
        let cli = Cli::try_parse_from([
            "kronvpf",
            "master",
            "-K",
            "secret",
            "-P",
            "4000",
            "--lease-timeout",
            "30s",
            "1,1",
            "1,1",
            "1,1",
        ])
        .unwrap();
        match cli.command {
            Command::Master(args) => {
                assert_eq!(args.authkey.as_deref(), Some("secret"));
                assert_eq!(args.port, Some(4000));
                assert_eq!(args.lease_timeout.as_deref(), Some("30s"));
                assert_eq!(args.partitions.len(), 3);
            }
            other => panic!("expected master, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_worker() {
        let cli = Cli::try_parse_from([
            "kronvpf", "worker", "-H", "master.local", "-K", "secret", "-j", "4", "--latte", "/opt/latte/count",
        ])
        .unwrap();
        match cli.command {
            Command::Worker(args) => {
                assert_eq!(args.host.as_deref(), Some("master.local"));
                assert_eq!(args.jobs, Some(4));
                assert_eq!(args.port, None);
                assert_eq!(args.evaluator.latte, Some(PathBuf::from("/opt/latte/count")));
            }
            other => panic!("expected worker, got {:?}", other),
        }
    }

    #[test]
    fn test_partitions_required() {
        assert!(Cli::try_parse_from(["kronvpf", "serial", "--enumerate"]).is_err());
    }
}
