//! kronvpf CLI entry point

use anyhow::{Context, Result};
use kronvpf::config::{cli::Cli, validator, Config, Mode};
use kronvpf::coordinator::{compute_coefficient, compute_weight_multiplicity};
use kronvpf::distributed::{run_pool, Master, MasterConfig, WorkerConfig, DEFAULT_HANDSHAKE_TIMEOUT};
use kronvpf::output::json::{write_json_report, JsonReport, Quantity};
use kronvpf::output::text;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = kronvpf::config::load_config(cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    match config.mode {
        Mode::Serial => run_serial(&config),
        Mode::Master => run_master(&config, cli.verbose),
        Mode::Worker => run_worker(&config),
    }
}

/// Compute everything in this process
fn run_serial(config: &Config) -> Result<()> {
    let evaluator = config.evaluator.selection().resolve()?;
    let start = Instant::now();

    let (quantity, value) = if config.weight_multiplicity {
        let m = compute_weight_multiplicity(&config.partitions, evaluator.as_ref())?;
        (Quantity::WeightMultiplicity, m.to_string())
    } else {
        let g = compute_coefficient(&config.partitions, evaluator.as_ref())?;
        (Quantity::KroneckerCoefficient, g.to_string())
    };

    text::print_result(&value);

    if let Some(path) = &config.output.json_output {
        let report = JsonReport::new(Mode::Serial, &config.partitions, quantity, &value, start.elapsed())
            .with_evaluator(evaluator.name());
        write_json_report(path, &report)?;
    }

    Ok(())
}

/// Serve the work queue until every item is done
fn run_master(config: &Config, verbose: bool) -> Result<()> {
    let master_config = MasterConfig {
        port: config.distributed.port,
        authkey: config.distributed.authkey.clone().unwrap_or_default(),
        lease_timeout: config.distributed.lease_timeout(),
        handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
    };
    let master = Master::new(&config.partitions, master_config)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let start = Instant::now();
    let report = runtime.block_on(master.run())?;
    let elapsed = start.elapsed();

    text::print_result(&report.coefficient);
    if verbose {
        text::print_master_summary(report.total_items, &report.per_node_completed, elapsed);
    }

    if let Some(path) = &config.output.json_output {
        let json = JsonReport::new(
            Mode::Master,
            &config.partitions,
            Quantity::KroneckerCoefficient,
            &report.coefficient,
            elapsed,
        )
        .with_distribution(report.total_items, report.per_node_completed);
        write_json_report(path, &json)?;
    }

    Ok(())
}

/// Attach `jobs` workers to the master
fn run_worker(config: &Config) -> Result<()> {
    let jobs = config.distributed.jobs.unwrap_or(1);
    let selection = config.evaluator.selection();
    let evaluators = (0..jobs)
        .map(|_| selection.resolve())
        .collect::<Result<Vec<_>, _>>()?;

    let worker_config = WorkerConfig {
        host: config.distributed.host.clone().unwrap_or_default(),
        port: config.distributed.port,
        authkey: config.distributed.authkey.clone().unwrap_or_default(),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let summary = runtime.block_on(run_pool(worker_config, evaluators))?;

    tracing::info!("{} completed {} item(s)", summary.node_id, summary.items_completed);
    Ok(())
}
