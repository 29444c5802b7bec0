//! CLI to Config conversion utilities

use crate::config::cli::EvaluatorArgs;
use crate::config::EvaluatorConfig;
use crate::evaluator::{BARVINOK_ENV, LATTE_ENV};
use crate::weight::Weight;
use anyhow::{Context, Result};
use num_bigint::BigInt;
use std::path::PathBuf;

/// Parse a partition written as `[3,2,1]`, `(3,2,1)` or `3,2,1`
///
/// Entries are arbitrary-precision integers and may be negative.
pub fn parse_partition(s: &str) -> Result<Weight> {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')))
        .unwrap_or(trimmed);

    let entries = inner
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<BigInt>()
                .with_context(|| format!("Invalid partition entry '{}' in {}", entry, s))
        })
        .collect::<Result<Vec<BigInt>>>()?;

    if entries.is_empty() {
        anyhow::bail!("Empty partition: {}", s);
    }

    Ok(Weight::new(entries))
}

/// Parse every partition argument
pub fn parse_partitions(args: &[String]) -> Result<Vec<Weight>> {
    args.iter().map(|s| parse_partition(s)).collect()
}

/// Parse a duration string (e.g., "60s", "5m", "1h") to seconds
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("sec") || s.ends_with('s') {
        (s.trim_end_matches("sec").trim_end_matches('s'), 1u64)
    } else if s.ends_with("min") || s.ends_with('m') {
        (s.trim_end_matches("min").trim_end_matches('m'), 60)
    } else if s.ends_with("hr") || s.ends_with('h') {
        (s.trim_end_matches("hr").trim_end_matches('h'), 3600)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Duration out of range: {}", s))
}

/// Convert evaluator flags, leaving unset fields untouched
pub fn apply_evaluator_args(args: &EvaluatorArgs, config: &mut EvaluatorConfig) {
    if args.barvinok.is_some() || args.latte.is_some() || args.enumerate {
        // any flag replaces the file's selection as a whole
        *config = EvaluatorConfig {
            barvinok: args.barvinok.clone(),
            latte: args.latte.clone(),
            enumerate: args.enumerate,
        };
    }
}

/// Evaluator named by `KRONVPF_BARVINOK`, else `KRONVPF_LATTE`
pub fn evaluator_from_env() -> EvaluatorConfig {
    let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(path) = var(BARVINOK_ENV) {
        EvaluatorConfig {
            barvinok: Some(path),
            ..Default::default()
        }
    } else if let Some(path) = var(LATTE_ENV) {
        EvaluatorConfig {
            latte: Some(path),
            ..Default::default()
        }
    } else {
        EvaluatorConfig::default()
    }
}
