//! Error taxonomy
//!
//! Library operations return these typed errors so callers can tell a
//! contract violation (bad partitions) from a back-end failure or a
//! rejected worker. The binary and the network glue wrap them in
//! `anyhow::Error` with context, the same way the rest of the crate
//! reports failures.

use num_bigint::BigInt;
use std::path::PathBuf;
use thiserror::Error;

use crate::weight::Weight;

/// Errors raised while computing a coefficient.
#[derive(Debug, Error)]
pub enum KroneckerError {
    /// Weight components do not all have the same number of boxes.
    #[error("all components must have the same degree (number of boxes), got {}", format_degrees(.degrees))]
    InconsistentDegree { degrees: Vec<BigInt> },

    /// The highest weight pairs negatively with a positive root.
    #[error("highest weight is not dominant: inner product with root {root} is {inner_product}")]
    NotDominant { root: Weight, inner_product: BigInt },

    /// Empty partition tuple or zero-length component.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// The evaluator back-end failed.
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    /// A worker presented the wrong shared secret.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Neither `--barvinok`, `--latte` nor `--enumerate` was given.
    #[error("no evaluator configured (specify --barvinok, --latte or --enumerate)")]
    NoEvaluatorConfigured,

    /// More than one evaluator was selected.
    #[error("conflicting evaluators: specify exactly one of --barvinok, --latte or --enumerate")]
    ConflictingEvaluators,

    /// Peer sent an unexpected or malformed message.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors raised by an [`Evaluator`](crate::evaluator::Evaluator).
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("point has {got} entries but the partition matrix has {expected} rows")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{backend} binary not found at {}", .path.display())]
    MissingBinary { backend: &'static str, path: PathBuf },

    #[error("failed to run {backend}: {source}")]
    Spawn {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} exited with {status}: {output}")]
    Failed {
        backend: &'static str,
        status: String,
        output: String,
    },

    #[error("could not parse {backend} output: {output}")]
    Unparsable { backend: &'static str, output: String },

    #[error("i/o error while preparing {backend} input: {source}")]
    Io {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },
}

fn format_degrees(degrees: &[BigInt]) -> String {
    let parts: Vec<String> = degrees.iter().map(|d| d.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
