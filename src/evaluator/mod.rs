//! Vector partition function evaluators
//!
//! An evaluator counts the lattice points `#{ x >= 0 : A x = b }` for a
//! partition matrix `A` and a point `b`. The coefficient computation never
//! looks inside an evaluator; it only relies on the [`Evaluator`] contract.
//!
//! # Back-ends
//!
//! - **barvinok**: runs `barvinok_count`, query on stdin
//! - **latte**: runs LattE's `count`, query in a temporary file
//! - **enumerate**: in-process exhaustive enumeration for small systems
//!   (tests and smoke runs)
//!
//! # Example
//!
//! ```
//! use kronvpf::evaluator::{Evaluator, enumerate::EnumerationEvaluator};
//! use kronvpf::weight::{build_partition_matrix, Weight};
//! use num_bigint::BigUint;
//!
//! let matrix = build_partition_matrix(&[2, 2]).unwrap();
//! let point: Weight = [1, 1, 1, 1].into_iter().collect();
//! let count = matrix.evaluate(&point, &EnumerationEvaluator::new()).unwrap();
//! assert_eq!(count, BigUint::from(2u32));
//! ```

pub mod barvinok;
pub mod enumerate;
pub mod latte;

use crate::error::{EvaluatorError, KroneckerError};
use crate::weight::{PartitionMatrix, Weight};
use num_bigint::BigUint;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable naming a `barvinok_count` binary
pub const BARVINOK_ENV: &str = "KRONVPF_BARVINOK";

/// Environment variable naming a LattE `count` binary
pub const LATTE_ENV: &str = "KRONVPF_LATTE";

/// Evaluator trait for all back-ends
///
/// Implementations must be `Send + Sync` so a worker can move its evaluator
/// onto a blocking thread. Each worker owns its own instance.
///
/// # Contract
///
/// - `point.len() == matrix.rows()` (checked by [`PartitionMatrix::evaluate`])
/// - an infeasible or empty system is `Ok(0)`, not an error
/// - a failing back-end or unreadable output is an [`EvaluatorError`]
pub trait Evaluator: Send + Sync {
    /// Count nonnegative integral solutions of `matrix · x = point`
    fn evaluate(&self, matrix: &PartitionMatrix, point: &Weight) -> Result<BigUint, EvaluatorError>;

    /// Short human-readable description, e.g. `barvinok[/usr/bin/barvinok_count]`
    fn name(&self) -> String;
}

/// Which back-end to use, as given on the command line or in a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluatorSelection {
    pub barvinok: Option<PathBuf>,
    pub latte: Option<PathBuf>,
    pub enumerate: bool,
}

impl EvaluatorSelection {
    /// Resolve the selection to exactly one evaluator
    pub fn resolve(&self) -> Result<Arc<dyn Evaluator>, KroneckerError> {
        let selected = [self.barvinok.is_some(), self.latte.is_some(), self.enumerate]
            .iter()
            .filter(|&&s| s)
            .count();

        match selected {
            0 => Err(KroneckerError::NoEvaluatorConfigured),
            1 => {
                if let Some(ref path) = self.barvinok {
                    Ok(Arc::new(barvinok::BarvinokEvaluator::new(path.clone())?))
                } else if let Some(ref path) = self.latte {
                    Ok(Arc::new(latte::LatteEvaluator::new(path.clone())?))
                } else {
                    Ok(Arc::new(enumerate::EnumerationEvaluator::new()))
                }
            }
            _ => Err(KroneckerError::ConflictingEvaluators),
        }
    }
}

/// Explicit list of available evaluators
///
/// Built once and passed to whoever needs it (test suites iterate over it to
/// check every configured back-end). There is no process-wide registry.
#[derive(Default, Clone)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the external binaries named by `KRONVPF_BARVINOK` and
    /// `KRONVPF_LATTE`
    ///
    /// Variables that are unset, or point at a missing file, are skipped.
    pub fn from_env() -> Self {
        let mut registry = Self::new();

        if let Some(path) = std::env::var_os(BARVINOK_ENV) {
            match barvinok::BarvinokEvaluator::new(PathBuf::from(path)) {
                Ok(evaluator) => registry.register(Arc::new(evaluator)),
                Err(e) => tracing::warn!("ignoring {}: {}", BARVINOK_ENV, e),
            }
        }

        if let Some(path) = std::env::var_os(LATTE_ENV) {
            match latte::LatteEvaluator::new(PathBuf::from(path)) {
                Ok(evaluator) => registry.register(Arc::new(evaluator)),
                Err(e) => tracing::warn!("ignoring {}: {}", LATTE_ENV, e),
            }
        }

        registry
    }

    pub fn register(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.evaluators.push(evaluator);
    }

    pub fn with(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.register(evaluator);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Evaluator>> {
        self.evaluators.iter()
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

/// Join row entries with single spaces
pub(crate) fn join<T: ToString>(entries: impl IntoIterator<Item = T>) -> String {
    entries
        .into_iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
