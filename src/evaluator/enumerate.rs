//! In-process enumeration back-end
//!
//! Counts solutions column by column: pick `x_j`, subtract `x_j · A_j` from
//! the remaining right-hand side, recurse. Subproblems are memoized on
//! `(column, remaining)`. Exponential in the worst case, so only suitable for
//! small systems; the external back-ends handle everything else.
//!
//! A matrix with an all-zero column has either no or infinitely many
//! solutions. Like LattE, this back-end reports both as 0.

use super::Evaluator;
use crate::error::EvaluatorError;
use crate::weight::{PartitionMatrix, Weight};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};
use std::collections::HashMap;

/// Exhaustive evaluator for small systems
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumerationEvaluator;

impl EnumerationEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for EnumerationEvaluator {
    fn evaluate(&self, matrix: &PartitionMatrix, point: &Weight) -> Result<BigUint, EvaluatorError> {
        if point.len() != matrix.rows() {
            return Err(EvaluatorError::DimensionMismatch {
                expected: matrix.rows(),
                got: point.len(),
            });
        }

        let columns: Vec<Vec<BigInt>> = (0..matrix.cols())
            .map(|j| (0..matrix.rows()).map(|i| matrix.get(i, j).clone()).collect())
            .collect();

        if columns.iter().any(|c| c.iter().all(Zero::is_zero)) {
            return Ok(BigUint::zero());
        }

        let mut search = Search {
            columns: &columns,
            memo: HashMap::new(),
        };
        Ok(search.count(0, point.entries().to_vec()))
    }

    fn name(&self) -> String {
        "enumerate".to_string()
    }
}

struct Search<'a> {
    columns: &'a [Vec<BigInt>],
    memo: HashMap<(usize, Vec<BigInt>), BigUint>,
}

impl Search<'_> {
    /// Number of ways to write `remaining` using columns `col..`
    fn count(&mut self, col: usize, remaining: Vec<BigInt>) -> BigUint {
        if remaining.iter().any(Signed::is_negative) {
            return BigUint::zero();
        }
        if col == self.columns.len() {
            return if remaining.iter().all(Zero::is_zero) {
                BigUint::one()
            } else {
                BigUint::zero()
            };
        }

        let key = (col, remaining);
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        let (_, remaining) = &key;

        let columns = self.columns;
        let column = &columns[col];
        let total = if col + 1 == self.columns.len() {
            // last column: x is forced
            Self::forced_multiple(column, remaining)
        } else {
            let bound = Self::max_multiple(column, remaining);
            let mut total = BigUint::zero();
            let mut x = BigInt::zero();
            let mut rest = remaining.clone();
            while x <= bound {
                total += self.count(col + 1, rest.clone());
                for (r, a) in rest.iter_mut().zip(column) {
                    *r -= a;
                }
                x += 1;
            }
            total
        };

        self.memo.insert(key, total.clone());
        total
    }

    /// Largest `x` with `x · column <= remaining`; `column` is nonzero
    fn max_multiple(column: &[BigInt], remaining: &[BigInt]) -> BigInt {
        column
            .iter()
            .zip(remaining)
            .filter(|(a, _)| a.is_positive())
            .map(|(a, r)| r / a)
            .min()
            .unwrap_or_default()
    }

    /// 1 if `remaining` is a nonnegative multiple of `column`, else 0
    fn forced_multiple(column: &[BigInt], remaining: &[BigInt]) -> BigUint {
        let x = Self::max_multiple(column, remaining);
        let exact = column.iter().zip(remaining).all(|(a, r)| &(a * &x) == r);
        if exact {
            BigUint::one()
        } else {
            BigUint::zero()
        }
    }
}
