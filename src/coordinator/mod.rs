//! Serial coordinator
//!
//! Turns a tuple of partitions into a list of [`WorkItem`]s and sums their
//! weighted evaluations. The distributed master builds the same
//! [`WorkPlan`]; only the way items are consumed differs.

use crate::error::{EvaluatorError, KroneckerError};
use crate::evaluator::Evaluator;
use crate::findiff;
use crate::weight::{
    build_partition_matrix, check_dominant, dims_of, flatten_weight, positive_roots, PartitionMatrix, Weight,
};
use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One evaluation task: `coefficient · phi_A(weight)`
///
/// `index` runs from 1 to `total` and identifies the item within its plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub index: usize,
    pub total: usize,
    pub coefficient: BigInt,
    pub weight: Weight,
}

impl WorkItem {
    /// Evaluate the item and weight the count by its coefficient
    pub fn evaluate(&self, matrix: &PartitionMatrix, evaluator: &dyn Evaluator) -> Result<BigInt, EvaluatorError> {
        let count = matrix.evaluate(&self.weight, evaluator)?;
        Ok(&self.coefficient * BigInt::from(count))
    }
}

/// Everything needed to evaluate a Kronecker coefficient
#[derive(Debug, Clone)]
pub struct WorkPlan {
    pub dims: Vec<usize>,
    pub matrix: PartitionMatrix,
    pub highest_weight: Weight,
    pub items: Vec<WorkItem>,
}

impl WorkPlan {
    /// Build the partition matrix, check dominance and expand the finite
    /// differences into work items
    pub fn prepare(partitions: &[Weight]) -> Result<Self, KroneckerError> {
        let dims = dims_of(partitions);
        let matrix = build_partition_matrix(&dims)?;
        let highest_weight = flatten_weight(partitions)?;

        let roots = positive_roots(&dims);
        check_dominant(&highest_weight, &roots)?;

        let terms = findiff::expand(highest_weight.len(), &roots);
        let total = terms.len();
        let items = terms
            .into_iter()
            .enumerate()
            .map(|(i, term)| WorkItem {
                index: i + 1,
                total,
                coefficient: term.coefficient,
                weight: &highest_weight + &term.shift,
            })
            .collect();

        info!(
            "partition matrix {}x{}, {} positive roots, {} work items",
            matrix.rows(),
            matrix.cols(),
            roots.len(),
            total
        );

        Ok(Self {
            dims,
            matrix,
            highest_weight,
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Compute the Kronecker coefficient of `partitions` in this process
///
/// The first evaluator failure aborts the computation.
pub fn compute_coefficient(partitions: &[Weight], evaluator: &dyn Evaluator) -> Result<BigInt, KroneckerError> {
    let plan = WorkPlan::prepare(partitions)?;

    let mut results = Vec::with_capacity(plan.len());
    for item in &plan.items {
        info!(
            "({:3}/{:3}) computing multiplicity of {} (coefficient {})",
            item.index, item.total, item.weight, item.coefficient
        );
        results.push(item.evaluate(&plan.matrix, evaluator)?);
    }

    Ok(accumulate(results))
}

/// Multiplicity of a single weight in the symmetric algebra
///
/// No dominance check and no finite differences: the flattened weight is
/// evaluated as is.
pub fn compute_weight_multiplicity(weights: &[Weight], evaluator: &dyn Evaluator) -> Result<BigUint, KroneckerError> {
    let dims = dims_of(weights);
    let matrix = build_partition_matrix(&dims)?;
    let point = flatten_weight(weights)?;

    info!("computing multiplicity of {}", point);
    Ok(matrix.evaluate(&point, evaluator)?)
}

/// Sum weighted results in any order
pub fn accumulate<I>(results: I) -> BigInt
where
    I: IntoIterator<Item = BigInt>,
{
    results.into_iter().sum()
}
