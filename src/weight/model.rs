//! Weight model for GL(d_1) x ... x GL(d_n)
//!
//! Weight multiplicities of Sym(C^{d_1} ⊗ ... ⊗ C^{d_n}) with respect to the
//! maximal torus are values of the vector partition function
//!
//! ```text
//! phi_A(b) = #{ x >= 0 integral : A x = b }
//! ```
//!
//! where `A` has one column per multi-index `(i_1, ..., i_n)` and one row per
//! coordinate of each factor. This module builds `A`, flattens per-factor
//! weights into `b`, and lists the positive roots used by the finite-difference
//! formula.

use crate::error::{EvaluatorError, KroneckerError};
use crate::evaluator::Evaluator;
use crate::weight::Weight;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};

/// Matrix `A` of a vector partition function
///
/// Entries are nonnegative. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMatrix {
    rows: Vec<Vec<BigInt>>,
    cols: usize,
}

impl PartitionMatrix {
    /// Build a matrix from explicit rows
    ///
    /// Rejects an empty matrix, ragged rows and negative entries.
    pub fn from_rows<T: Into<BigInt>>(rows: Vec<Vec<T>>) -> Result<Self, KroneckerError> {
        let rows: Vec<Vec<BigInt>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();

        let cols = match rows.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(KroneckerError::InvalidDimensions("partition matrix is empty".to_string())),
        };

        if let Some(i) = rows.iter().position(|row| row.len() != cols) {
            return Err(KroneckerError::InvalidDimensions(format!(
                "row {} has {} entries, expected {}",
                i,
                rows[i].len(),
                cols
            )));
        }

        if rows.iter().flatten().any(|entry| entry.is_negative()) {
            return Err(KroneckerError::InvalidDimensions(
                "partition matrix entries must be nonnegative".to_string(),
            ));
        }

        Ok(Self { rows, cols })
    }

    /// Number of rows (length of admissible points)
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (number of unknowns)
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols)
    }

    pub fn row(&self, i: usize) -> &[BigInt] {
        &self.rows[i]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[BigInt]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Entry `A[i][j]`
    pub fn get(&self, i: usize, j: usize) -> &BigInt {
        &self.rows[i][j]
    }

    /// Evaluate the partition function at `point` using `evaluator`
    pub fn evaluate(&self, point: &Weight, evaluator: &dyn Evaluator) -> Result<BigUint, EvaluatorError> {
        if point.len() != self.rows() {
            return Err(EvaluatorError::DimensionMismatch {
                expected: self.rows(),
                got: point.len(),
            });
        }
        evaluator.evaluate(self, point)
    }
}

/// Build the partition matrix for the tuple of dimensions `dims`
///
/// Columns follow the lexicographic order of multi-indices (last factor
/// varies fastest). Row `offset(i) + c` has a 1 in every column whose
/// multi-index has value `c` in slot `i`.
pub fn build_partition_matrix(dims: &[usize]) -> Result<PartitionMatrix, KroneckerError> {
    validate_dims(dims)?;

    let cols = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| KroneckerError::InvalidDimensions(format!("too many monomials for dimensions {:?}", dims)))?;
    let rank: usize = dims.iter().sum();

    let mut rows = vec![vec![BigInt::zero(); cols]; rank];
    let mut multi_index = vec![0usize; dims.len()];

    for col in 0..cols {
        let mut offset = 0;
        for (slot, &dim) in dims.iter().enumerate() {
            rows[offset + multi_index[slot]][col] = BigInt::one();
            offset += dim;
        }
        advance(&mut multi_index, dims);
    }

    Ok(PartitionMatrix { rows, cols })
}

/// Odometer step over `d_1 x ... x d_n`, last slot fastest
fn advance(multi_index: &mut [usize], dims: &[usize]) {
    for slot in (0..dims.len()).rev() {
        multi_index[slot] += 1;
        if multi_index[slot] < dims[slot] {
            return;
        }
        multi_index[slot] = 0;
    }
}

fn validate_dims(dims: &[usize]) -> Result<(), KroneckerError> {
    if dims.is_empty() {
        return Err(KroneckerError::InvalidDimensions("need at least one factor".to_string()));
    }
    if dims.contains(&0) {
        return Err(KroneckerError::InvalidDimensions(format!(
            "every factor needs positive dimension, got {:?}",
            dims
        )));
    }
    Ok(())
}

/// Dimensions of the factor groups, one per component
pub fn dims_of(components: &[Weight]) -> Vec<usize> {
    components.iter().map(Weight::len).collect()
}

/// Concatenate per-factor weights into one vector of length Σd_i
///
/// Every component must have the same degree (number of boxes).
pub fn flatten_weight(components: &[Weight]) -> Result<Weight, KroneckerError> {
    if components.is_empty() {
        return Err(KroneckerError::InvalidDimensions("need at least one component".to_string()));
    }

    let degrees: Vec<BigInt> = components.iter().map(Weight::degree).collect();
    if degrees.iter().any(|d| d != &degrees[0]) {
        return Err(KroneckerError::InconsistentDegree { degrees });
    }

    Ok(components.iter().flat_map(|c| c.iter().cloned()).collect())
}

/// Positive roots of GL(d_1) x ... x GL(d_n)
///
/// For each factor and each pair of slots `i < j` the root has +1 at the
/// global offset of `i` and -1 at that of `j`. There are Σ C(d_k, 2) roots.
pub fn positive_roots(dims: &[usize]) -> Vec<Weight> {
    let rank: usize = dims.iter().sum();
    let mut roots = Vec::new();
    let mut offset = 0;

    for &dim in dims {
        for i in 0..dim {
            for j in (i + 1)..dim {
                let mut entries = vec![BigInt::zero(); rank];
                entries[offset + i] = BigInt::one();
                entries[offset + j] = -BigInt::one();
                roots.push(Weight::new(entries));
            }
        }
        offset += dim;
    }

    roots
}

/// Fail unless `highest_weight · root >= 0` for every root
pub fn check_dominant(highest_weight: &Weight, roots: &[Weight]) -> Result<(), KroneckerError> {
    for root in roots {
        let inner_product = highest_weight.dot(root);
        if inner_product.is_negative() {
            return Err(KroneckerError::NotDominant {
                root: root.clone(),
                inner_product,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(entries: &[i64]) -> Weight {
        entries.iter().copied().collect()
    }

    fn as_i64(matrix: &PartitionMatrix) -> Vec<Vec<i64>> {
        matrix
            .iter_rows()
            .map(|row| row.iter().map(|e| i64::try_from(e).unwrap()).collect())
            .collect()
    }

    #[test]
    fn test_partition_matrix_2_2_2() {
        let matrix = build_partition_matrix(&[2, 2, 2]).unwrap();
        assert_eq!(
            as_i64(&matrix),
            vec![
                vec![1, 1, 1, 1, 0, 0, 0, 0],
                vec![0, 0, 0, 0, 1, 1, 1, 1],
                vec![1, 1, 0, 0, 1, 1, 0, 0],
                vec![0, 0, 1, 1, 0, 0, 1, 1],
                vec![1, 0, 1, 0, 1, 0, 1, 0],
                vec![0, 1, 0, 1, 0, 1, 0, 1],
            ]
        );
    }

    #[test]
    fn test_partition_matrix_2_3() {
        let matrix = build_partition_matrix(&[2, 3]).unwrap();
        assert_eq!(matrix.shape(), (5, 6));
        assert_eq!(
            as_i64(&matrix),
            vec![
                vec![1, 1, 1, 0, 0, 0],
                vec![0, 0, 0, 1, 1, 1],
                vec![1, 0, 0, 1, 0, 0],
                vec![0, 1, 0, 0, 1, 0],
                vec![0, 0, 1, 0, 0, 1],
            ]
        );
    }

    #[test]
    fn test_partition_matrix_shape() {
        let matrix = build_partition_matrix(&[3, 2, 4]).unwrap();
        assert_eq!(matrix.shape(), (9, 24));
        // every column has exactly one 1 per factor
        for col in 0..matrix.cols() {
            let ones: BigInt = (0..matrix.rows()).map(|r| matrix.get(r, col).clone()).sum();
            assert_eq!(ones, BigInt::from(3));
        }
    }

    #[test]
    fn test_invalid_dims() {
        assert!(matches!(build_partition_matrix(&[]), Err(KroneckerError::InvalidDimensions(_))));
        assert!(matches!(build_partition_matrix(&[2, 0]), Err(KroneckerError::InvalidDimensions(_))));
    }

    #[test]
    fn test_from_rows_validation() {
        let matrix = PartitionMatrix::from_rows(vec![vec![1, 0], vec![0, 1], vec![1, 1]]).unwrap();
        assert_eq!(matrix.shape(), (3, 2));

        assert!(PartitionMatrix::from_rows(vec![vec![1, 0], vec![1]]).is_err());
        assert!(PartitionMatrix::from_rows(vec![vec![1, -1]]).is_err());
        assert!(PartitionMatrix::from_rows(Vec::<Vec<i64>>::new()).is_err());
    }

    #[test]
    fn test_flatten_weight() {
        let v = flatten_weight(&[w(&[3, 8]), w(&[5, 6]), w(&[6, 5])]).unwrap();
        assert_eq!(v, w(&[3, 8, 5, 6, 6, 5]));
    }

    #[test]
    fn test_flatten_weight_inconsistent_degree() {
        match flatten_weight(&[w(&[3, 8]), w(&[5, 5])]) {
            Err(KroneckerError::InconsistentDegree { degrees }) => {
                assert_eq!(degrees, vec![BigInt::from(11), BigInt::from(10)]);
            }
            other => panic!("expected InconsistentDegree, got {:?}", other),
        }
    }

    #[test]
    fn test_positive_roots() {
        assert_eq!(
            positive_roots(&[2, 2, 2]),
            vec![
                w(&[1, -1, 0, 0, 0, 0]),
                w(&[0, 0, 1, -1, 0, 0]),
                w(&[0, 0, 0, 0, 1, -1]),
            ]
        );
    }

    #[test]
    fn test_positive_roots_count() {
        // C(3,2) + C(1,2) + C(4,2)
        assert_eq!(positive_roots(&[3, 1, 4]).len(), 3 + 0 + 6);
        assert_eq!(positive_roots(&[3, 1, 4])[0], w(&[1, -1, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn test_dominance() {
        let dims = [2, 2, 2];
        let roots = positive_roots(&dims);

        let dominant = flatten_weight(&[w(&[1, 0]), w(&[1, 0]), w(&[1, 0])]).unwrap();
        assert!(check_dominant(&dominant, &roots).is_ok());

        let not_dominant = flatten_weight(&[w(&[1, 0]), w(&[0, 1]), w(&[2, -1])]).unwrap();
        match check_dominant(&not_dominant, &roots) {
            Err(KroneckerError::NotDominant { root, inner_product }) => {
                assert_eq!(root, w(&[0, 0, 1, -1, 0, 0]));
                assert_eq!(inner_product, BigInt::from(-1));
            }
            other => panic!("expected NotDominant, got {:?}", other),
        }
    }
}
