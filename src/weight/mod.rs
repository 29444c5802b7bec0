//! Weights and the weight model
//!
//! A [`Weight`] is an ordered vector of arbitrary-precision integers. Partition
//! entries are stretched by factors past 10^20 in practice, so every entry is a
//! `BigInt`; fixed-width integers would silently wrap.
//!
//! # Modules
//!
//! - `model`: partition matrix, flattening, positive roots and the dominance check

pub mod model;

pub use model::{
    build_partition_matrix,
    check_dominant,
    dims_of,
    flatten_weight,
    positive_roots,
    PartitionMatrix,
};

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Integer weight vector
///
/// Immutable once built: arithmetic returns new weights. `Eq + Hash` make it
/// usable as a map key when collapsing finite differences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weight(Vec<BigInt>);

impl Weight {
    pub fn new(entries: Vec<BigInt>) -> Self {
        Self(entries)
    }

    /// Zero vector of the given length
    pub fn zero(len: usize) -> Self {
        Self(vec![BigInt::zero(); len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[BigInt] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BigInt> {
        self.0.iter()
    }

    /// Sum of entries (number of boxes for a partition)
    pub fn degree(&self) -> BigInt {
        self.0.iter().sum()
    }

    /// Inner product with another weight of the same length
    pub fn dot(&self, other: &Weight) -> BigInt {
        debug_assert_eq!(self.len(), other.len(), "dot product of weights with different lengths");
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }
}

impl Add for &Weight {
    type Output = Weight;

    fn add(self, rhs: &Weight) -> Weight {
        debug_assert_eq!(self.len(), rhs.len(), "adding weights with different lengths");
        Weight(self.0.iter().zip(rhs.0.iter()).map(|(a, b)| a + b).collect())
    }
}

impl<T: Into<BigInt>> FromIterator<T> for Weight {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<BigInt>> for Weight {
    fn from(entries: Vec<BigInt>) -> Self {
        Self(entries)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", entry)?;
        }
        write!(f, "]")
    }
}
