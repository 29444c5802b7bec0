//! Finite-difference decomposition
//!
//! The weight multiplicity of an irreducible with highest weight λ is
//!
//! ```text
//! m(λ) = Σ_i c_i · phi_A(λ + s_i)
//! ```
//!
//! where `Σ c_i · T(s_i)` is the expansion of `∏_{roots} (1 - T(root))`, with
//! `T` the translation operator. [`expand`] computes that expansion.
//!
//! Expanding naively doubles the list for every root. Terms are accumulated in
//! a map keyed by shift instead, so cancellation happens as soon as two paths
//! reach the same shift and peak memory stays at the number of distinct
//! shifts.

use crate::weight::Weight;
use num_bigint::BigInt;
use num_traits::{One, Zero};
use std::collections::HashMap;

/// One term `coefficient · T(shift)` of the expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompositionTerm {
    pub coefficient: BigInt,
    pub shift: Weight,
}

/// Expand `∏ (1 - T(root))` into a sparse list of weighted shifts
///
/// `rank` is the length of every root (and of the returned shifts), needed so
/// that an empty root list still yields the identity term. Shifts in the
/// result are unique and coefficients nonzero. Order is unspecified.
pub fn expand(rank: usize, roots: &[Weight]) -> Vec<DecompositionTerm> {
    let mut terms: HashMap<Weight, BigInt> = HashMap::new();
    terms.insert(Weight::zero(rank), BigInt::one());

    for root in roots {
        debug_assert_eq!(root.len(), rank, "root {} does not have rank {}", root, rank);

        let mut next = terms.clone();
        for (shift, coefficient) in &terms {
            let target = shift + root;
            let entry = next.entry(target).or_insert_with(BigInt::zero);
            *entry -= coefficient;
        }
        next.retain(|_, coefficient| !coefficient.is_zero());
        terms = next;
    }

    // Collapsing preserves the coefficient sum, which telescopes to
    // Π(1 - 1) = 0 as soon as there is at least one root.
    debug_assert!(
        roots.is_empty() || terms.values().sum::<BigInt>().is_zero(),
        "finite differences do not telescope"
    );

    terms
        .into_iter()
        .map(|(shift, coefficient)| DecompositionTerm { coefficient, shift })
        .collect()
}
