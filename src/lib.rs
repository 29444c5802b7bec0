//! kronvpf - Kronecker coefficients via vector partition functions
//!
//! Computes generalized Kronecker coefficients `g(λ¹, …, λⁿ)` as a signed sum
//! of vector partition function values, following the finite-difference
//! formula over the positive roots of `gl(d₁) × … × gl(dₙ)`.
//!
//! # Architecture
//!
//! - **Weights**: arbitrary-precision weight vectors and the partition matrix
//! - **Finite differences**: expansion of the product over positive roots
//! - **Evaluators**: barvinok, LattE or in-process enumeration
//! - **Coordinator**: work plan, serial evaluation and summation
//! - **Distributed mode**: a master hands items to authenticated workers over TCP

pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod evaluator;
pub mod findiff;
pub mod output;
pub mod weight;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{compute_coefficient, compute_weight_multiplicity, WorkItem, WorkPlan};
pub use error::{EvaluatorError, KroneckerError};
pub use evaluator::Evaluator;
pub use weight::{PartitionMatrix, Weight};

/// Result type used throughout kronvpf
pub type Result<T> = anyhow::Result<T>;
