//! # Credence Core
//!
//! Veracity estimation for nodes of a social graph from a sparse set of
//! nodes with known veracity. Two estimators are provided: box-constrained
//! collective regression solved by gradient descent, and a truncated Katz
//! similarity average.

#![forbid(unsafe_code)]

pub mod engine;
pub mod storage;

// Re-export commonly used types
pub use engine::adjacency::normalize;
pub use engine::errors::CredenceError;
pub use engine::evidence::{partition, EvidenceSelection, EvidenceSet, Partition};
pub use engine::graph::{NodeId, ObservationCounts, TrustGraph};
pub use engine::katz::{katz_predict, predict_veracity_truncated_katz, KatzConfig};
pub use engine::matrix::DenseMatrix;
pub use engine::prediction::VeracityPrediction;
pub use engine::propagation::{
    predict_veracity_collective_regression, propagate, PropagationConfig, PropagationOutcome,
};
pub use engine::query::{answer_all, answer_query, EvidenceSnapshot, QueryAnswer, QueryConfig, Strategy};
pub use storage::load_graph;
