//! Veracity estimation over trust graphs.
//!
//! This module provides:
//! - **graph**: Node table, undirected adjacency and name lookup
//! - **adjacency**: Row-stochastic normalization
//! - **evidence**: Evidence sets and the unknown/evidence partition
//! - **propagation**: Collective-regression gradient descent
//! - **katz**: Truncated Katz similarity estimator
//! - **query**: Ego queries against an evidence snapshot

pub mod adjacency;
pub mod errors;
pub mod evidence;
pub mod graph;
pub mod katz;
pub mod matrix;
pub mod prediction;
pub mod propagation;
pub mod query;
