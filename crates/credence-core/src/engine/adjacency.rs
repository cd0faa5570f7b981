//! Row-stochastic adjacency matrices.
//!
//! Each row of the binary adjacency matrix is divided by its row sum, giving
//! the random-walk transition matrix used by both estimators. Isolated nodes
//! keep an all-zero row instead of dividing by zero.

use crate::engine::errors::CredenceError;
use crate::engine::graph::TrustGraph;
use crate::engine::matrix::DenseMatrix;

/// Binary N×N adjacency matrix of `graph` (symmetric, 1.0 per edge).
pub fn binary_adjacency(graph: &TrustGraph) -> Result<DenseMatrix, CredenceError> {
    if graph.is_empty() {
        return Err(CredenceError::ValidationError(
            "adjacency: graph has no nodes".into(),
        ));
    }
    let n = graph.len();
    let mut a = DenseMatrix::zeros(n, n);
    for (src, dst) in graph.edges() {
        a.set(src.index(), dst.index(), 1.0);
        a.set(dst.index(), src.index(), 1.0);
    }
    Ok(a)
}

/// Row-normalized adjacency matrix of `graph`.
pub fn normalize(graph: &TrustGraph) -> Result<DenseMatrix, CredenceError> {
    let mut a = binary_adjacency(graph)?;
    row_normalize(&mut a)?;
    Ok(a)
}

/// Divides each row of a non-negative square matrix by its sum.
///
/// Rows summing to zero are left as all-zero.
pub fn row_normalize(a: &mut DenseMatrix) -> Result<(), CredenceError> {
    if !a.is_square() {
        return Err(CredenceError::DimensionMismatch(format!(
            "adjacency must be square, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    if a.as_slice().iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(CredenceError::Numerical(
            "adjacency entries must be finite and non-negative".into(),
        ));
    }
    for r in 0..a.rows() {
        let row = a.row_mut(r);
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            for v in row.iter_mut() {
                *v /= sum;
            }
        }
    }
    Ok(())
}
