//! Error types for credence estimation.

use thiserror::Error;

/// Errors that can occur while loading graphs or estimating veracity.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Degenerate inputs that have a defined answer (isolated nodes, nodes with no
/// Katz weight toward evidence) are not errors. Only caller contract
/// violations and budget exhaustion are reported here.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CredenceError {
    /// Syntax or structure error in a graph document.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Caller contract violation (e.g., evidence index outside the graph).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Matrix or vector shapes that cannot be combined.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Numerical stability error (NaN/Inf in inputs or intermediate values).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// The optimizer exhausted its iteration or time budget.
    #[error("propagation did not converge after {iterations} iterations (last step {last_step:e})")]
    NonConvergence { iterations: usize, last_step: f64 },

    /// I/O failure while reading a graph document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for CredenceError {
    fn from(err: serde_json::Error) -> Self {
        CredenceError::ParseError(err.to_string())
    }
}
