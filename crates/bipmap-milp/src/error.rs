//! Error types for the MILP crate.

use thiserror::Error;

use crate::expr::VarId;

/// Errors that can occur while building or solving a model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MilpError {
    /// A variable handle does not belong to the model.
    #[error("Unknown variable {0:?}")]
    UnknownVariable(VarId),

    /// Lower bound exceeds upper bound, or a bound is NaN.
    #[error("Invalid bounds for '{name}': [{lower}, {upper}]")]
    InvalidBounds {
        /// Name of the offending variable.
        name: String,
        /// Requested lower bound.
        lower: f64,
        /// Requested upper bound.
        upper: f64,
    },

    /// The backend rejected the model or crashed while solving.
    #[error("Solver backend error: {0}")]
    Backend(String),

    /// No solver backend was compiled into this build.
    #[error("No MILP backend available: {0}")]
    MissingBackend(String),
}

/// Result type for MILP operations.
pub type MilpResult<T> = Result<T, MilpError>;
