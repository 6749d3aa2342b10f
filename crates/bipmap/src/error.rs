//! Error types for routing.

use bipmap_milp::MilpError;
use thiserror::Error;

use crate::driver::Stage;

/// Errors that can occur while routing a circuit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RoutingError {
    /// Inconsistent inputs: qubit counts, topology, split count, calibration,
    /// or configuration values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Objective tag that is not one of `depth`, `gate_error`, `balanced`.
    #[error("Unknown objective '{0}' (expected depth, gate_error or balanced)")]
    UnknownObjective(String),

    /// The solver returned no usable solution.
    #[error("Solve failed during {stage}: solver status {status}")]
    Solve {
        /// Model that failed.
        stage: Stage,
        /// Solver status string, verbatim.
        status: String,
    },

    /// A required backend was not compiled in.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// The decoded solution failed verification.
    #[error("Inconsistent solution: {0}")]
    Solution(String),

    /// Error from the underlying model.
    #[error(transparent)]
    Milp(MilpError),
}

impl From<MilpError> for RoutingError {
    fn from(err: MilpError) -> Self {
        match err {
            MilpError::MissingBackend(msg) => RoutingError::MissingDependency(msg),
            other => RoutingError::Milp(other),
        }
    }
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;
