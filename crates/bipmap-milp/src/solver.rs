//! Solver interface and solve results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MilpResult;
use crate::expr::VarId;
use crate::model::Model;

/// Tolerance for accepting values returned by a backend.
pub const FEASIBILITY_TOL: f64 = 1e-6;

/// Limits and hints passed unchanged to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveParams {
    /// Wall-clock limit in seconds.
    pub time_limit: Option<f64>,
    /// Worker thread hint.
    pub threads: Option<u32>,
    /// Seed for randomized tie-breaking.
    pub random_seed: u64,
    /// Let the backend print its log.
    pub verbose: bool,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            time_limit: None,
            threads: None,
            random_seed: 777,
            verbose: false,
        }
    }
}

impl SolveParams {
    /// Set the time limit.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Set the thread hint.
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

/// Outcome class of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible incumbent, optimality not proven (e.g. time limit).
    Feasible,
    /// Proven infeasible.
    Infeasible,
    /// Unbounded, or infeasible-or-unbounded.
    Unbounded,
    /// Stopped without a feasible incumbent.
    NoSolution,
    /// Backend error.
    Error,
}

impl SolveStatus {
    /// Whether the solution carries usable values.
    pub fn is_success(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::NoSolution => "no solution",
            SolveStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Values returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Normalized status.
    pub status: SolveStatus,
    /// Backend status string, verbatim.
    pub raw_status: String,
    /// Objective value, if a solution exists.
    pub objective: Option<f64>,
    /// Column values, empty unless the status is a success.
    pub values: Vec<f64>,
}

impl Solution {
    /// A solution without values.
    pub fn failed(status: SolveStatus, raw_status: impl Into<String>) -> Self {
        Self {
            status,
            raw_status: raw_status.into(),
            objective: None,
            values: Vec::new(),
        }
    }

    /// Value of a variable, zero if absent.
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Whether a binary variable is set.
    pub fn is_set(&self, var: VarId) -> bool {
        self.value(var) > 0.5
    }
}

/// A MILP backend.
pub trait Solver {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Minimize `model` under `params`.
    ///
    /// Infeasibility and time-outs are reported through
    /// [`Solution::status`]; `Err` is reserved for backend failures.
    fn solve(&self, model: &Model, params: &SolveParams) -> MilpResult<Solution>;
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&self, model: &Model, params: &SolveParams) -> MilpResult<Solution> {
        (**self).solve(model, params)
    }
}

/// The backend compiled into this build.
#[cfg(feature = "highs")]
pub fn default_solver() -> MilpResult<Box<dyn Solver>> {
    Ok(Box::new(crate::highs::HighsSolver::new()))
}

/// The backend compiled into this build.
#[cfg(not(feature = "highs"))]
pub fn default_solver() -> MilpResult<Box<dyn Solver>> {
    Err(crate::error::MilpError::MissingBackend(
        "bipmap-milp was built without the `highs` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let p = SolveParams::default();
        assert_eq!(p.random_seed, 777);
        assert!(p.time_limit.is_none());
        let p = p.with_time_limit(2.5).with_threads(4).with_seed(1);
        assert_eq!(p.time_limit, Some(2.5));
        assert_eq!(p.threads, Some(4));
        assert_eq!(p.random_seed, 1);
    }

    #[test]
    fn test_status_success() {
        assert!(SolveStatus::Optimal.is_success());
        assert!(SolveStatus::Feasible.is_success());
        assert!(!SolveStatus::NoSolution.is_success());
        assert!(!SolveStatus::Infeasible.is_success());
    }

    #[test]
    fn test_solution_values() {
        let s = Solution {
            status: SolveStatus::Optimal,
            raw_status: "Optimal".into(),
            objective: Some(1.0),
            values: vec![0.0, 0.9999],
        };
        assert!(!s.is_set(VarId(0)));
        assert!(s.is_set(VarId(1)));
        assert_eq!(s.value(VarId(7)), 0.0);
    }
}
