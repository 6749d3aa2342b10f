//! HiGHS backend.

use ::highs::{Col, HighsModelStatus, RowProblem, Sense};
use tracing::{debug, warn};

use crate::error::{MilpError, MilpResult};
use crate::model::{ConstraintSense, Model};
use crate::solver::{FEASIBILITY_TOL, Solution, SolveParams, SolveStatus, Solver};

/// Solves models with the HiGHS branch-and-cut MILP solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver;

impl HighsSolver {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }

    fn to_problem(model: &Model) -> RowProblem {
        let mut problem = RowProblem::default();
        let cols: Vec<Col> = model
            .variables()
            .iter()
            .zip(model.objective())
            .map(|(var, &cost)| {
                if var.kind.is_integral() {
                    problem.add_integer_column(cost, var.lower..=var.upper)
                } else {
                    problem.add_column(cost, var.lower..=var.upper)
                }
            })
            .collect();

        for row in model.constraints() {
            let factors: Vec<(Col, f64)> = row
                .terms
                .iter()
                .map(|(v, c)| (cols[v.index()], *c))
                .collect();
            match row.sense {
                ConstraintSense::LessEq => {
                    problem.add_row(..=row.rhs, &factors);
                }
                ConstraintSense::GreaterEq => {
                    problem.add_row(row.rhs.., &factors);
                }
                ConstraintSense::Equal => {
                    problem.add_row(row.rhs..=row.rhs, &factors);
                }
            }
        }
        problem
    }

    /// Accept returned values only if they satisfy the model.
    fn incumbent(model: &Model, values: Vec<f64>, status: SolveStatus, raw: String) -> Solution {
        match model.first_violation(&values, FEASIBILITY_TOL) {
            None => Solution {
                status,
                objective: Some(model.objective_value(&values)),
                raw_status: raw,
                values,
            },
            Some(violation) => {
                debug!(status = %raw, %violation, "HiGHS returned no feasible incumbent");
                Solution::failed(SolveStatus::NoSolution, raw)
            }
        }
    }
}

impl Solver for HighsSolver {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, model: &Model, params: &SolveParams) -> MilpResult<Solution> {
        if model.num_vars() == 0 {
            // HiGHS reports empty models as `ModelEmpty`; evaluate directly.
            let status = if model.check_feasible(&[], FEASIBILITY_TOL) {
                SolveStatus::Optimal
            } else {
                SolveStatus::Infeasible
            };
            return Ok(Solution {
                status,
                raw_status: "ModelEmpty".into(),
                objective: status.is_success().then(|| model.objective_offset()),
                values: Vec::new(),
            });
        }

        let mut highs = Self::to_problem(model).optimise(Sense::Minimise);
        highs.set_option("output_flag", params.verbose);
        highs.set_option("random_seed", (params.random_seed % i32::MAX as u64) as i32);
        if let Some(limit) = params.time_limit {
            highs.set_option("time_limit", limit.max(0.0));
        }
        if let Some(threads) = params.threads {
            highs.set_option("threads", i32::try_from(threads).unwrap_or(i32::MAX));
        }

        debug!(model = model.name(), stats = %model.stats(), "Running HiGHS");
        let solved = highs
            .try_solve()
            .map_err(|status| MilpError::Backend(format!("{status:?}")))?;
        let model_status = solved.status();
        let raw = format!("{model_status:?}");

        let solution = match model_status {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                Self::incumbent(model, values, SolveStatus::Optimal, raw)
            }
            HighsModelStatus::ReachedTimeLimit
            | HighsModelStatus::ReachedIterationLimit => {
                let values = solved.get_solution().columns().to_vec();
                Self::incumbent(model, values, SolveStatus::Feasible, raw)
            }
            HighsModelStatus::Infeasible => Solution::failed(SolveStatus::Infeasible, raw),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Solution::failed(SolveStatus::Unbounded, raw)
            }
            _ => {
                warn!(status = %raw, "HiGHS stopped with an error status");
                Solution::failed(SolveStatus::Error, raw)
            }
        };
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LinExpr;

    #[test]
    fn test_small_knapsack() {
        let mut m = Model::new("knapsack");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        let c = m.add_binary("c");
        m.add_le("capacity", a * 3.0 + b * 2.0 + c * 2.0, 4.0).unwrap();
        m.set_objective(-(a * 5.0 + b * 3.0 + c * 3.0)).unwrap();

        let sol = HighsSolver::new().solve(&m, &SolveParams::default()).unwrap();
        assert_eq!(sol.status, SolveStatus::Optimal);
        assert!(!sol.is_set(a));
        assert!(sol.is_set(b) && sol.is_set(c));
        assert!((sol.objective.unwrap() + 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        let mut m = Model::new("infeasible");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        m.add_eq("both", LinExpr::from(a) + b, 3.0).unwrap();

        let sol = HighsSolver::new().solve(&m, &SolveParams::default()).unwrap();
        assert!(!sol.status.is_success());
        assert!(sol.values.is_empty());
    }

    #[test]
    fn test_fixed_variable_respected() {
        let mut m = Model::new("fixed");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        m.add_ge("cover", a + b, 1.0).unwrap();
        m.set_objective(a * 1.0 + b * 2.0).unwrap();
        m.fix(a, 0.0).unwrap();

        let sol = HighsSolver::new().solve(&m, &SolveParams::default()).unwrap();
        assert_eq!(sol.status, SolveStatus::Optimal);
        assert!(sol.is_set(b));
        assert!((sol.objective.unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_model() {
        let m = Model::new("empty");
        let sol = HighsSolver::new().solve(&m, &SolveParams::default()).unwrap();
        assert_eq!(sol.status, SolveStatus::Optimal);
        assert_eq!(sol.objective, Some(0.0));
    }
}
