//! Solver-neutral mixed-integer linear programming models.
//!
//! A [`Model`] owns its columns and rows. Variables are referred to by
//! [`VarId`] handles returned at creation time and combined into
//! [`LinExpr`] values with ordinary arithmetic. A [`Solver`] backend
//! minimizes the model and returns a [`Solution`].
//!
//! # Example
//!
//! ```
//! use bipmap_milp::Model;
//!
//! let mut model = Model::new("cover");
//! let a = model.add_binary("a");
//! let b = model.add_binary("b");
//! model.add_ge("cover", a + b, 1.0).unwrap();
//! model.set_objective(a * 1.0 + b * 2.0).unwrap();
//!
//! assert!(model.check_feasible(&[1.0, 0.0], 1e-9));
//! assert_eq!(model.objective_value(&[1.0, 0.0]), 1.0);
//! ```
//!
//! # Backends
//!
//! - `highs` (default feature): HiGHS via the `highs` crate.

pub mod error;
pub mod expr;
#[cfg(feature = "highs")]
pub mod highs;
pub mod model;
pub mod solver;

pub use error::{MilpError, MilpResult};
pub use expr::{LinExpr, VarId};
#[cfg(feature = "highs")]
pub use self::highs::HighsSolver;
pub use model::{Constraint, ConstraintSense, Model, ModelStats, VarKind, Variable};
pub use solver::{FEASIBILITY_TOL, Solution, SolveParams, SolveStatus, Solver, default_solver};
