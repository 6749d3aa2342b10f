//! Solver-neutral MILP model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MilpError, MilpResult};
use crate::expr::{LinExpr, VarId};

/// Domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    /// Integer in `{0, 1}`.
    Binary,
    /// Integer within bounds.
    Integer,
    /// Real within bounds.
    Continuous,
}

impl VarKind {
    /// Whether the backend must enforce integrality.
    pub fn is_integral(self) -> bool {
        !matches!(self, VarKind::Continuous)
    }
}

/// A model column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Human-readable name, for diagnostics and export only.
    pub name: String,
    /// Domain of the variable.
    pub kind: VarKind,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Variable {
    /// Whether lower and upper bounds coincide.
    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }
}

/// Sense of a constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintSense {
    /// `lhs ≤ rhs`
    LessEq,
    /// `lhs ≥ rhs`
    GreaterEq,
    /// `lhs = rhs`
    Equal,
}

impl fmt::Display for ConstraintSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintSense::LessEq => "<=",
            ConstraintSense::GreaterEq => ">=",
            ConstraintSense::Equal => "=",
        };
        f.write_str(s)
    }
}

/// A model row `Σ coef·var (sense) rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Row name.
    pub name: String,
    /// Merged, sorted terms.
    pub terms: Vec<(VarId, f64)>,
    /// Row sense.
    pub sense: ConstraintSense,
    /// Right-hand side.
    pub rhs: f64,
}

impl Constraint {
    /// Left-hand side value under `values`.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values.get(v.index()).copied().unwrap_or(0.0))
            .sum()
    }

    /// Whether the row holds under `values` within `tol`.
    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.activity(values);
        match self.sense {
            ConstraintSense::LessEq => lhs <= self.rhs + tol,
            ConstraintSense::GreaterEq => lhs >= self.rhs - tol,
            ConstraintSense::Equal => (lhs - self.rhs).abs() <= tol,
        }
    }
}

/// Size summary of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    /// Number of columns.
    pub variables: usize,
    /// Number of integral columns.
    pub integers: usize,
    /// Number of columns with equal bounds.
    pub fixed: usize,
    /// Number of rows.
    pub constraints: usize,
    /// Number of nonzero row coefficients.
    pub nonzeros: usize,
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} variables ({} integer, {} fixed), {} constraints, {} nonzeros",
            self.variables, self.integers, self.fixed, self.constraints, self.nonzeros
        )
    }
}

/// A minimization MILP: columns, rows, and a linear objective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Vec<f64>,
    objective_offset: f64,
}

impl Model {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a binary variable.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.push_var(Variable {
            name: name.into(),
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
        })
    }

    /// Add a variable of arbitrary kind and bounds.
    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lower: f64,
        upper: f64,
    ) -> MilpResult<VarId> {
        let name = name.into();
        check_bounds(&name, lower, upper)?;
        Ok(self.push_var(Variable {
            name,
            kind,
            lower,
            upper,
        }))
    }

    fn push_var(&mut self, var: Variable) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(var);
        self.objective.push(0.0);
        id
    }

    /// Add `lhs ≤ rhs`.
    pub fn add_le(
        &mut self,
        name: impl Into<String>,
        lhs: impl Into<LinExpr>,
        rhs: impl Into<LinExpr>,
    ) -> MilpResult<()> {
        self.add_constraint(name, lhs.into() - rhs.into(), ConstraintSense::LessEq)
    }

    /// Add `lhs ≥ rhs`.
    pub fn add_ge(
        &mut self,
        name: impl Into<String>,
        lhs: impl Into<LinExpr>,
        rhs: impl Into<LinExpr>,
    ) -> MilpResult<()> {
        self.add_constraint(name, lhs.into() - rhs.into(), ConstraintSense::GreaterEq)
    }

    /// Add `lhs = rhs`.
    pub fn add_eq(
        &mut self,
        name: impl Into<String>,
        lhs: impl Into<LinExpr>,
        rhs: impl Into<LinExpr>,
    ) -> MilpResult<()> {
        self.add_constraint(name, lhs.into() - rhs.into(), ConstraintSense::Equal)
    }

    /// Add `expr (sense) 0`, moving the constant to the right-hand side.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinExpr,
        sense: ConstraintSense,
    ) -> MilpResult<()> {
        let (terms, constant) = expr.normalized().into_parts();
        for (var, _) in &terms {
            self.check_var(*var)?;
        }
        self.constraints.push(Constraint {
            name: name.into(),
            terms,
            sense,
            rhs: -constant,
        });
        Ok(())
    }

    /// Replace the objective.
    pub fn set_objective(&mut self, expr: LinExpr) -> MilpResult<()> {
        self.objective.iter_mut().for_each(|c| *c = 0.0);
        self.objective_offset = 0.0;
        self.add_objective(expr)
    }

    /// Add `expr` to the objective.
    pub fn add_objective(&mut self, expr: LinExpr) -> MilpResult<()> {
        let (terms, constant) = expr.into_parts();
        for (var, coef) in terms {
            self.add_objective_term(var, coef)?;
        }
        self.objective_offset += constant;
        Ok(())
    }

    /// Add `coef·var` to the objective.
    pub fn add_objective_term(&mut self, var: VarId, coef: f64) -> MilpResult<()> {
        self.check_var(var)?;
        self.objective[var.index()] += coef;
        Ok(())
    }

    /// Fix a variable to `value`.
    pub fn fix(&mut self, var: VarId, value: f64) -> MilpResult<()> {
        self.set_bounds(var, value, value)
    }

    /// Replace the bounds of a variable.
    pub fn set_bounds(&mut self, var: VarId, lower: f64, upper: f64) -> MilpResult<()> {
        self.check_var(var)?;
        let v = &mut self.variables[var.index()];
        check_bounds(&v.name, lower, upper)?;
        v.lower = lower;
        v.upper = upper;
        Ok(())
    }

    /// Look up a variable.
    pub fn variable(&self, var: VarId) -> MilpResult<&Variable> {
        self.variables
            .get(var.index())
            .ok_or(MilpError::UnknownVariable(var))
    }

    /// All variables in column order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// All constraints in row order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Dense objective coefficients in column order.
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    /// Constant term of the objective.
    pub fn objective_offset(&self) -> f64 {
        self.objective_offset
    }

    /// Number of columns.
    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    /// Number of rows.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Size summary.
    pub fn stats(&self) -> ModelStats {
        ModelStats {
            variables: self.variables.len(),
            integers: self.variables.iter().filter(|v| v.kind.is_integral()).count(),
            fixed: self.variables.iter().filter(|v| v.is_fixed()).count(),
            constraints: self.constraints.len(),
            nonzeros: self.constraints.iter().map(|c| c.terms.len()).sum(),
        }
    }

    /// Objective value under `values`.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .zip(values)
            .map(|(c, v)| c * v)
            .sum::<f64>()
            + self.objective_offset
    }

    /// First bound, integrality or row violated by `values`, if any.
    ///
    /// Returns a description suitable for logging.
    pub fn first_violation(&self, values: &[f64], tol: f64) -> Option<String> {
        if values.len() != self.variables.len() {
            return Some(format!(
                "expected {} values, got {}",
                self.variables.len(),
                values.len()
            ));
        }
        for (var, &value) in self.variables.iter().zip(values) {
            if !value.is_finite() || value < var.lower - tol || value > var.upper + tol {
                return Some(format!(
                    "variable '{}' = {value} outside [{}, {}]",
                    var.name, var.lower, var.upper
                ));
            }
            if var.kind.is_integral() && (value - value.round()).abs() > tol {
                return Some(format!("variable '{}' = {value} is not integral", var.name));
            }
        }
        self.constraints
            .iter()
            .find(|c| !c.is_satisfied(values, tol))
            .map(|c| {
                format!(
                    "constraint '{}': {} {} {}",
                    c.name,
                    c.activity(values),
                    c.sense,
                    c.rhs
                )
            })
    }

    /// Whether `values` satisfies every bound, integrality and row.
    pub fn check_feasible(&self, values: &[f64], tol: f64) -> bool {
        self.first_violation(values, tol).is_none()
    }

    fn check_var(&self, var: VarId) -> MilpResult<()> {
        if var.index() < self.variables.len() {
            Ok(())
        } else {
            Err(MilpError::UnknownVariable(var))
        }
    }
}

fn check_bounds(name: &str, lower: f64, upper: f64) -> MilpResult<()> {
    if lower.is_nan() || upper.is_nan() || lower > upper {
        return Err(MilpError::InvalidBounds {
            name: name.to_string(),
            lower,
            upper,
        });
    }
    Ok(())
}
