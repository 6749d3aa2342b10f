//! Routing entry point.

use bipmap_milp::{Solver, default_solver};
use tracing::info;

use crate::builder::{ModelBuilder, ModelModifier};
use crate::config::RoutingConfig;
use crate::coupling::CouplingMap;
use crate::driver::{SolveDriver, SolvedModel};
use crate::error::{RoutingError, RoutingResult};
use crate::fidelity::{
    ArcFidelitySource, Calibration, FidelityCache, GateCurves, GateFidelitySource, WeylCurveTable,
};
use crate::schedule::{Schedule, TwoQubitOp};
use crate::solution::RoutingSolution;
use crate::topology::Topology;
use crate::window::SplitPlan;

/// Everything produced by one routing run.
#[derive(Debug, Clone)]
pub struct RoutingRun {
    /// Decoded layouts and swaps.
    pub solution: RoutingSolution,
    /// The schedule that was routed.
    pub schedule: Schedule,
    /// Reduced topology with arc fidelities applied.
    pub topology: Topology,
    /// The solved exact model; `None` when no solve was needed.
    pub model: Option<SolvedModel>,
}

/// Routes two-qubit gate sequences onto a coupling map.
///
/// # Example
///
/// ```no_run
/// use bipmap::{CouplingMap, Router, RoutingConfig, TwoQubitOp};
///
/// let router = Router::new(CouplingMap::linear(3), RoutingConfig::default());
/// let solution = router
///     .route(3, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(0, 2)])
///     .unwrap();
/// println!("{} swaps", solution.num_swaps());
/// ```
pub struct Router<'a> {
    coupling: CouplingMap,
    config: RoutingConfig,
    qubit_subset: Option<Vec<u32>>,
    calibration: Option<Calibration>,
    modifier: Option<Box<dyn ModelModifier + 'a>>,
    solver: Option<Box<dyn Solver + 'a>>,
    fidelity_source: Option<Box<dyn GateFidelitySource + 'a>>,
}

impl std::fmt::Debug for Router<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("coupling", &self.coupling)
            .field("config", &self.config)
            .field("qubit_subset", &self.qubit_subset)
            .field("calibration", &self.calibration.as_ref().map(Calibration::len))
            .field("has_modifier", &self.modifier.is_some())
            .field("solver", &self.solver.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl<'a> Router<'a> {
    /// Create a router over the whole coupling map.
    pub fn new(coupling: CouplingMap, config: RoutingConfig) -> Self {
        Self {
            coupling,
            config,
            qubit_subset: None,
            calibration: None,
            modifier: None,
            solver: None,
            fidelity_source: None,
        }
    }

    /// Restrict routing to these device qubits; local index `k` is
    /// `subset[k]`.
    pub fn with_qubit_subset(mut self, subset: impl Into<Vec<u32>>) -> Self {
        self.qubit_subset = Some(subset.into());
        self
    }

    /// Use calibrated error rates for arc fidelities.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Adjust every model before it is solved.
    pub fn with_modifier(mut self, modifier: impl ModelModifier + 'a) -> Self {
        self.modifier = Some(Box::new(modifier));
        self
    }

    /// Use `solver` instead of the compiled-in backend.
    pub fn with_solver(mut self, solver: impl Solver + 'a) -> Self {
        self.solver = Some(Box::new(solver));
        self
    }

    /// Resolve gate fidelity curves from `source`.
    pub fn with_fidelity_source(mut self, source: impl GateFidelitySource + 'a) -> Self {
        self.fidelity_source = Some(Box::new(source));
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Route `ops` over `num_qubits` logical qubits, layered as soon as
    /// possible.
    pub fn route(&self, num_qubits: usize, ops: &[TwoQubitOp]) -> RoutingResult<RoutingSolution> {
        self.route_detailed(num_qubits, ops).map(|run| run.solution)
    }

    /// Route pre-built layers.
    pub fn route_layers(
        &self,
        num_qubits: usize,
        layers: &[Vec<TwoQubitOp>],
    ) -> RoutingResult<RoutingSolution> {
        let dummy_steps = self.config.dummy_steps;
        self.run(num_qubits, |cache| {
            Schedule::from_layers(num_qubits, layers, dummy_steps, cache)
        })
        .map(|run| run.solution)
    }

    /// Like [`route`](Self::route), also returning the schedule, topology
    /// and solved model.
    pub fn route_detailed(&self, num_qubits: usize, ops: &[TwoQubitOp]) -> RoutingResult<RoutingRun> {
        let dummy_steps = self.config.dummy_steps;
        self.run(num_qubits, |cache| Schedule::build(num_qubits, ops, dummy_steps, cache))
    }

    fn run(
        &self,
        num_qubits: usize,
        schedule: impl FnOnce(&mut FidelityCache<'_>) -> RoutingResult<Schedule>,
    ) -> RoutingResult<RoutingRun> {
        self.config.validate()?;
        let objective = self.config.objective()?;

        let mut topology = self.coupling.reduce(self.qubit_subset.as_deref())?;
        if num_qubits != topology.num_qubits() {
            return Err(RoutingError::Configuration(format!(
                "{num_qubits} logical qubits but {} active physical qubits",
                topology.num_qubits()
            )));
        }
        if objective.needs_fidelity() {
            ArcFidelitySource::new(self.calibration.as_ref(), self.config.default_error_rate)
                .apply(&mut topology)?;
        }

        let uniform = GateCurves::cnot();
        let table;
        let source: &dyn GateFidelitySource = match (&self.fidelity_source, objective.needs_fidelity()) {
            (Some(source), _) => source.as_ref(),
            (None, false) => &uniform,
            (None, true) => {
                table = WeylCurveTable::standard();
                &table
            }
        };
        let mut cache = FidelityCache::new(source);
        let schedule = schedule(&mut cache)?;

        info!(
            qubits = num_qubits,
            gates = schedule.num_gates(),
            layers = schedule.num_layers(),
            depth = schedule.depth(),
            objective = %self.config.objective,
            "Routing circuit"
        );
        if schedule.num_gates() == 0 {
            let solution = RoutingSolution::trivial(&topology);
            return Ok(RoutingRun {
                solution,
                schedule,
                topology,
                model: None,
            });
        }

        let plan = SplitPlan::resolve(self.config.num_splits, schedule.num_layers())?;
        let fallback;
        let solver: &dyn Solver = match &self.solver {
            Some(solver) => solver.as_ref(),
            None => {
                fallback = default_solver()?;
                fallback.as_ref()
            }
        };

        let builder = ModelBuilder::new(&topology, objective, self.config.horizon());
        let mut driver = SolveDriver::new(
            &builder,
            solver,
            self.config.solve_params(),
            self.config.time_limit,
        );
        if let Some(modifier) = &self.modifier {
            driver = driver.with_modifier(modifier.as_ref());
        }
        let solved = driver.run(&schedule, plan, self.config.dummy_steps)?;

        let solution = RoutingSolution::decode(&solved, &topology)?;
        solution.verify(&schedule, &topology)?;
        info!(
            swaps = solution.num_swaps(),
            objective = solution.objective_value(),
            status = solution.status(),
            "Routing finished"
        );
        Ok(RoutingRun {
            solution,
            schedule,
            topology,
            model: Some(solved),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qubit_count_mismatch() {
        let router = Router::new(CouplingMap::linear(3), RoutingConfig::default());
        let err = router.route(2, &[TwoQubitOp::cx(0, 1)]).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }

    #[test]
    fn test_disconnected_subset() {
        let router = Router::new(CouplingMap::linear(4), RoutingConfig::default())
            .with_qubit_subset(vec![0, 2]);
        let err = router.route(2, &[TwoQubitOp::cx(0, 1)]).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }

    #[test]
    fn test_unknown_objective() {
        let config = RoutingConfig {
            objective: "fastest".into(),
            ..Default::default()
        };
        let router = Router::new(CouplingMap::linear(2), config);
        let err = router.route(2, &[TwoQubitOp::cx(0, 1)]).unwrap_err();
        assert!(matches!(err, RoutingError::UnknownObjective(_)));
    }

    #[test]
    fn test_missing_error_rates() {
        let config = RoutingConfig {
            objective: "gate_error".into(),
            default_error_rate: None,
            ..Default::default()
        };
        let router = Router::new(CouplingMap::linear(2), config);
        let err = router.route(2, &[TwoQubitOp::cx(0, 1)]).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }

    #[test]
    fn test_no_gates_is_trivial() {
        let router = Router::new(CouplingMap::linear(3), RoutingConfig::default())
            .with_qubit_subset(vec![2, 1, 0]);
        let run = router.route_detailed(3, &[]).unwrap();
        assert!(run.model.is_none());
        assert_eq!(run.solution.num_swaps(), 0);
        assert_eq!(run.solution.initial_layout().physical_qubits(), &[2, 1, 0]);
    }
}
