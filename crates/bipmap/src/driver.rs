//! Sequential solve of window models followed by the exact model.

use std::fmt;

use bipmap_milp::{FEASIBILITY_TOL, MilpError, Solution, SolveParams, Solver};
use tracing::{debug, info, instrument, warn};

use crate::builder::{ModelBuilder, ModelModifier, RoutingModel};
use crate::error::{RoutingError, RoutingResult};
use crate::schedule::Schedule;
use crate::window::{SplitPlan, WindowDecomposer};

/// Which model is being solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Window `i`.
    Window(usize),
    /// The final exact model.
    Exact,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Window(i) => write!(f, "window {i}"),
            Stage::Exact => f.write_str("exact model"),
        }
    }
}

/// Progress of a [`SolveDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing solved yet.
    Unsolved,
    /// A model is being solved.
    Solving(Stage),
    /// Window `i` is solved and its prefix will be fixed in the next model.
    Fixed(usize),
    /// The exact model is solved.
    Solved,
}

/// The solved exact model.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    /// Model and variable handles.
    pub model: RoutingModel,
    /// Solver values for `model`.
    pub solution: Solution,
}

/// Builds, fixes and solves each model in turn.
pub struct SolveDriver<'a> {
    builder: &'a ModelBuilder<'a>,
    solver: &'a dyn Solver,
    modifier: Option<&'a dyn ModelModifier>,
    params: SolveParams,
    time_limit: f64,
    state: DriverState,
}

impl fmt::Debug for SolveDriver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolveDriver")
            .field("solver", &self.solver.name())
            .field("has_modifier", &self.modifier.is_some())
            .field("params", &self.params)
            .field("time_limit", &self.time_limit)
            .field("state", &self.state)
            .finish()
    }
}

impl<'a> SolveDriver<'a> {
    /// Create a driver with a total time budget of `time_limit` seconds.
    pub fn new(
        builder: &'a ModelBuilder<'a>,
        solver: &'a dyn Solver,
        params: SolveParams,
        time_limit: f64,
    ) -> Self {
        Self {
            builder,
            solver,
            modifier: None,
            params,
            time_limit,
            state: DriverState::Unsolved,
        }
    }

    /// Apply `modifier` to every model before it is solved.
    pub fn with_modifier(mut self, modifier: &'a dyn ModelModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    /// Current state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Solve all windows of `plan` and then the exact model over `schedule`.
    ///
    /// Each model is discarded once its prefix has been fixed in the next
    /// one. Any solve without a usable solution aborts the run.
    #[instrument(skip_all, fields(splits = plan.num_splits(), solver = self.solver.name()))]
    pub fn run(
        &mut self,
        schedule: &Schedule,
        plan: SplitPlan,
        dummy_steps: usize,
    ) -> RoutingResult<SolvedModel> {
        let (window_limits, exact_limit) = plan.time_limits(self.time_limit);
        info!(
            windows = plan.num_windows(),
            depth = schedule.depth(),
            "Starting routing solve"
        );

        let mut previous: Option<SolvedModel> = None;
        let decomposer = WindowDecomposer::new(schedule, plan, dummy_steps);
        for (window, limit) in decomposer.windows().zip(window_limits) {
            let stage = Stage::Window(window.index);
            let model = self.builder.build_window(&window)?;
            let solved = self.solve_stage(stage, model, &window.schedule, previous.as_ref(), limit)?;
            self.state = DriverState::Fixed(window.index);
            debug!(window = window.index, "Window solved, prefix handed off");
            previous = Some(solved);
        }

        let model = self.builder.build(schedule)?;
        let solved = self.solve_stage(Stage::Exact, model, schedule, previous.as_ref(), exact_limit)?;
        self.state = DriverState::Solved;
        info!(
            objective = solved.solution.objective,
            status = %solved.solution.raw_status,
            "Routing solve finished"
        );
        Ok(solved)
    }

    fn solve_stage(
        &mut self,
        stage: Stage,
        mut model: RoutingModel,
        schedule: &Schedule,
        previous: Option<&SolvedModel>,
        time_limit: f64,
    ) -> RoutingResult<SolvedModel> {
        if let Some(modifier) = self.modifier {
            modifier.modify(stage, &mut model, schedule)?;
        }
        if let Some(prev) = previous {
            model.fix_prefix(&prev.model, &prev.solution)?;
        }

        self.state = DriverState::Solving(stage);
        info!(%stage, time_limit, "Solving model");
        let params = self.params.clone().with_time_limit(time_limit);
        let solution = match self.solver.solve(&model.model, &params) {
            Ok(solution) => solution,
            Err(MilpError::Backend(status)) => {
                warn!(%stage, %status, "Solver backend failed");
                return Err(RoutingError::Solve { stage, status });
            }
            Err(err) => return Err(err.into()),
        };

        if !solution.status.is_success() {
            warn!(%stage, status = %solution.raw_status, "Solve failed");
            return Err(RoutingError::Solve {
                stage,
                status: solution.raw_status,
            });
        }
        if let Some(violation) = model.model.first_violation(&solution.values, FEASIBILITY_TOL) {
            warn!(%stage, %violation, "Solver returned an infeasible assignment");
            return Err(RoutingError::Solve {
                stage,
                status: format!("{} ({violation})", solution.raw_status),
            });
        }
        debug!(%stage, status = %solution.status, objective = solution.objective, "Model solved");
        Ok(SolvedModel { model, solution })
    }
}
