//! Binary integer program for qubit routing.
//!
//! For a schedule of depth `T` over `N` logical and `N` physical qubits the
//! model has:
//!
//! - `w[t,q,p]`: logical `q` sits on physical `p` at step `t`;
//! - `x[t,q,i,j]`: logical `q` moves from `i` at `t` to `j` at `t + 1`
//!   (`i = j` means it stays);
//! - `y[t,p,q,i,j]`: the gate on logical `(p, q)` at `t` runs on arc `(i, j)`;
//! - `z[t]`: dummy step `t` is used.
//!
//! Movement out of steps `t < B - 1` follows the coupling arcs exactly.
//! Window models set `B` below the depth and let later steps move along
//! long arcs (pairs within a hop horizon), which keeps every gate in the
//! model while only the prefix is routed precisely.

use bipmap_milp::{LinExpr, Model, Solution, VarId};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::config::Objective;
use crate::driver::Stage;
use crate::error::{RoutingError, RoutingResult};
use crate::fidelity::neg_log;
use crate::schedule::Schedule;
use crate::topology::{LongArcs, Topology};
use crate::window::Window;

/// Weight of each move in the depth objective.
const DEPTH_MOVE_WEIGHT: f64 = 0.01;

/// A swap costs three native two-qubit gates, shared by the two moving
/// qubits.
const SWAP_COST_FACTOR: f64 = 1.5;

/// Variable handles of one routing model.
#[derive(Debug, Clone, Default)]
pub struct RoutingVars {
    num_logical: usize,
    num_physical: usize,
    /// Dense `w`, indexed `(t · N + q) · N + p`.
    w: Vec<VarId>,
    /// `x` per step, keyed `(q, i, j)`.
    x: Vec<FxHashMap<(usize, usize, usize), VarId>>,
    /// `y` per step, keyed `(p, q, i, j)`.
    y: Vec<FxHashMap<(usize, usize, usize, usize), VarId>>,
    /// `z` per step, present for modelled dummy steps.
    z: Vec<Option<VarId>>,
}

impl RoutingVars {
    /// Number of modelled steps.
    pub fn depth(&self) -> usize {
        self.z.len()
    }

    /// Number of logical qubits.
    pub fn num_logical(&self) -> usize {
        self.num_logical
    }

    /// Number of physical qubits.
    pub fn num_physical(&self) -> usize {
        self.num_physical
    }

    /// `w[t, q, p]`.
    #[inline]
    pub fn w(&self, t: usize, q: usize, p: usize) -> VarId {
        self.w[(t * self.num_logical + q) * self.num_physical + p]
    }

    /// `x[t, q, i, j]`, if `q` may move from `i` to `j` after step `t`.
    pub fn x(&self, t: usize, q: usize, i: usize, j: usize) -> Option<VarId> {
        self.x.get(t)?.get(&(q, i, j)).copied()
    }

    /// `y[t, p, q, i, j]`, if gate `(p, q)` runs at `t`.
    pub fn y(&self, t: usize, p: usize, q: usize, i: usize, j: usize) -> Option<VarId> {
        self.y.get(t)?.get(&(p, q, i, j)).copied()
    }

    /// `z[t]`, if `t` is a modelled dummy step.
    pub fn z(&self, t: usize) -> Option<VarId> {
        self.z.get(t).copied().flatten()
    }

    /// All `x` of step `t` as `((q, i, j), var)`.
    pub fn moves_at(&self, t: usize) -> impl Iterator<Item = ((usize, usize, usize), VarId)> + '_ {
        self.x.get(t).into_iter().flatten().map(|(&k, &v)| (k, v))
    }

    /// All `y` of step `t` as `((p, q, i, j), var)`.
    pub fn gate_arcs_at(
        &self,
        t: usize,
    ) -> impl Iterator<Item = ((usize, usize, usize, usize), VarId)> + '_ {
        self.y.get(t).into_iter().flatten().map(|(&k, &v)| (k, v))
    }

    fn x_expect(&self, t: usize, q: usize, i: usize, j: usize) -> RoutingResult<VarId> {
        self.x(t, q, i, j).ok_or_else(|| missing("x", t))
    }

    fn y_expect(&self, t: usize, p: usize, q: usize, i: usize, j: usize) -> RoutingResult<VarId> {
        self.y(t, p, q, i, j).ok_or_else(|| missing("y", t))
    }
}

fn missing(kind: &str, t: usize) -> RoutingError {
    RoutingError::Configuration(format!("{kind} variable missing at step {t}"))
}

/// A built model with its variable index.
#[derive(Debug, Clone)]
pub struct RoutingModel {
    /// The MILP.
    pub model: Model,
    /// Variable handles.
    pub vars: RoutingVars,
    /// Steps `t < boundary` are modelled exactly.
    pub boundary: usize,
}

impl RoutingModel {
    /// Fix the prefix of `prev` into this model.
    ///
    /// Every `w`, `y` and `z` at `t < prev.boundary` and every `x` at
    /// `t < prev.boundary - 1` takes its solved value, rounded to 0/1.
    /// Returns the number of fixed variables.
    pub fn fix_prefix(&mut self, prev: &RoutingModel, solution: &Solution) -> RoutingResult<usize> {
        let until = prev.boundary.min(prev.vars.depth()).min(self.vars.depth());
        let rounded = |v: VarId| solution.value(v).round();
        let mut fixed = 0;
        for t in 0..until {
            for q in 0..prev.vars.num_logical {
                for p in 0..prev.vars.num_physical {
                    self.model
                        .fix(self.vars.w(t, q, p), rounded(prev.vars.w(t, q, p)))?;
                    fixed += 1;
                }
            }
            for ((p, q, i, j), var) in prev.vars.gate_arcs_at(t) {
                let target = self.vars.y_expect(t, p, q, i, j)?;
                self.model.fix(target, rounded(var))?;
                fixed += 1;
            }
            if let (Some(src), Some(dst)) = (prev.vars.z(t), self.vars.z(t)) {
                self.model.fix(dst, rounded(src))?;
                fixed += 1;
            }
            if t + 1 < until {
                for ((q, i, j), var) in prev.vars.moves_at(t) {
                    let target = self.vars.x_expect(t, q, i, j)?;
                    self.model.fix(target, rounded(var))?;
                    fixed += 1;
                }
            }
        }
        debug!(model = self.model.name(), fixed, until, "Fixed window prefix");
        Ok(fixed)
    }
}

/// Hook to add constraints or objective terms before a model is solved.
pub trait ModelModifier {
    /// Adjust `model`, built for `schedule` at `stage`.
    fn modify(&self, stage: Stage, model: &mut RoutingModel, schedule: &Schedule) -> RoutingResult<()>;
}

impl<F> ModelModifier for F
where
    F: Fn(Stage, &mut RoutingModel, &Schedule) -> RoutingResult<()>,
{
    fn modify(&self, stage: Stage, model: &mut RoutingModel, schedule: &Schedule) -> RoutingResult<()> {
        self(stage, model, schedule)
    }
}

/// Builds exact and window models over one topology.
#[derive(Debug)]
pub struct ModelBuilder<'a> {
    topology: &'a Topology,
    objective: Objective,
    long_arcs: LongArcs,
}

impl<'a> ModelBuilder<'a> {
    /// Create a builder; window tails move within `horizon` hops.
    pub fn new(topology: &'a Topology, objective: Objective, horizon: usize) -> Self {
        Self {
            topology,
            objective,
            long_arcs: topology.long_arcs(horizon),
        }
    }

    /// The exact model over the whole schedule.
    pub fn build(&self, schedule: &Schedule) -> RoutingResult<RoutingModel> {
        self.build_with_boundary("bip_exact", schedule, schedule.depth())
    }

    /// A window model: exact up to the window boundary, long arcs after.
    pub fn build_window(&self, window: &Window) -> RoutingResult<RoutingModel> {
        self.build_with_boundary(
            &format!("bip_window_{}", window.index),
            &window.schedule,
            window.boundary,
        )
    }

    fn build_with_boundary(
        &self,
        name: &str,
        schedule: &Schedule,
        boundary: usize,
    ) -> RoutingResult<RoutingModel> {
        let n = self.topology.num_qubits();
        if schedule.num_qubits() != n {
            return Err(RoutingError::Configuration(format!(
                "{} logical qubits cannot be placed on {n} physical qubits",
                schedule.num_qubits()
            )));
        }
        let depth = schedule.depth();
        if depth == 0 {
            return Err(RoutingError::Configuration(
                "cannot build a routing model for a schedule without gates".into(),
            ));
        }
        let boundary = boundary.clamp(1, depth);

        let mut build = Build {
            topo: self.topology,
            long: &self.long_arcs,
            schedule,
            depth,
            boundary,
            n,
            model: Model::new(name),
            vars: RoutingVars {
                num_logical: n,
                num_physical: n,
                ..Default::default()
            },
        };
        build.add_variables();
        build.add_assignment()?;
        build.add_gate_legality()?;
        build.add_flow()?;
        build.add_pair_moves()?;
        build.add_dummy_usage()?;
        build.set_objective(self.objective)?;

        let stats = build.model.stats();
        info!(
            model = name,
            depth,
            boundary,
            variables = stats.variables,
            constraints = stats.constraints,
            nonzeros = stats.nonzeros,
            "Built routing model"
        );
        Ok(RoutingModel {
            model: build.model,
            vars: build.vars,
            boundary,
        })
    }
}

/// Working state while emitting one model.
struct Build<'b> {
    topo: &'b Topology,
    long: &'b LongArcs,
    schedule: &'b Schedule,
    depth: usize,
    boundary: usize,
    n: usize,
    model: Model,
    vars: RoutingVars,
}

impl Build<'_> {
    /// Whether movement out of step `t` uses the coupling arcs.
    fn exact_moves(&self, t: usize) -> bool {
        t + 1 < self.boundary
    }

    /// Targets of moves out of `i` after step `t`, with their hop distance.
    fn targets(&self, t: usize, i: usize) -> Vec<(usize, usize)> {
        if self.exact_moves(t) {
            self.topo.neighbors(i).iter().map(|&j| (j, 1)).collect()
        } else {
            self.long.targets(i).to_vec()
        }
    }

    fn is_modelled_dummy(&self, t: usize) -> bool {
        t < self.boundary && self.schedule.is_dummy_step(t)
    }

    fn add_variables(&mut self) {
        let n = self.n;
        let mut w = Vec::with_capacity(self.depth * n * n);
        for t in 0..self.depth {
            for q in 0..n {
                for p in 0..n {
                    w.push(self.model.add_binary(format!("w_{t}_{q}_{p}")));
                }
            }
        }
        self.vars.w = w;

        for t in 0..self.depth {
            let mut y = FxHashMap::default();
            for gate in self.schedule.gates_at(t) {
                let (p, q) = gate.pair;
                for &(i, j) in self.topo.arcs() {
                    let var = self.model.add_binary(format!("y_{t}_{p}_{q}_{i}_{j}"));
                    y.insert((p, q, i, j), var);
                }
            }
            self.vars.y.push(y);
        }

        for t in 0..self.depth.saturating_sub(1) {
            let mut x = FxHashMap::default();
            for q in 0..n {
                for i in 0..n {
                    x.insert((q, i, i), self.model.add_binary(format!("x_{t}_{q}_{i}_{i}")));
                    for (j, _) in self.targets(t, i) {
                        x.insert((q, i, j), self.model.add_binary(format!("x_{t}_{q}_{i}_{j}")));
                    }
                }
            }
            self.vars.x.push(x);
        }

        for t in 0..self.depth {
            let z = self
                .is_modelled_dummy(t)
                .then(|| self.model.add_binary(format!("z_{t}")));
            self.vars.z.push(z);
        }
    }

    /// `w[t]` is a bijection.
    fn add_assignment(&mut self) -> RoutingResult<()> {
        let n = self.n;
        for t in 0..self.depth {
            for q in 0..n {
                let row: LinExpr = (0..n).map(|p| self.vars.w(t, q, p)).sum();
                self.model
                    .add_eq(format!("assignment_vqubits_{q}_at_{t}"), row, 1.0)?;
            }
            for p in 0..n {
                let col: LinExpr = (0..n).map(|q| self.vars.w(t, q, p)).sum();
                self.model
                    .add_eq(format!("assignment_pqubits_{p}_at_{t}"), col, 1.0)?;
            }
        }
        Ok(())
    }

    /// Each gate runs on exactly one arc, and only where its qubits sit.
    fn add_gate_legality(&mut self) -> RoutingResult<()> {
        for t in 0..self.depth {
            let exact = self.exact_moves(t);
            for gate in self.schedule.gates_at(t) {
                let (p, q) = gate.pair;
                let mut all_arcs = LinExpr::new();
                for &(i, j) in self.topo.arcs() {
                    let y = self.vars.y_expect(t, p, q, i, j)?;
                    all_arcs += y;
                    let (wp, wq) = (self.vars.w(t, p, i), self.vars.w(t, q, j));
                    self.model.add_ge(
                        format!("McCormickLB_{p}_{q}_{i}_{j}_at_{t}"),
                        y,
                        wp + wq - 1.0,
                    )?;
                    if exact {
                        // Both qubits stay on the arc or swap across it.
                        let p_on_arc =
                            self.vars.x_expect(t, p, i, i)? + self.vars.x_expect(t, p, i, j)?;
                        let q_on_arc =
                            self.vars.x_expect(t, q, j, i)? + self.vars.x_expect(t, q, j, j)?;
                        self.model
                            .add_le(format!("McCormickUB1_{p}_{q}_{i}_{j}_at_{t}"), y, p_on_arc)?;
                        self.model
                            .add_le(format!("McCormickUB2_{p}_{q}_{i}_{j}_at_{t}"), y, q_on_arc)?;
                    } else {
                        self.model
                            .add_le(format!("McCormickUB1_{p}_{q}_{i}_{j}_at_{t}"), y, wp)?;
                        self.model
                            .add_le(format!("McCormickUB2_{p}_{q}_{i}_{j}_at_{t}"), y, wq)?;
                    }
                }
                self.model
                    .add_eq(format!("implement_gate_{p}_{q}_at_{t}"), all_arcs, 1.0)?;
            }
        }
        Ok(())
    }

    /// Every logical qubit leaves and enters exactly one physical qubit.
    fn add_flow(&mut self) -> RoutingResult<()> {
        let n = self.n;
        for t in 0..self.depth.saturating_sub(1) {
            for q in 0..n {
                for i in 0..n {
                    let mut out = LinExpr::from(self.vars.x_expect(t, q, i, i)?);
                    for (j, _) in self.targets(t, i) {
                        out += self.vars.x_expect(t, q, i, j)?;
                    }
                    self.model
                        .add_eq(format!("flow_out_{q}_{i}_at_{t}"), self.vars.w(t, q, i), out)?;
                }
            }
        }
        for t in 1..self.depth {
            for q in 0..n {
                for i in 0..n {
                    // Arc sets are symmetric: sources into `i` are its targets.
                    let mut inflow = LinExpr::from(self.vars.x_expect(t - 1, q, i, i)?);
                    for (j, _) in self.targets(t - 1, i) {
                        inflow += self.vars.x_expect(t - 1, q, j, i)?;
                    }
                    self.model
                        .add_eq(format!("flow_in_{q}_{i}_at_{t}"), self.vars.w(t, q, i), inflow)?;
                }
            }
        }
        Ok(())
    }

    /// Gate partners move together; other qubits swap pairwise.
    fn add_pair_moves(&mut self) -> RoutingResult<()> {
        for t in 0..self.depth.saturating_sub(1) {
            if !self.exact_moves(t) {
                continue;
            }
            for gate in self.schedule.gates_at(t) {
                let (p, q) = gate.pair;
                for &(i, j) in self.topo.arcs() {
                    self.model.add_eq(
                        format!("swap_{p}_{q}_{i}_{j}_at_{t}"),
                        self.vars.x_expect(t, p, i, j)?,
                        self.vars.x_expect(t, q, j, i)?,
                    )?;
                }
            }
            let used = self.schedule.used_qubits(t);
            let free: Vec<usize> = (0..self.n).filter(|&q| !used[q]).collect();
            if free.is_empty() {
                continue;
            }
            for (i, j) in self.topo.edges() {
                let mut forward = LinExpr::new();
                let mut backward = LinExpr::new();
                for &q in &free {
                    forward += self.vars.x_expect(t, q, i, j)?;
                    backward += self.vars.x_expect(t, q, j, i)?;
                }
                self.model
                    .add_eq(format!("swap_no_gate_{i}_{j}_at_{t}"), forward, backward)?;
            }
        }
        Ok(())
    }

    /// Any move during a dummy step uses it; dummy steps are used in order.
    fn add_dummy_usage(&mut self) -> RoutingResult<()> {
        for t in 0..self.depth.saturating_sub(1) {
            let Some(z) = self.vars.z(t) else { continue };
            for q in 0..self.n {
                let mut moves = LinExpr::new();
                for i in 0..self.n {
                    for (j, _) in self.targets(t, i) {
                        moves += self.vars.x_expect(t, q, i, j)?;
                    }
                }
                self.model
                    .add_le(format!("dummy_ts_needed_for_vqubit_{q}_at_{t}"), moves, z)?;
            }
            if let Some(next) = self.vars.z(t + 1) {
                self.model
                    .add_ge(format!("dummy_precedence_{t}"), z, next)?;
            }
        }
        Ok(())
    }

    fn used_dummy_steps(&self) -> LinExpr {
        (0..self.depth).filter_map(|t| self.vars.z(t)).sum()
    }

    fn set_objective(&mut self, objective: Objective) -> RoutingResult<()> {
        let expr = match objective {
            Objective::Depth => self.depth_objective()?,
            Objective::GateError => self.error_objective()?,
            Objective::Balanced { depth_weight } => {
                self.error_objective()? + self.used_dummy_steps() * depth_weight
            }
        };
        self.model.set_objective(expr)?;
        Ok(())
    }

    /// Used dummy steps, plus a small charge per exact move.
    fn depth_objective(&self) -> RoutingResult<LinExpr> {
        let mut expr = self.used_dummy_steps();
        for t in 0..self.depth.saturating_sub(1) {
            if !self.exact_moves(t) {
                continue;
            }
            for q in 0..self.n {
                for &(i, j) in self.topo.arcs() {
                    expr.add_term(self.vars.x_expect(t, q, i, j)?, DEPTH_MOVE_WEIGHT);
                }
            }
        }
        Ok(expr)
    }

    /// `-ln` of the expected success probability of gates and swaps.
    fn error_objective(&self) -> RoutingResult<LinExpr> {
        let mut expr = LinExpr::new();
        let tail_move_cost = SWAP_COST_FACTOR * neg_log(self.topo.average_fidelity());
        for t in 0..self.depth {
            let exact = self.exact_moves(t);
            for gate in self.schedule.gates_at(t) {
                let (p, q) = gate.pair;
                for &(i, j) in self.topo.arcs() {
                    let f = self.topo.arc_fidelity(i, j).unwrap_or(1.0);
                    let cost = gate.curves.cost(f);
                    expr.add_term(self.vars.y_expect(t, p, q, i, j)?, cost);
                    if exact {
                        // A gate followed by a swap of its own qubits runs as
                        // the mirrored gate; split the difference over both moves.
                        let half = (gate.curves.mirrored_cost(f) - cost) / 2.0;
                        expr.add_term(self.vars.x_expect(t, p, i, j)?, half);
                        expr.add_term(self.vars.x_expect(t, q, j, i)?, half);
                    }
                }
            }
            if t + 1 >= self.depth {
                continue;
            }
            if exact {
                let used = self.schedule.used_qubits(t);
                for q in (0..self.n).filter(|&q| !used[q]) {
                    for &(i, j) in self.topo.arcs() {
                        let f = self.topo.arc_fidelity(i, j).unwrap_or(1.0);
                        expr.add_term(
                            self.vars.x_expect(t, q, i, j)?,
                            SWAP_COST_FACTOR * neg_log(f),
                        );
                    }
                }
            } else {
                for q in 0..self.n {
                    for i in 0..self.n {
                        for &(j, dist) in self.long.targets(i) {
                            expr.add_term(
                                self.vars.x_expect(t, q, i, j)?,
                                tail_move_cost * dist as f64,
                            );
                        }
                    }
                }
            }
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fidelity::{FidelityCache, GateCurves};
    use crate::schedule::TwoQubitOp;
    use crate::window::{SplitPlan, WindowDecomposer};
    use bipmap_milp::SolveStatus;

    fn line(n: usize) -> Topology {
        Topology::new(n, (0..n - 1).map(|i| (i, i + 1))).unwrap()
    }

    fn schedule(n: usize, ops: &[TwoQubitOp], d: usize) -> Schedule {
        let source = GateCurves::cnot();
        let mut cache = FidelityCache::new(&source);
        Schedule::build(n, ops, d, &mut cache).unwrap()
    }

    fn count_named(model: &Model, prefix: &str) -> usize {
        model
            .constraints()
            .iter()
            .filter(|c| c.name.starts_with(prefix))
            .count()
    }

    #[test]
    fn test_exact_model_sizes() {
        let topo = line(3);
        let s = schedule(3, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(1, 2)], 1);
        assert_eq!(s.depth(), 3);
        let built = ModelBuilder::new(&topo, Objective::Depth, 1).build(&s).unwrap();
        let vars = &built.vars;

        // w: 3·3·3; y: 2 gates · 4 arcs; x: 2 steps · 3 qubits · (3 stays + 4 arcs); z: 1.
        assert_eq!(built.model.num_vars(), 27 + 8 + 42 + 1);
        assert!(vars.z(1).is_some());
        assert!(vars.z(0).is_none());
        assert!(vars.x(0, 0, 0, 2).is_none());
        assert!(vars.x(1, 2, 2, 1).is_some());
        assert!(vars.y(2, 1, 2, 2, 1).is_some());
        assert_eq!(built.boundary, 3);

        assert_eq!(count_named(&built.model, "assignment_"), 18);
        assert_eq!(count_named(&built.model, "flow_out_"), 18);
        assert_eq!(count_named(&built.model, "flow_in_"), 18);
        assert_eq!(count_named(&built.model, "implement_gate_"), 2);
        assert_eq!(count_named(&built.model, "dummy_ts_needed"), 3);
        // Free qubit 2 at step 0 and all qubits at the dummy step 1.
        assert_eq!(count_named(&built.model, "swap_no_gate_"), 4);
    }

    #[test]
    fn test_last_step_uses_textbook_mccormick() {
        let topo = line(2);
        let s = schedule(2, &[TwoQubitOp::cx(0, 1)], 0);
        let built = ModelBuilder::new(&topo, Objective::Depth, 1).build(&s).unwrap();
        let y = built.vars.y(0, 0, 1, 0, 1).unwrap();
        let w = built.vars.w(0, 0, 0);
        let ub = built
            .model
            .constraints()
            .iter()
            .find(|c| c.name == "McCormickUB1_0_1_0_1_at_0")
            .unwrap();
        assert_eq!(ub.terms.len(), 2);
        assert!(ub.terms.contains(&(y, 1.0)) && ub.terms.contains(&(w, -1.0)));
    }

    #[test]
    fn test_identity_layout_is_feasible() {
        let topo = line(3);
        let s = schedule(3, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(1, 2)], 0);
        let built = ModelBuilder::new(&topo, Objective::GateError, 1).build(&s).unwrap();
        let vars = &built.vars;

        let mut values = vec![0.0; built.model.num_vars()];
        let mut set = |v: VarId| values[v.index()] = 1.0;
        for t in 0..2 {
            for q in 0..3 {
                set(vars.w(t, q, q));
            }
        }
        for q in 0..3 {
            set(vars.x(0, q, q, q).unwrap());
        }
        set(vars.y(0, 0, 1, 0, 1).unwrap());
        set(vars.y(1, 1, 2, 1, 2).unwrap());
        let violation = built.model.first_violation(&values, 1e-9);
        assert!(violation.is_none(), "{violation:?}");

        // Two gates on 0.99 arcs.
        let expected = -2.0 * 0.99f64.ln();
        assert!((built.model.objective_value(&values) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_mirror_correction_prices_swapped_gate() {
        let topo = line(2);
        let s = schedule(2, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(0, 1)], 0);
        let built = ModelBuilder::new(&topo, Objective::GateError, 1).build(&s).unwrap();
        let obj = built.model.objective();
        let x01 = built.vars.x(0, 0, 0, 1).unwrap();
        let x10 = built.vars.x(0, 1, 1, 0).unwrap();
        let curves = GateCurves::cnot();
        let full = curves.mirrored_cost(0.99) - curves.cost(0.99);
        assert!((obj[x01.index()] + obj[x10.index()] - full).abs() < 1e-12);
    }

    #[test]
    fn test_window_model_uses_long_arcs_after_boundary() {
        let topo = line(4);
        let ops: Vec<_> = [(0, 1), (2, 3), (1, 2), (0, 1), (2, 3)]
            .iter()
            .map(|&(a, b)| TwoQubitOp::cx(a, b))
            .collect();
        let full = schedule(4, &ops, 1);
        let plan = SplitPlan::resolve(2, full.num_layers()).unwrap();
        let window = WindowDecomposer::new(&full, plan, 1).window(0);
        let built = ModelBuilder::new(&topo, Objective::Depth, 2)
            .build_window(&window)
            .unwrap();

        let b = built.boundary;
        assert_eq!(b, window.boundary);
        // Exact moves before b - 1, long arcs (distance 2) from b - 1 on.
        assert!(built.vars.x(b - 2, 0, 0, 2).is_none());
        assert!(built.vars.x(b - 1, 0, 0, 2).is_some());
        assert!(built.vars.x(b - 1, 0, 0, 3).is_none());
        assert_eq!(b, 3);
        assert_eq!(count_named(&built.model, "swap_0_1_0_1_at_0"), 1);
        assert_eq!(count_named(&built.model, "swap_1_2_1_2_at_2"), 0);
        // No z beyond the boundary.
        assert!((b..window.schedule.depth()).all(|t| built.vars.z(t).is_none()));
    }

    #[test]
    fn test_qubit_count_mismatch() {
        let topo = line(4);
        let s = schedule(3, &[TwoQubitOp::cx(0, 1)], 0);
        let err = ModelBuilder::new(&topo, Objective::Depth, 1).build(&s).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }

    #[test]
    fn test_modifier_closure() {
        let topo = line(2);
        let s = schedule(2, &[TwoQubitOp::cx(0, 1)], 0);
        let mut built = ModelBuilder::new(&topo, Objective::Depth, 1).build(&s).unwrap();
        let pin = |_: Stage, m: &mut RoutingModel, _: &Schedule| -> RoutingResult<()> {
            let w = m.vars.w(0, 0, 1);
            m.model.add_eq("pin_q0", w, 1.0)?;
            Ok(())
        };
        pin.modify(Stage::Exact, &mut built, &s).unwrap();
        assert_eq!(count_named(&built.model, "pin_q0"), 1);
    }

    #[test]
    fn test_dummy_steps_are_used_in_order() {
        let topo = line(3);
        let s = schedule(3, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(1, 2)], 2);
        assert_eq!(s.depth(), 4);
        let built = ModelBuilder::new(&topo, Objective::Depth, 1).build(&s).unwrap();
        let vars = &built.vars;
        assert_eq!(count_named(&built.model, "dummy_precedence_"), 1);
        let (z1, z2) = (vars.z(1).unwrap(), vars.z(2).unwrap());

        let mut values = vec![0.0; built.model.num_vars()];
        for t in 0..4 {
            for q in 0..3 {
                values[vars.w(t, q, q).index()] = 1.0;
            }
        }
        for t in 0..3 {
            for q in 0..3 {
                values[vars.x(t, q, q, q).unwrap().index()] = 1.0;
            }
        }
        values[vars.y(0, 0, 1, 0, 1).unwrap().index()] = 1.0;
        values[vars.y(3, 1, 2, 1, 2).unwrap().index()] = 1.0;
        assert!(built.model.check_feasible(&values, 1e-9));

        // The second dummy step without the first.
        values[z2.index()] = 1.0;
        let violation = built.model.first_violation(&values, 1e-9).unwrap();
        assert!(violation.contains("dummy_precedence_1"), "{violation}");

        values[z1.index()] = 1.0;
        assert!(built.model.check_feasible(&values, 1e-9));
        values[z2.index()] = 0.0;
        assert!(built.model.check_feasible(&values, 1e-9));
    }

    #[test]
    fn test_fix_prefix_stops_before_boundary_moves() {
        let topo = line(4);
        let ops: Vec<_> = [(0, 1), (2, 3), (1, 2), (0, 1), (2, 3)]
            .iter()
            .map(|&(a, b)| TwoQubitOp::cx(a, b))
            .collect();
        let full = schedule(4, &ops, 1);
        let plan = SplitPlan::resolve(2, full.num_layers()).unwrap();
        let window = WindowDecomposer::new(&full, plan, 1).window(0);
        let builder = ModelBuilder::new(&topo, Objective::Depth, 2);
        let prev = builder.build_window(&window).unwrap();
        let mut next = builder.build(&full).unwrap();
        let b = prev.boundary;
        assert_eq!(b, 3);

        let mut values = vec![0.0; prev.model.num_vars()];
        for t in 0..window.schedule.depth() {
            for q in 0..4 {
                values[prev.vars.w(t, q, q).index()] = 1.0;
            }
        }
        values[prev.vars.x(0, 2, 2, 1).unwrap().index()] = 0.9999;
        let solution = Solution {
            status: SolveStatus::Optimal,
            raw_status: "Optimal".into(),
            objective: Some(0.0),
            values,
        };

        let fixed = next.fix_prefix(&prev, &solution).unwrap();
        // w: 3 steps of 16; y: 3 gates on 6 arcs; z: step 1; x: 2 steps of 4 * (4 + 6).
        assert_eq!(fixed, 48 + 18 + 1 + 80);

        let var = |v: VarId| next.model.variable(v).unwrap().clone();
        for t in 0..b {
            let w = var(next.vars.w(t, 1, 1));
            assert!(w.is_fixed() && w.lower == 1.0, "w at step {t}");
            assert!(var(next.vars.w(t, 1, 2)).is_fixed());
        }
        let rounded = var(next.vars.x(0, 2, 2, 1).unwrap());
        assert!(rounded.is_fixed() && rounded.lower == 1.0);
        assert!(var(next.vars.x(b - 2, 0, 0, 0).unwrap()).is_fixed());
        assert!(var(next.vars.y(2, 1, 2, 1, 2).unwrap()).is_fixed());
        assert!(var(next.vars.z(1).unwrap()).is_fixed());

        // Moves out of the boundary step and everything after it stay free.
        assert!(!var(next.vars.x(b - 1, 0, 0, 0).unwrap()).is_fixed());
        assert!(!var(next.vars.x(b - 1, 1, 1, 2).unwrap()).is_fixed());
        assert!(!var(next.vars.w(b, 1, 1)).is_fixed());
        assert!(!var(next.vars.z(b).unwrap()).is_fixed());
    }
}
