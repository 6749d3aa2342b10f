//! Decoding solved models into per-step layouts and swaps.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::driver::SolvedModel;
use crate::error::{RoutingError, RoutingResult};
use crate::layout::{Layout, QubitId};
use crate::schedule::Schedule;
use crate::topology::Topology;

/// Status string of a solution that needed no solve.
pub const TRIVIAL_STATUS: &str = "Trivial";

/// A gate of the schedule and the physical arc it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacedGate {
    /// Logical qubits, in gate order.
    pub logical: (QubitId, QubitId),
    /// Physical qubits hosting them.
    pub physical: (u32, u32),
}

/// Routed circuit: a layout per step and the swaps between steps.
///
/// Physical qubits use the device's global numbering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingSolution {
    /// Layout at each step; at least one entry.
    layouts: Vec<Layout>,
    /// Swaps between step `t` and `t + 1`, as `(a, b)` with `a < b` locally.
    swaps: Vec<Vec<(u32, u32)>>,
    /// Gates per step.
    gates: Vec<Vec<PlacedGate>>,
    objective: f64,
    status: String,
}

impl RoutingSolution {
    /// Read layouts, swaps and gate placements from a solved exact model.
    pub fn decode(solved: &SolvedModel, topology: &Topology) -> RoutingResult<Self> {
        let vars = &solved.model.vars;
        let sol = &solved.solution;
        let n = vars.num_logical();
        let depth = vars.depth();

        let mut layouts = Vec::with_capacity(depth);
        for t in 0..depth {
            let mut physical = Vec::with_capacity(n);
            for q in 0..n {
                let mut hosts = (0..vars.num_physical()).filter(|&p| sol.is_set(vars.w(t, q, p)));
                match (hosts.next(), hosts.next()) {
                    (Some(p), None) => physical.push(topology.global_qubit(p)),
                    _ => {
                        return Err(RoutingError::Solution(format!(
                            "logical qubit {q} is not placed exactly once at step {t}"
                        )));
                    }
                }
            }
            let layout = Layout::from_physical(physical).ok_or_else(|| {
                RoutingError::Solution(format!("two logical qubits share a physical qubit at step {t}"))
            })?;
            layouts.push(layout);
        }

        let mut swaps = Vec::with_capacity(depth.saturating_sub(1));
        for t in 0..depth.saturating_sub(1) {
            let step: Vec<(u32, u32)> = topology
                .edges()
                .filter(|&(i, j)| {
                    (0..n).any(|q| vars.x(t, q, i, j).is_some_and(|x| sol.is_set(x)))
                })
                .map(|(i, j)| (topology.global_qubit(i), topology.global_qubit(j)))
                .collect();
            swaps.push(step);
        }

        let mut gates = Vec::with_capacity(depth);
        for t in 0..depth {
            let mut step: Vec<PlacedGate> = vars
                .gate_arcs_at(t)
                .filter(|&(_, y)| sol.is_set(y))
                .map(|((p, q, i, j), _)| PlacedGate {
                    logical: (QubitId(p as u32), QubitId(q as u32)),
                    physical: (topology.global_qubit(i), topology.global_qubit(j)),
                })
                .collect();
            step.sort_by_key(|g| g.logical);
            gates.push(step);
        }

        let objective = sol
            .objective
            .unwrap_or_else(|| solved.model.model.objective_value(&sol.values));
        let solution = Self {
            layouts,
            swaps,
            gates,
            objective,
            status: sol.raw_status.clone(),
        };
        debug!(
            depth,
            swaps = solution.num_swaps(),
            objective,
            "Decoded routing solution"
        );
        Ok(solution)
    }

    /// Identity placement for a circuit without two-qubit gates.
    pub fn trivial(topology: &Topology) -> Self {
        let layout = Layout::from_physical(topology.global_qubits().to_vec())
            .unwrap_or_else(|| Layout::trivial(topology.num_qubits() as u32));
        Self {
            layouts: vec![layout],
            swaps: Vec::new(),
            gates: vec![Vec::new()],
            objective: 0.0,
            status: TRIVIAL_STATUS.into(),
        }
    }

    /// Number of time steps.
    pub fn depth(&self) -> usize {
        self.layouts.len()
    }

    /// Layout at step `t`.
    pub fn layout_at(&self, t: usize) -> Option<&Layout> {
        self.layouts.get(t)
    }

    /// All layouts in step order.
    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }

    /// Swaps applied between step `t` and `t + 1`.
    pub fn swaps_at(&self, t: usize) -> &[(u32, u32)] {
        self.swaps.get(t).map(Vec::as_slice).unwrap_or_default()
    }

    /// Gates placed at step `t`.
    pub fn gates_at(&self, t: usize) -> &[PlacedGate] {
        self.gates.get(t).map(Vec::as_slice).unwrap_or_default()
    }

    /// Layout before the first step.
    pub fn initial_layout(&self) -> &Layout {
        &self.layouts[0]
    }

    /// Layout at the last step.
    pub fn final_layout(&self) -> &Layout {
        &self.layouts[self.layouts.len() - 1]
    }

    /// Total number of swaps.
    pub fn num_swaps(&self) -> usize {
        self.swaps.iter().map(Vec::len).sum()
    }

    /// Objective value of the exact model.
    pub fn objective_value(&self) -> f64 {
        self.objective
    }

    /// Solver status string of the exact model.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Check the decoded result against `schedule` and `topology`.
    ///
    /// Every layout must place each logical qubit on a distinct device
    /// qubit, every gate must sit on a coupling edge, swaps must use edges,
    /// and applying the swaps of step `t` to its layout must give the layout
    /// of `t + 1`.
    pub fn verify(&self, schedule: &Schedule, topology: &Topology) -> RoutingResult<()> {
        let local_of: FxHashMap<u32, usize> = topology
            .global_qubits()
            .iter()
            .enumerate()
            .map(|(local, &g)| (g, local))
            .collect();
        let local = |g: u32, t: usize| {
            local_of.get(&g).copied().ok_or_else(|| {
                RoutingError::Solution(format!("step {t} uses qubit {g} outside the topology"))
            })
        };

        if schedule.depth() > 0 && schedule.depth() != self.depth() {
            return Err(RoutingError::Solution(format!(
                "solution has {} steps, schedule has {}",
                self.depth(),
                schedule.depth()
            )));
        }

        for (t, layout) in self.layouts.iter().enumerate() {
            if layout.len() != schedule.num_qubits() {
                return Err(RoutingError::Solution(format!(
                    "layout at step {t} maps {} of {} logical qubits",
                    layout.len(),
                    schedule.num_qubits()
                )));
            }
            for (_, g) in layout.iter() {
                local(g, t)?;
            }

            for gate in schedule.gates_at(t) {
                let (p, q) = gate.pair;
                let (Some(a), Some(b)) = (
                    layout.get_physical(QubitId(p as u32)),
                    layout.get_physical(QubitId(q as u32)),
                ) else {
                    return Err(RoutingError::Solution(format!("gate ({p}, {q}) unplaced at step {t}")));
                };
                if !topology.is_arc(local(a, t)?, local(b, t)?) {
                    return Err(RoutingError::Solution(format!(
                        "gate ({p}, {q}) at step {t} runs on non-adjacent qubits {a}, {b}"
                    )));
                }
            }

            if let Some(next) = self.layouts.get(t + 1) {
                let mut moved = layout.clone();
                for &(a, b) in self.swaps_at(t) {
                    if !topology.is_arc(local(a, t)?, local(b, t)?) {
                        return Err(RoutingError::Solution(format!(
                            "swap ({a}, {b}) at step {t} is not on a coupling edge"
                        )));
                    }
                    moved.swap(a, b);
                }
                if moved.physical_qubits() != next.physical_qubits() {
                    return Err(RoutingError::Solution(format!(
                        "swaps after step {t} do not produce the layout of step {}",
                        t + 1
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fidelity::{FidelityCache, GateCurves};
    use crate::schedule::TwoQubitOp;

    fn schedule(n: usize, ops: &[TwoQubitOp]) -> Schedule {
        let source = GateCurves::cnot();
        let mut cache = FidelityCache::new(&source);
        Schedule::build(n, ops, 0, &mut cache).unwrap()
    }

    fn manual(layouts: Vec<Vec<u32>>, swaps: Vec<Vec<(u32, u32)>>) -> RoutingSolution {
        let depth = layouts.len();
        RoutingSolution {
            layouts: layouts
                .into_iter()
                .map(|l| Layout::from_physical(l).unwrap())
                .collect(),
            swaps,
            gates: vec![Vec::new(); depth],
            objective: 0.0,
            status: "Optimal".into(),
        }
    }

    #[test]
    fn test_verify_accepts_swapped_layouts() {
        let topo = Topology::new(3, [(0, 1), (1, 2)]).unwrap();
        let s = schedule(3, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(0, 2)]);
        let sol = manual(vec![vec![0, 1, 2], vec![1, 0, 2]], vec![vec![(0, 1)]]);
        sol.verify(&s, &topo).unwrap();
        assert_eq!(sol.num_swaps(), 1);
        assert_eq!(sol.initial_layout().physical_qubits(), &[0, 1, 2]);
        assert_eq!(sol.final_layout().physical_qubits(), &[1, 0, 2]);
        assert!(sol.swaps_at(7).is_empty());
    }

    #[test]
    fn test_verify_rejects_non_adjacent_gate() {
        let topo = Topology::new(3, [(0, 1), (1, 2)]).unwrap();
        let s = schedule(3, &[TwoQubitOp::cx(0, 2)]);
        let sol = manual(vec![vec![0, 1, 2]], vec![]);
        assert!(matches!(sol.verify(&s, &topo), Err(RoutingError::Solution(_))));
    }

    #[test]
    fn test_verify_rejects_missing_swap() {
        let topo = Topology::new(3, [(0, 1), (1, 2)]).unwrap();
        let s = schedule(3, &[TwoQubitOp::cx(0, 1), TwoQubitOp::cx(0, 2)]);
        let sol = manual(vec![vec![0, 1, 2], vec![1, 0, 2]], vec![vec![]]);
        assert!(matches!(sol.verify(&s, &topo), Err(RoutingError::Solution(_))));
    }

    #[test]
    fn test_trivial_uses_global_numbering() {
        let topo = Topology::new(2, [(0, 1)]).unwrap().with_global_qubits(vec![5, 9]);
        let sol = RoutingSolution::trivial(&topo);
        assert_eq!(sol.depth(), 1);
        assert_eq!(sol.num_swaps(), 0);
        assert_eq!(sol.status(), TRIVIAL_STATUS);
        assert_eq!(sol.initial_layout().get_physical(QubitId(1)), Some(9));
        sol.verify(&schedule(2, &[]), &topo).unwrap();
    }
}
