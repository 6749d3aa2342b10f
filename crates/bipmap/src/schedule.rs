//! Layered two-qubit gate schedule with swap-only dummy steps.
//!
//! Time steps are either real layers (a set of gates on disjoint logical
//! qubits) or dummy steps, which carry no gates and only give the router
//! room for extra swaps. Dummy steps sit between real layers, never after
//! the last one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RoutingError, RoutingResult};
use crate::fidelity::{FidelityCache, GateCurves};
use crate::layout::QubitId;

/// A two-qubit operation on fixed logical qubits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwoQubitOp {
    /// Logical qubit arguments, in gate order.
    pub qubits: [QubitId; 2],
    /// Gate label used to look up fidelity curves.
    pub gate: String,
}

impl TwoQubitOp {
    /// Create an operation.
    pub fn new(q0: u32, q1: u32, gate: impl Into<String>) -> Self {
        Self {
            qubits: [QubitId(q0), QubitId(q1)],
            gate: gate.into(),
        }
    }

    /// A CNOT.
    pub fn cx(control: u32, target: u32) -> Self {
        Self::new(control, target, "cx")
    }
}

/// A gate placed at a time step.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledGate {
    /// Logical qubit indices `(p, q)`.
    pub pair: (usize, usize),
    /// Gate label.
    pub gate: String,
    /// Fidelity curves of the gate.
    pub curves: GateCurves,
}

/// Layered gates plus dummy steps.
#[derive(Debug, Clone)]
pub struct Schedule {
    num_qubits: usize,
    /// Real layers, without dummy steps.
    layers: Vec<Vec<ScheduledGate>>,
    /// Dummy steps after each real layer.
    dummies_after: Vec<usize>,
    /// Time step of each real layer.
    layer_steps: Vec<usize>,
    /// Real layer at each time step.
    step_layers: Vec<Option<usize>>,
}

impl Schedule {
    /// Layer `ops` as soon as possible and insert `dummy_steps` dummy steps
    /// after every layer but the last.
    ///
    /// Each operation lands in the first layer after the last layer touching
    /// either of its qubits, so per-qubit order is preserved.
    pub fn build(
        num_qubits: usize,
        ops: &[TwoQubitOp],
        dummy_steps: usize,
        curves: &mut FidelityCache<'_>,
    ) -> RoutingResult<Self> {
        let mut last_layer: Vec<Option<usize>> = vec![None; num_qubits];
        let mut layers: Vec<Vec<ScheduledGate>> = Vec::new();
        for op in ops {
            let gate = schedule_gate(num_qubits, op, curves)?;
            let (p, q) = gate.pair;
            let layer = last_layer[p].max(last_layer[q]).map_or(0, |l| l + 1);
            if layer == layers.len() {
                layers.push(Vec::new());
            }
            layers[layer].push(gate);
            last_layer[p] = Some(layer);
            last_layer[q] = Some(layer);
        }
        Ok(Self::assemble(num_qubits, layers, |_| dummy_steps))
    }

    /// Use externally computed layers.
    ///
    /// Empty layers are dropped. A logical qubit appearing twice within a
    /// layer is rejected.
    pub fn from_layers(
        num_qubits: usize,
        layers: &[Vec<TwoQubitOp>],
        dummy_steps: usize,
        curves: &mut FidelityCache<'_>,
    ) -> RoutingResult<Self> {
        let mut scheduled = Vec::with_capacity(layers.len());
        for (k, layer) in layers.iter().enumerate() {
            if layer.is_empty() {
                continue;
            }
            let mut busy = vec![false; num_qubits];
            let mut gates = Vec::with_capacity(layer.len());
            for op in layer {
                let gate = schedule_gate(num_qubits, op, curves)?;
                let (p, q) = gate.pair;
                if busy[p] || busy[q] {
                    return Err(RoutingError::Configuration(format!(
                        "layer {k} uses a logical qubit of {}, {} twice",
                        op.qubits[0], op.qubits[1]
                    )));
                }
                busy[p] = true;
                busy[q] = true;
                gates.push(gate);
            }
            scheduled.push(gates);
        }
        Ok(Self::assemble(num_qubits, scheduled, |_| dummy_steps))
    }

    fn assemble(
        num_qubits: usize,
        layers: Vec<Vec<ScheduledGate>>,
        dummies: impl Fn(usize) -> usize,
    ) -> Self {
        let last = layers.len().saturating_sub(1);
        let dummies_after: Vec<usize> = (0..layers.len())
            .map(|k| if k == last { 0 } else { dummies(k) })
            .collect();

        let mut layer_steps = Vec::with_capacity(layers.len());
        let mut step_layers = Vec::new();
        for (k, &d) in dummies_after.iter().enumerate() {
            layer_steps.push(step_layers.len());
            step_layers.push(Some(k));
            step_layers.extend(std::iter::repeat_n(None, d));
        }

        debug!(
            layers = layers.len(),
            depth = step_layers.len(),
            "Assembled gate schedule"
        );
        Self {
            num_qubits,
            layers,
            dummies_after,
            layer_steps,
            step_layers,
        }
    }

    /// Same layers, with `dummy_steps` dummy steps after every layer
    /// `k < until_layer` and none after.
    pub fn with_dummies_until(&self, until_layer: usize, dummy_steps: usize) -> Self {
        Self::assemble(self.num_qubits, self.layers.clone(), |k| {
            if k < until_layer { dummy_steps } else { 0 }
        })
    }

    /// Number of logical qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of time steps, dummy steps included.
    pub fn depth(&self) -> usize {
        self.step_layers.len()
    }

    /// Number of real layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Total number of gates.
    pub fn num_gates(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Whether step `t` is a dummy step.
    pub fn is_dummy_step(&self, t: usize) -> bool {
        matches!(self.step_layers.get(t), Some(None))
    }

    /// Gates at step `t`; empty for dummy steps.
    pub fn gates_at(&self, t: usize) -> &[ScheduledGate] {
        match self.step_layers.get(t) {
            Some(Some(k)) => &self.layers[*k],
            _ => &[],
        }
    }

    /// Time step of real layer `k`.
    pub fn layer_step(&self, k: usize) -> Option<usize> {
        self.layer_steps.get(k).copied()
    }

    /// Real layer at step `t`, `None` for dummy steps.
    pub fn step_layer(&self, t: usize) -> Option<usize> {
        self.step_layers.get(t).copied().flatten()
    }

    /// Dummy steps following real layer `k`.
    pub fn dummies_after(&self, k: usize) -> usize {
        self.dummies_after.get(k).copied().unwrap_or(0)
    }

    /// Mask of logical qubits busy in a gate at step `t`.
    pub fn used_qubits(&self, t: usize) -> Vec<bool> {
        let mut used = vec![false; self.num_qubits];
        for g in self.gates_at(t) {
            used[g.pair.0] = true;
            used[g.pair.1] = true;
        }
        used
    }
}

fn schedule_gate(
    num_qubits: usize,
    op: &TwoQubitOp,
    curves: &mut FidelityCache<'_>,
) -> RoutingResult<ScheduledGate> {
    let [a, b] = op.qubits;
    if a.index() >= num_qubits || b.index() >= num_qubits {
        return Err(RoutingError::Configuration(format!(
            "gate {} on ({a}, {b}) uses a qubit outside 0..{num_qubits}",
            op.gate
        )));
    }
    if a == b {
        return Err(RoutingError::Configuration(format!(
            "gate {} acts twice on {a}",
            op.gate
        )));
    }
    Ok(ScheduledGate {
        pair: (a.index(), b.index()),
        gate: op.gate.clone(),
        curves: curves.get(&op.gate)?,
    })
}
