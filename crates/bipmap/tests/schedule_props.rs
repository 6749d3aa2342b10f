//! Property-based tests for gate layering and window planning.

use bipmap::{FidelityCache, GateCurves, Schedule, SplitPlan, TwoQubitOp, WindowDecomposer};
use proptest::prelude::*;

/// Random gate streams on 2-6 qubits.
fn arb_ops() -> impl Strategy<Value = (usize, Vec<TwoQubitOp>)> {
    (2_u32..=6).prop_flat_map(|n| {
        let op = (0..n, 0..n)
            .prop_filter("Gate qubits must differ", |(a, b)| a != b)
            .prop_map(|(a, b)| TwoQubitOp::cx(a, b));
        (Just(n as usize), prop::collection::vec(op, 0..=20))
    })
}

fn build(n: usize, ops: &[TwoQubitOp], d: usize) -> Schedule {
    let curves = GateCurves::cnot();
    let mut cache = FidelityCache::new(&curves);
    Schedule::build(n, ops, d, &mut cache).expect("valid ops")
}

proptest! {
    /// Every gate lands in exactly one layer and no qubit is used twice per layer.
    #[test]
    fn test_layers_are_disjoint((n, ops) in arb_ops(), d in 0_usize..3) {
        let schedule = build(n, &ops, d);
        prop_assert_eq!(schedule.num_gates(), ops.len());
        for t in 0..schedule.depth() {
            let mut seen = vec![false; n];
            for gate in schedule.gates_at(t) {
                let (p, q) = gate.pair;
                prop_assert!(!seen[p] && !seen[q]);
                seen[p] = true;
                seen[q] = true;
            }
        }
    }

    /// Per-qubit gate order is preserved.
    #[test]
    fn test_per_qubit_order((n, ops) in arb_ops()) {
        let schedule = build(n, &ops, 0);
        let mut expected: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for op in &ops {
            let pair = (op.qubits[0].index(), op.qubits[1].index());
            expected[pair.0].push(pair);
            expected[pair.1].push(pair);
        }
        let mut actual: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for t in 0..schedule.depth() {
            for gate in schedule.gates_at(t) {
                actual[gate.pair.0].push(gate.pair);
                actual[gate.pair.1].push(gate.pair);
            }
        }
        prop_assert_eq!(actual, expected);
    }

    /// Dummy steps sit between real layers and never after the last one.
    #[test]
    fn test_dummy_placement((n, ops) in arb_ops(), d in 0_usize..3) {
        let schedule = build(n, &ops, d);
        let layers = schedule.num_layers();
        prop_assert_eq!(schedule.depth(), layers + d * layers.saturating_sub(1));
        if schedule.depth() > 0 {
            prop_assert!(!schedule.is_dummy_step(0));
            prop_assert!(!schedule.is_dummy_step(schedule.depth() - 1));
        }
    }

    /// Split counts stay within range and time shares add up.
    #[test]
    fn test_split_plan(requested in -1_i32..8, layers in 0_usize..40, total in 1.0_f64..100.0) {
        let plan = SplitPlan::resolve(requested, layers).expect("valid request");
        prop_assert!(plan.num_splits() >= 1);
        prop_assert!(plan.num_splits() <= layers.saturating_sub(2).max(1));
        prop_assert!(plan.split_size() >= 1);
        let (windows, exact) = plan.time_limits(total);
        prop_assert_eq!(windows.len(), plan.num_windows());
        let sum: f64 = windows.iter().sum::<f64>() + exact;
        prop_assert!((sum - total).abs() < 1e-9 * total.max(1.0));
        for pair in windows.windows(2) {
            prop_assert!(pair[0] > pair[1]);
        }
    }

    /// Window prefixes share the step structure of the full schedule.
    #[test]
    fn test_window_prefix_matches((n, ops) in arb_ops(), d in 0_usize..3, requested in 2_i32..5) {
        let full = build(n, &ops, d);
        let plan = SplitPlan::resolve(requested, full.num_layers()).expect("valid request");
        let decomposer = WindowDecomposer::new(&full, plan, d);
        let mut last_boundary = 0;
        for window in decomposer.windows() {
            prop_assert!(window.boundary > last_boundary);
            prop_assert!(window.boundary <= window.schedule.depth());
            prop_assert!(!window.schedule.is_dummy_step(window.boundary - 1));
            for t in 0..window.boundary {
                prop_assert_eq!(window.schedule.is_dummy_step(t), full.is_dummy_step(t));
                prop_assert_eq!(window.schedule.step_layer(t), full.step_layer(t));
            }
            for t in window.boundary..window.schedule.depth() {
                prop_assert!(!window.schedule.is_dummy_step(t));
            }
            last_boundary = window.boundary;
        }
    }
}
