//! Benchmarks for routing model construction
//!
//! Run with: cargo bench -p bipmap

use bipmap::{
    CouplingMap, FidelityCache, GateCurves, ModelBuilder, Objective, Schedule, SplitPlan,
    TwoQubitOp, WindowDecomposer,
};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Pseudo-random gate stream with a fixed pattern.
fn ops(num_qubits: u32, num_gates: usize) -> Vec<TwoQubitOp> {
    (0..num_gates)
        .map(|k| {
            let a = (k as u32 * 7 + 3) % num_qubits;
            let b = (a + 1 + (k as u32 * 5) % (num_qubits - 1)) % num_qubits;
            TwoQubitOp::cx(a, b)
        })
        .collect()
}

/// Benchmark building the exact model on square grids
fn bench_exact_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_model");
    let curves = GateCurves::cnot();

    for side in &[2u32, 3, 4] {
        let n = side * side;
        let topology = CouplingMap::grid(*side, *side).reduce(None).unwrap();
        let mut cache = FidelityCache::new(&curves);
        let schedule = Schedule::build(n as usize, &ops(n, 12), 1, &mut cache).unwrap();

        for (label, objective) in [("depth", Objective::Depth), ("gate_error", Objective::GateError)] {
            let builder = ModelBuilder::new(&topology, objective, 1);
            group.bench_with_input(BenchmarkId::new(label, n), &schedule, |b, s| {
                b.iter(|| builder.build(black_box(s)).unwrap());
            });
        }
    }

    group.finish();
}

/// Benchmark building the first window model
fn bench_window_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_model");
    let curves = GateCurves::cnot();
    let topology = CouplingMap::grid(3, 3).reduce(None).unwrap();
    let mut cache = FidelityCache::new(&curves);
    let schedule = Schedule::build(9, &ops(9, 30), 1, &mut cache).unwrap();
    let plan = SplitPlan::resolve(-1, schedule.num_layers()).unwrap();
    let window = WindowDecomposer::new(&schedule, plan, 1).window(0);

    for horizon in &[1usize, 2, 3] {
        let builder = ModelBuilder::new(&topology, Objective::Depth, *horizon);
        group.bench_with_input(BenchmarkId::new("horizon", horizon), &window, |b, w| {
            b.iter(|| builder.build_window(black_box(w)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_exact_model, bench_window_model);
criterion_main!(benches);
