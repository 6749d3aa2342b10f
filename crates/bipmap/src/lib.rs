//! Optimal qubit routing as a binary integer program.
//!
//! `bipmap` maps the logical qubits of a circuit onto a device's coupling
//! graph and inserts swaps so that every two-qubit gate runs on coupled
//! physical qubits. The whole routing problem is one mixed-integer linear
//! program: per time step a bijection from logical to physical qubits,
//! movement variables between steps, and an arc choice per gate. Solving it
//! gives the swap sequence that minimizes depth, accumulated gate error, or
//! a weighted mix of both.
//!
//! Large circuits can be solved in rolling windows: each window routes a
//! prefix exactly and sees the rest of the circuit through an approximate
//! long-arc model; its prefix is then fixed in the next model.
//!
//! # Example
//!
//! ```no_run
//! use bipmap::{CouplingMap, Router, RoutingConfig, TwoQubitOp};
//!
//! let config = RoutingConfig {
//!     dummy_steps: 1,
//!     ..Default::default()
//! };
//! let router = Router::new(CouplingMap::linear(3), config);
//! let ops = [TwoQubitOp::cx(0, 1), TwoQubitOp::cx(1, 2), TwoQubitOp::cx(0, 2)];
//! let solution = router.route(3, &ops).unwrap();
//!
//! for t in 0..solution.depth() {
//!     println!("{t}: {:?} swaps {:?}", solution.layout_at(t), solution.swaps_at(t));
//! }
//! ```
//!
//! # Modules
//!
//! - [`coupling`] / [`topology`]: device connectivity and its reduction.
//! - [`schedule`]: layering of two-qubit gates with dummy steps.
//! - [`fidelity`]: gate fidelity curves and arc calibration.
//! - [`builder`]: the routing model.
//! - [`window`] / [`driver`]: rolling windows and the solve sequence.
//! - [`solution`]: decoding and verification.
//! - [`router`]: the entry point tying it together.

pub mod builder;
pub mod config;
pub mod coupling;
pub mod driver;
pub mod error;
pub mod fidelity;
pub mod layout;
pub mod router;
pub mod schedule;
pub mod solution;
pub mod topology;
pub mod window;

pub use builder::{ModelBuilder, ModelModifier, RoutingModel, RoutingVars};
pub use config::{Objective, ObjectiveKind, RoutingConfig};
pub use coupling::CouplingMap;
pub use driver::{DriverState, SolveDriver, SolvedModel, Stage};
pub use error::{RoutingError, RoutingResult};
pub use fidelity::{
    ArcFidelitySource, Calibration, CalibrationEntry, FidelityCache, FidelityCurve, GateCurves,
    GateFidelitySource, WeylCoordinates, WeylCurveTable,
};
pub use layout::{Layout, QubitId};
pub use router::{Router, RoutingRun};
pub use schedule::{Schedule, ScheduledGate, TwoQubitOp};
pub use solution::{PlacedGate, RoutingSolution};
pub use topology::{LongArcs, Topology};
pub use window::{SplitPlan, Window, WindowDecomposer};

pub use bipmap_milp;
