//! Gate fidelity curves and arc fidelities.
//!
//! A gate's [`FidelityCurve`] gives the best achievable fidelity when the
//! gate is synthesized from 0, 1, 2 or 3 native two-qubit primitives. On an
//! arc whose primitive has fidelity `f`, using `k` primitives succeeds with
//! `c[k] · f^k`; the builder prices a gate by the best of the four.
//!
//! Curves come from a [`GateFidelitySource`]. The built-in
//! [`WeylCurveTable`] derives them from the gate's Weyl chamber coordinates.

use std::f64::consts::FRAC_PI_4;
use std::fmt;
use std::path::Path;

use num_complex::Complex64;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RoutingError, RoutingResult};
use crate::topology::Topology;

/// Floor applied before taking logarithms of fidelities.
pub const MIN_FIDELITY: f64 = 1e-9;

/// Cost of a fidelity: `-ln(f)`, floored at [`MIN_FIDELITY`].
#[inline]
pub fn neg_log(fidelity: f64) -> f64 {
    -fidelity.max(MIN_FIDELITY).ln()
}

/// Fidelity of the best approximation using 0..=3 native primitives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FidelityCurve(pub [f64; 4]);

impl FidelityCurve {
    /// Curve of a gate that is exactly one native primitive.
    pub const NATIVE: FidelityCurve = FidelityCurve([0.6, 1.0, 1.0, 1.0]);

    /// `max_k c[k] · f^k`.
    pub fn max_expected(&self, arc_fidelity: f64) -> f64 {
        self.0
            .iter()
            .zip([1.0, arc_fidelity, arc_fidelity.powi(2), arc_fidelity.powi(3)])
            .map(|(c, fk)| c * fk)
            .fold(0.0, f64::max)
    }
}

/// Curves of a gate and of the gate followed by a SWAP on the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateCurves {
    /// The gate alone.
    pub direct: FidelityCurve,
    /// The gate composed with SWAP.
    pub mirrored: FidelityCurve,
}

impl GateCurves {
    /// `-ln` of the best expected fidelity on an arc of fidelity `f`.
    pub fn cost(&self, arc_fidelity: f64) -> f64 {
        neg_log(self.direct.max_expected(arc_fidelity))
    }

    /// `-ln` of the best expected mirrored fidelity on an arc of fidelity `f`.
    pub fn mirrored_cost(&self, arc_fidelity: f64) -> f64 {
        neg_log(self.mirrored.max_expected(arc_fidelity))
    }

    /// Curves of a CNOT-class gate.
    pub fn cnot() -> Self {
        WeylCoordinates::new(FRAC_PI_4, 0.0, 0.0).curves()
    }
}

/// Every gate gets the same curves.
impl GateFidelitySource for GateCurves {
    fn curves(&self, _gate: &str) -> RoutingResult<GateCurves> {
        Ok(*self)
    }
}

/// Supplies fidelity curves for gate labels.
pub trait GateFidelitySource {
    /// Curves for `gate`.
    fn curves(&self, gate: &str) -> RoutingResult<GateCurves>;
}

impl<F> GateFidelitySource for F
where
    F: Fn(&str) -> RoutingResult<GateCurves>,
{
    fn curves(&self, gate: &str) -> RoutingResult<GateCurves> {
        self(gate)
    }
}

/// Weyl chamber coordinates `(a, b, c)` of a two-qubit gate,
/// with `π/4 ≥ a ≥ b ≥ |c|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeylCoordinates {
    /// First coordinate.
    pub a: f64,
    /// Second coordinate.
    pub b: f64,
    /// Third coordinate.
    pub c: f64,
}

impl WeylCoordinates {
    /// Create coordinates.
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Traces of the best 0-, 1-, 2- and 3-primitive approximations.
    pub fn traces(&self) -> [Complex64; 4] {
        let Self { a, b, c } = *self;
        let d = FRAC_PI_4 - a;
        [
            4.0 * Complex64::new(a.cos() * b.cos() * c.cos(), a.sin() * b.sin() * c.sin()),
            4.0 * Complex64::new(d.cos() * b.cos() * c.cos(), d.sin() * b.sin() * c.sin()),
            Complex64::new(4.0 * c.cos(), 0.0),
            Complex64::new(4.0, 0.0),
        ]
    }

    /// Fidelity curve from the approximation traces.
    pub fn curve(&self) -> FidelityCurve {
        FidelityCurve(self.traces().map(trace_to_fidelity))
    }

    /// Coordinates of the gate composed with SWAP.
    pub fn mirrored(&self) -> Self {
        let mut m = Self::new(FRAC_PI_4 - self.c, FRAC_PI_4 - self.b, self.a - FRAC_PI_4);
        if m.a > FRAC_PI_4 {
            m.a = std::f64::consts::FRAC_PI_2 - m.a;
            m.c = -m.c;
        }
        m
    }

    /// Curves of the gate and of its mirror.
    pub fn curves(&self) -> GateCurves {
        GateCurves {
            direct: self.curve(),
            mirrored: self.mirrored().curve(),
        }
    }
}

/// Average gate fidelity from a 4×4 trace overlap.
#[inline]
pub fn trace_to_fidelity(trace: Complex64) -> f64 {
    (4.0 + trace.norm_sqr()) / 20.0
}

/// Built-in curve source keyed by lowercase gate label.
#[derive(Debug, Clone, Default)]
pub struct WeylCurveTable {
    gates: FxHashMap<String, WeylCoordinates>,
}

impl WeylCurveTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the common two-qubit gates.
    pub fn standard() -> Self {
        let cnot_class = WeylCoordinates::new(FRAC_PI_4, 0.0, 0.0);
        let iswap_class = WeylCoordinates::new(FRAC_PI_4, FRAC_PI_4, 0.0);
        let mut table = Self::new();
        for gate in ["cx", "cnot", "cy", "cz", "ch", "ecr"] {
            table.insert(gate, cnot_class);
        }
        for gate in ["iswap", "dcx"] {
            table.insert(gate, iswap_class);
        }
        table.insert("swap", WeylCoordinates::new(FRAC_PI_4, FRAC_PI_4, FRAC_PI_4));
        table
    }

    /// Register or replace a gate.
    pub fn insert(&mut self, gate: impl Into<String>, coords: WeylCoordinates) {
        self.gates.insert(gate.into().to_ascii_lowercase(), coords);
    }

    /// Coordinates of a gate, if known.
    pub fn get(&self, gate: &str) -> Option<WeylCoordinates> {
        self.gates.get(&gate.to_ascii_lowercase()).copied()
    }
}

impl GateFidelitySource for WeylCurveTable {
    fn curves(&self, gate: &str) -> RoutingResult<GateCurves> {
        self.get(gate).map(|c| c.curves()).ok_or_else(|| {
            RoutingError::Configuration(format!("no fidelity curve known for gate '{gate}'"))
        })
    }
}

/// Per-invocation memo of gate curves by label.
pub struct FidelityCache<'a> {
    source: &'a dyn GateFidelitySource,
    cache: FxHashMap<String, GateCurves>,
}

impl fmt::Debug for FidelityCache<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FidelityCache")
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl<'a> FidelityCache<'a> {
    /// Wrap a source.
    pub fn new(source: &'a dyn GateFidelitySource) -> Self {
        Self {
            source,
            cache: FxHashMap::default(),
        }
    }

    /// Curves for `gate`, resolving it on first use.
    pub fn get(&mut self, gate: &str) -> RoutingResult<GateCurves> {
        if let Some(curves) = self.cache.get(gate) {
            return Ok(*curves);
        }
        let curves = self.source.curves(gate)?;
        debug!(gate, ?curves, "Resolved gate fidelity curve");
        self.cache.insert(gate.to_string(), curves);
        Ok(curves)
    }

    /// Number of distinct labels resolved so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing was resolved yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// One calibrated two-qubit gate error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    /// Global physical qubits, either orientation.
    pub qubits: [u32; 2],
    /// Gate error rate in `[0, 1)`.
    pub error: f64,
}

/// Two-qubit gate error rates keyed by global physical pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CalibrationEntry>", into = "Vec<CalibrationEntry>")]
pub struct Calibration {
    errors: FxHashMap<(u32, u32), f64>,
}

impl From<Vec<CalibrationEntry>> for Calibration {
    fn from(entries: Vec<CalibrationEntry>) -> Self {
        let mut cal = Calibration::new();
        for e in entries {
            cal.set_error(e.qubits[0], e.qubits[1], e.error);
        }
        cal
    }
}

impl From<Calibration> for Vec<CalibrationEntry> {
    fn from(cal: Calibration) -> Self {
        let mut entries: Vec<_> = cal
            .errors
            .into_iter()
            .map(|((a, b), error)| CalibrationEntry { qubits: [a, b], error })
            .collect();
        entries.sort_by_key(|e| e.qubits);
        entries
    }
}

impl Calibration {
    /// An empty calibration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON array of `{"qubits": [a, b], "error": e}` entries.
    pub fn from_json_str(json: &str) -> RoutingResult<Self> {
        let cal: Calibration = serde_json::from_str(json)
            .map_err(|e| RoutingError::Configuration(format!("invalid calibration JSON: {e}")))?;
        cal.validate()?;
        Ok(cal)
    }

    /// Load from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> RoutingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RoutingError::Configuration(format!("cannot read calibration {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Set the error of the gate on `{a, b}`.
    pub fn set_error(&mut self, a: u32, b: u32, error: f64) {
        self.errors.insert((a.min(b), a.max(b)), error);
    }

    /// Error of the gate on `{a, b}`, if calibrated.
    pub fn error(&self, a: u32, b: u32) -> Option<f64> {
        self.errors.get(&(a.min(b), a.max(b))).copied()
    }

    /// Number of calibrated pairs.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no pair is calibrated.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Reject error rates outside `[0, 1)`.
    pub fn validate(&self) -> RoutingResult<()> {
        match self.errors.iter().find(|(_, e)| !valid_error_rate(**e)) {
            Some(((a, b), e)) => Err(RoutingError::Configuration(format!(
                "calibrated error {e} on ({a}, {b}) is outside [0, 1)"
            ))),
            None => Ok(()),
        }
    }
}

fn valid_error_rate(e: f64) -> bool {
    (0.0..1.0).contains(&e)
}

/// Decides the fidelity of every arc of a topology.
///
/// Calibrated pairs use `1 - error`; the rest use `1 - default_error_rate`.
#[derive(Debug, Clone, Copy)]
pub struct ArcFidelitySource<'a> {
    calibration: Option<&'a Calibration>,
    default_error_rate: Option<f64>,
}

impl<'a> ArcFidelitySource<'a> {
    /// Create a source.
    pub fn new(calibration: Option<&'a Calibration>, default_error_rate: Option<f64>) -> Self {
        Self {
            calibration,
            default_error_rate,
        }
    }

    /// Whether any arc fidelity can be derived at all.
    pub fn is_available(&self) -> bool {
        self.calibration.is_some() || self.default_error_rate.is_some()
    }

    /// Fidelity of the gate on global pair `{a, b}`.
    pub fn fidelity(&self, a: u32, b: u32) -> RoutingResult<f64> {
        let error = self
            .calibration
            .and_then(|c| c.error(a, b))
            .or(self.default_error_rate)
            .ok_or_else(|| {
                RoutingError::Configuration(format!(
                    "no calibration for ({a}, {b}) and no default error rate"
                ))
            })?;
        if !valid_error_rate(error) {
            return Err(RoutingError::Configuration(format!(
                "error rate {error} on ({a}, {b}) is outside [0, 1)"
            )));
        }
        Ok(1.0 - error)
    }

    /// Set the fidelity of every edge of `topology`, translating local
    /// indices to global ones.
    pub fn apply(&self, topology: &mut Topology) -> RoutingResult<()> {
        if !self.is_available() {
            return Err(RoutingError::Configuration(
                "an error-aware objective needs a calibration or a default error rate".into(),
            ));
        }
        let edges: Vec<_> = topology.edges().collect();
        for (i, j) in edges {
            let f = self.fidelity(topology.global_qubit(i), topology.global_qubit(j))?;
            topology.set_arc_fidelity(i, j, f)?;
        }
        debug!(
            edges = topology.arcs().len() / 2,
            average = topology.average_fidelity(),
            "Applied arc fidelities"
        );
        Ok(())
    }
}
