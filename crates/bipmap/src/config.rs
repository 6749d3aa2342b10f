//! Routing configuration.
//!
//! [`RoutingConfig`] is plain serde data, loadable from JSON or YAML. Every
//! field has a default, so `{}` is a valid configuration. Values are checked
//! by [`RoutingConfig::validate`] and turned into typed settings
//! ([`Objective`], [`SplitPlan`](crate::window::SplitPlan)) before use.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bipmap_milp::SolveParams;
use serde::{Deserialize, Serialize};

use crate::error::{RoutingError, RoutingResult};

/// Objective tag as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Minimize used dummy steps.
    Depth,
    /// Minimize accumulated gate error.
    GateError,
    /// Gate error plus weighted depth.
    Balanced,
}

impl FromStr for ObjectiveKind {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depth" => Ok(ObjectiveKind::Depth),
            "gate_error" | "error" => Ok(ObjectiveKind::GateError),
            "balanced" => Ok(ObjectiveKind::Balanced),
            _ => Err(RoutingError::UnknownObjective(s.to_string())),
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectiveKind::Depth => "depth",
            ObjectiveKind::GateError => "gate_error",
            ObjectiveKind::Balanced => "balanced",
        };
        f.write_str(s)
    }
}

/// Objective function minimized by every model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// `Σ z[t] + 0.01 · Σ moves`.
    Depth,
    /// `Σ -ln(fidelity)` over gates and swaps.
    GateError,
    /// Gate error plus `depth_weight · Σ z[t]`.
    Balanced {
        /// Weight of each used dummy step.
        depth_weight: f64,
    },
}

impl Objective {
    /// Whether arc fidelities are needed to price the model.
    pub fn needs_fidelity(&self) -> bool {
        !matches!(self, Objective::Depth)
    }
}

/// Routing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// `depth`, `gate_error` (alias `error`) or `balanced`.
    #[serde(default = "default_objective")]
    pub objective: String,

    /// Weight of used dummy steps in the `balanced` objective.
    #[serde(default = "default_depth_weight")]
    pub depth_weight: f64,

    /// Error rate of arcs without calibration data.
    #[serde(default = "default_error_rate")]
    pub default_error_rate: Option<f64>,

    /// Swap-only steps inserted after every layer but the last.
    #[serde(default)]
    pub dummy_steps: usize,

    /// `-1` automatic, `0`/`1` disabled, `>1` number of windows.
    #[serde(default = "default_num_splits")]
    pub num_splits: i32,

    /// Hop horizon of approximate moves in window tails.
    #[serde(default)]
    pub long_arc_horizon: Option<usize>,

    /// Total solver time budget in seconds.
    #[serde(default = "default_time_limit")]
    pub time_limit: f64,

    /// Solver thread hint.
    #[serde(default)]
    pub threads: Option<u32>,

    /// Solver random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_objective() -> String {
    "depth".into()
}

fn default_depth_weight() -> f64 {
    0.1
}

fn default_error_rate() -> Option<f64> {
    Some(5e-3)
}

fn default_num_splits() -> i32 {
    1
}

fn default_time_limit() -> f64 {
    30.0
}

fn default_seed() -> u64 {
    777
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            objective: default_objective(),
            depth_weight: default_depth_weight(),
            default_error_rate: default_error_rate(),
            dummy_steps: 0,
            num_splits: default_num_splits(),
            long_arc_horizon: None,
            time_limit: default_time_limit(),
            threads: None,
            seed: default_seed(),
        }
    }
}

impl RoutingConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> RoutingResult<Self> {
        let config: RoutingConfig = serde_json::from_str(json)
            .map_err(|e| RoutingError::Configuration(format!("invalid JSON config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> RoutingResult<Self> {
        let config: RoutingConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| RoutingError::Configuration(format!("invalid YAML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file; `.json` is parsed as JSON, anything else
    /// as YAML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> RoutingResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RoutingError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Override solver settings from `BIPMAP_TIME_LIMIT`, `BIPMAP_THREADS`
    /// and `BIPMAP_SEED`. Unparsable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Override solver settings from a variable lookup keyed like
    /// [`with_env_overrides`](Self::with_env_overrides).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "BIPMAP_TIME_LIMIT") {
            self.time_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "BIPMAP_THREADS") {
            self.threads = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "BIPMAP_SEED") {
            self.seed = v;
        }
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RoutingResult<()> {
        self.objective_kind()?;
        if !self.depth_weight.is_finite() || self.depth_weight < 0.0 {
            return Err(RoutingError::Configuration(format!(
                "depth_weight must be a non-negative number, got {}",
                self.depth_weight
            )));
        }
        if let Some(rate) = self.default_error_rate {
            if !(0.0..1.0).contains(&rate) {
                return Err(RoutingError::Configuration(format!(
                    "default_error_rate must lie in [0, 1), got {rate}"
                )));
            }
        }
        if self.num_splits < -1 {
            return Err(RoutingError::Configuration(format!(
                "num_splits must be -1, 0 or positive, got {}",
                self.num_splits
            )));
        }
        if !(self.time_limit > 0.0) {
            return Err(RoutingError::Configuration(format!(
                "time_limit must be positive, got {}",
                self.time_limit
            )));
        }
        if self.threads == Some(0) {
            return Err(RoutingError::Configuration("threads must be positive".into()));
        }
        Ok(())
    }

    /// Parsed objective tag.
    pub fn objective_kind(&self) -> RoutingResult<ObjectiveKind> {
        self.objective.parse()
    }

    /// Typed objective.
    pub fn objective(&self) -> RoutingResult<Objective> {
        Ok(match self.objective_kind()? {
            ObjectiveKind::Depth => Objective::Depth,
            ObjectiveKind::GateError => Objective::GateError,
            ObjectiveKind::Balanced => Objective::Balanced {
                depth_weight: self.depth_weight,
            },
        })
    }

    /// Hop horizon of long arcs: explicit value, or `max(dummy_steps, 1)`.
    pub fn horizon(&self) -> usize {
        self.long_arc_horizon.unwrap_or(self.dummy_steps.max(1))
    }

    /// Solver parameters without a time limit; the driver assigns shares.
    pub fn solve_params(&self) -> SolveParams {
        SolveParams {
            time_limit: None,
            threads: self.threads,
            random_seed: self.seed,
            verbose: false,
        }
    }
}

fn parse_var<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
