//! Rolling time-window decomposition.
//!
//! A schedule with `L` real layers is solved as `S - 1` window models
//! followed by the exact model. Window `i` models dummy steps and exact
//! connectivity only up to layer `split_size · (i + 1)`; the rest of the
//! circuit is kept with approximate long-arc moves so the window still sees
//! every gate. Each window's prefix is fixed in the next model.

use tracing::info;

use crate::error::{RoutingError, RoutingResult};
use crate::schedule::Schedule;

/// Resolved split count and window sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    num_splits: usize,
    split_size: usize,
}

impl SplitPlan {
    /// Resolve a requested split count for `num_layers` real layers.
    ///
    /// `0` and `1` disable splitting; `-1` picks `max(1, (L - 2) / 2)`.
    /// The result is clamped to `max(1, L - 2)` since the first layer always
    /// belongs to the first window and the last only to the exact model.
    pub fn resolve(requested: i32, num_layers: usize) -> RoutingResult<Self> {
        let layers = num_layers as i64;
        let mut splits: i64 = match requested {
            0 | 1 => 1,
            -1 => ((layers - 2).div_euclid(2)).max(1),
            n if n < -1 => {
                return Err(RoutingError::Configuration(format!(
                    "invalid split count {n}: use -1 (automatic), 0/1 (disabled) or > 1"
                )));
            }
            n => i64::from(n),
        };
        let inner = (layers - 2).max(1);
        if splits > 1 {
            splits = splits.min(inner);
        }
        Ok(Self {
            num_splits: splits as usize,
            split_size: (inner / splits).max(1) as usize,
        })
    }

    /// Plan without windows.
    pub fn disabled() -> Self {
        Self {
            num_splits: 1,
            split_size: 1,
        }
    }

    /// Resolved split count `S`.
    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    /// Number of window models, `S - 1`.
    pub fn num_windows(&self) -> usize {
        self.num_splits - 1
    }

    /// Layers added by each window.
    pub fn split_size(&self) -> usize {
        self.split_size
    }

    /// Last exactly modelled real layer of window `i`.
    pub fn window_layer(&self, i: usize) -> usize {
        self.split_size * (i + 1)
    }

    /// Time budget of each window and of the exact model.
    ///
    /// Window `i` gets `T·(S-i)/(S(S+1)/2)`, the exact model gets
    /// `T/(S(S+1)/2)`, so earlier (harder) models get more time and the
    /// shares add up to `T`.
    pub fn time_limits(&self, total: f64) -> (Vec<f64>, f64) {
        let s = self.num_splits as f64;
        let units = s * (s + 1.0) / 2.0;
        let windows = (0..self.num_windows())
            .map(|i| total * (s - i as f64) / units)
            .collect();
        (windows, total / units)
    }
}

/// A window model's schedule and boundary.
#[derive(Debug, Clone)]
pub struct Window {
    /// Window index.
    pub index: usize,
    /// All real layers; dummy steps only within the exact prefix.
    pub schedule: Schedule,
    /// Steps `t < boundary` form the exactly modelled prefix.
    pub boundary: usize,
}

/// Produces window schedules for a full schedule.
#[derive(Debug, Clone)]
pub struct WindowDecomposer<'a> {
    schedule: &'a Schedule,
    plan: SplitPlan,
    dummy_steps: usize,
}

impl<'a> WindowDecomposer<'a> {
    /// Create a decomposer for `schedule`, built with `dummy_steps` dummy
    /// steps per layer gap.
    pub fn new(schedule: &'a Schedule, plan: SplitPlan, dummy_steps: usize) -> Self {
        Self {
            schedule,
            plan,
            dummy_steps,
        }
    }

    /// The split plan.
    pub fn plan(&self) -> SplitPlan {
        self.plan
    }

    /// Schedule and boundary of window `i`.
    pub fn window(&self, i: usize) -> Window {
        let last_layer = self.plan.window_layer(i);
        let schedule = self.schedule.with_dummies_until(last_layer, self.dummy_steps);
        let boundary = schedule
            .layer_step(last_layer)
            .map_or(schedule.depth(), |t| t + 1);
        info!(
            window = i,
            boundary,
            depth = schedule.depth(),
            "Window optimizes first {boundary} steps"
        );
        Window {
            index: i,
            schedule,
            boundary,
        }
    }

    /// Windows in solve order, built lazily.
    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.plan.num_windows()).map(move |i| self.window(i))
    }
}
