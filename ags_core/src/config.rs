//! Runtime configuration types for the control loop.
//!
//! These are the structs consumed by `MpcOptimizer` and the runner.
//! They are separate from the TOML-deserialized config in `ags_config`.

use std::path::PathBuf;
use std::time::Duration;

/// Controller tuning, supplied once per optimizer instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerCfg {
    /// mg/dL drop per fully metabolized unit of insulin.
    pub sensitivity: i32,
    /// Minutes until plasma insulin peaks.
    pub peak_insulin_time: f64,
    /// Minutes until insulin is fully cleared.
    pub activity_duration_minutes: f64,
    /// Target BG (mg/dL).
    pub target: i32,
    /// Largest candidate bolus (units).
    pub max_bolus: f64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            sensitivity: 30,
            peak_insulin_time: 57.0,
            activity_duration_minutes: 90.0,
            target: 110,
            max_bolus: 16.0,
        }
    }
}

/// Which prediction model a cycle runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelChoice {
    #[default]
    StateSpace,
    Statistical,
}

impl ModelChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StateSpace => "state_space",
            Self::Statistical => "statistical",
        }
    }
}

/// Statistical model wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCfg {
    pub choice: ModelChoice,
    pub exchange_file: PathBuf,
    pub archive_predictions: bool,
}

impl Default for ModelCfg {
    fn default() -> Self {
        Self {
            choice: ModelChoice::StateSpace,
            exchange_file: PathBuf::from("predictor/exchange.txt"),
            archive_predictions: false,
        }
    }
}

/// Control loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleCfg {
    /// Time between the starts of consecutive cycles.
    pub wake_interval: Duration,
    /// Stop after this many cycles; run until shutdown when `None`.
    pub max_cycles: Option<u64>,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            wake_interval: Duration::from_secs(240),
            max_cycles: None,
        }
    }
}
