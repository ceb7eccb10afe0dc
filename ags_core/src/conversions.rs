//! `From` implementations bridging `ags_config` types to `ags_core` types.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ControllerCfg, ModelCfg, ModelChoice, ScheduleCfg};

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&ags_config::ControllerCfg> for ControllerCfg {
    fn from(c: &ags_config::ControllerCfg) -> Self {
        Self {
            sensitivity: c.sensitivity,
            peak_insulin_time: c.peak_insulin_time,
            activity_duration_minutes: c.activity_duration_minutes,
            target: c.target,
            max_bolus: c.max_bolus,
        }
    }
}

// ── ModelCfg ─────────────────────────────────────────────────────────────────

impl From<ags_config::ModelKind> for ModelChoice {
    fn from(k: ags_config::ModelKind) -> Self {
        match k {
            ags_config::ModelKind::StateSpace => Self::StateSpace,
            ags_config::ModelKind::Statistical => Self::Statistical,
        }
    }
}

impl From<&ags_config::Config> for ModelCfg {
    fn from(c: &ags_config::Config) -> Self {
        Self {
            choice: c.model.kind.into(),
            exchange_file: PathBuf::from(&c.collaborators.exchange_file),
            archive_predictions: c.model.archive_predictions,
        }
    }
}

// ── ScheduleCfg ──────────────────────────────────────────────────────────────

impl From<&ags_config::Schedule> for ScheduleCfg {
    fn from(s: &ags_config::Schedule) -> Self {
        Self {
            wake_interval: Duration::from_secs(s.wake_interval_s),
            max_cycles: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_conversion() {
        let cfg = ags_config::Config::default();
        assert_eq!(ControllerCfg::from(&cfg.controller), ControllerCfg::default());
        assert_eq!(ScheduleCfg::from(&cfg.schedule), ScheduleCfg::default());
        assert_eq!(ModelCfg::from(&cfg), ModelCfg::default());
    }
}
