//! Model-predictive insulin optimizer.
//!
//! One optimizer instance serves one cycle: inputs are accumulated, the model
//! produces a baseline trajectory, then every candidate bolus from `max_bolus`
//! down to zero is projected and scored by mean absolute error against the
//! target. The lowest-error candidate becomes the recommendation.

use crate::config::ControllerCfg;
use crate::error::{AgsError, BuildError, Result};
use crate::model::PredictionModel;
use crate::util::{
    HORIZON_STEPS, MAX_BOLUS_LIMIT, STEP_MINUTES, candidate_boluses, mean_abs_error,
};

/// The chosen correction for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Units of insulin to administer now.
    pub bolus: f64,
    /// Projected BG trajectory under `bolus`, one point per 5 minutes.
    pub trajectory: Vec<f64>,
    pub mean_abs_error: f64,
    /// Label of the model that produced the trajectory.
    pub model: String,
}

pub struct MpcOptimizer {
    cfg: ControllerCfg,
    model: Box<dyn PredictionModel>,
    label: String,
    bg_inputs: Vec<i32>,
    insulin_inputs: Vec<f64>,
    predictions: Vec<f64>,
    control_output: Vec<f64>,
    recommendation: Option<Recommendation>,
}

impl core::fmt::Debug for MpcOptimizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MpcOptimizer")
            .field("cfg", &self.cfg)
            .field("model", &self.label)
            .field("bg_inputs", &self.bg_inputs.len())
            .field("insulin_inputs", &self.insulin_inputs.len())
            .field("predictions", &self.predictions.len())
            .finish()
    }
}

/// Builder for `MpcOptimizer`. All fields are validated on `try_build()`.
#[derive(Default)]
pub struct MpcOptimizerBuilder {
    cfg: ControllerCfg,
    model: Option<Box<dyn PredictionModel>>,
    label: Option<String>,
}

impl MpcOptimizerBuilder {
    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn sensitivity(mut self, mg_dl_per_unit: i32) -> Self {
        self.cfg.sensitivity = mg_dl_per_unit;
        self
    }

    pub fn target(mut self, mg_dl: i32) -> Self {
        self.cfg.target = mg_dl;
        self
    }

    pub fn max_bolus(mut self, units: f64) -> Self {
        self.cfg.max_bolus = units;
        self
    }

    pub fn insulin_timing(mut self, peak_minutes: f64, activity_minutes: f64) -> Self {
        self.cfg.peak_insulin_time = peak_minutes;
        self.cfg.activity_duration_minutes = activity_minutes;
        self
    }

    pub fn model(mut self, model: Box<dyn PredictionModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Label recorded in each `Recommendation`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn try_build(self) -> Result<MpcOptimizer> {
        let c = &self.cfg;
        if c.sensitivity <= 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensitivity must be > 0",
            )));
        }
        if c.target <= 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "target must be > 0",
            )));
        }
        if !c.max_bolus.is_finite() || c.max_bolus < 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_bolus must be finite and >= 0",
            )));
        }
        if c.max_bolus > MAX_BOLUS_LIMIT {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_bolus must not exceed 100 units",
            )));
        }
        if !(c.peak_insulin_time.is_finite() && c.peak_insulin_time > 0.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "peak_insulin_time must be > 0",
            )));
        }
        if !(c.activity_duration_minutes.is_finite()
            && c.activity_duration_minutes > c.peak_insulin_time)
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "activity_duration_minutes must exceed peak_insulin_time",
            )));
        }
        let model = self
            .model
            .ok_or_else(|| eyre::Report::new(BuildError::MissingModel))?;
        Ok(MpcOptimizer {
            cfg: self.cfg,
            model,
            label: self.label.unwrap_or_else(|| "model".to_string()),
            bg_inputs: Vec::new(),
            insulin_inputs: Vec::new(),
            predictions: Vec::new(),
            control_output: Vec::new(),
            recommendation: None,
        })
    }
}

impl MpcOptimizer {
    pub fn builder() -> MpcOptimizerBuilder {
        MpcOptimizerBuilder::default()
    }

    pub fn config(&self) -> &ControllerCfg {
        &self.cfg
    }

    /// Append one BG value (mg/dL). Values are held oldest first.
    pub fn add_bg_input(&mut self, value: i32) {
        self.bg_inputs.push(value);
    }

    /// Append one insulin-on-board value; index 0 is t = 0, then 5 minute steps.
    pub fn add_insulin_input(&mut self, value: f64) {
        self.insulin_inputs.push(value);
    }

    pub fn bg_list_size(&self) -> usize {
        self.bg_inputs.len()
    }

    pub fn bg_inputs(&self) -> &[i32] {
        &self.bg_inputs
    }

    pub fn insulin_inputs(&self) -> &[f64] {
        &self.insulin_inputs
    }

    /// Baseline trajectory accumulated by `run_prediction_model`.
    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    /// Trajectory of the chosen candidate; empty until a search has run.
    pub fn control_output(&self) -> &[f64] {
        &self.control_output
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    /// Run the model once on the accumulated inputs and append its output to
    /// the baseline trajectory.
    pub fn run_prediction_model(&mut self) -> Result<&[f64]> {
        let out = self.model.predict(&self.bg_inputs, &self.insulin_inputs)?;
        tracing::debug!(model = %self.label, points = out.len(), "baseline prediction");
        self.predictions.extend_from_slice(&out);
        Ok(self.predictions.as_slice())
    }

    /// Insulin on board at `t = 5, 10, ..., 5n` minutes after giving `bolus` now,
    /// on top of the existing forecast.
    pub fn insulin_action_curve(&self, n: usize, bolus: f64) -> Result<Vec<f64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if self.insulin_inputs.len() < n + 1 {
            return Err(AgsError::insufficient(n + 1, self.insulin_inputs.len()).into());
        }
        let end = (n * STEP_MINUTES) as f64;
        let iob = iob_fraction_fn(self.cfg.peak_insulin_time, end)?;
        Ok((1..=n)
            .map(|step| {
                let t = (step * STEP_MINUTES) as f64;
                bolus * iob(t) + self.insulin_inputs[step]
            })
            .collect())
    }

    /// Full insulin sequence for one candidate: t = 0 followed by the
    /// horizon's action curve.
    pub fn candidate_insulin(&self, bolus: f64) -> Result<Vec<f64>> {
        let now = *self
            .insulin_inputs
            .first()
            .ok_or(AgsError::insufficient(HORIZON_STEPS + 1, 0))?;
        let mut seq = Vec::with_capacity(HORIZON_STEPS + 1);
        seq.push(now + bolus);
        seq.extend(self.insulin_action_curve(HORIZON_STEPS, bolus)?);
        Ok(seq)
    }

    /// Brute-force search over candidate boluses; stores and returns the winner.
    pub fn calculate_control_input(&mut self) -> Result<Recommendation> {
        if self.predictions.is_empty() {
            return Err(AgsError::insufficient(1, 0).into());
        }
        let boluses = candidate_boluses(self.cfg.max_bolus);
        let mut trajectories = Vec::with_capacity(boluses.len());
        for &bolus in &boluses {
            let insulin = self.candidate_insulin(bolus)?;
            let projected = self.model.project_correction(
                &self.predictions,
                &insulin,
                self.cfg.sensitivity,
            )?;
            trajectories.push(projected);
        }
        self.optimize_control(&trajectories, &boluses)?;
        self.recommendation
            .clone()
            .ok_or_else(|| eyre::Report::new(AgsError::insufficient(1, 0)))
    }

    /// Pick the trajectory with the lowest mean absolute error against the
    /// target. The first candidate seeds the best; later ones must be strictly
    /// better, so ties keep the earlier (larger) bolus.
    pub fn optimize_control(
        &mut self,
        trajectories: &[Vec<f64>],
        boluses: &[f64],
    ) -> Result<f64> {
        if trajectories.is_empty() {
            return Err(AgsError::insufficient(1, 0).into());
        }
        if trajectories.len() != boluses.len() {
            return Err(AgsError::Config(format!(
                "{} trajectories for {} candidate boluses",
                trajectories.len(),
                boluses.len()
            ))
            .into());
        }
        let target = f64::from(self.cfg.target);
        let mut best: Option<(usize, f64)> = None;
        for (i, (traj, bolus)) in trajectories.iter().zip(boluses).enumerate() {
            let err = mean_abs_error(traj, target).ok_or_else(|| {
                AgsError::Predictor(format!("empty trajectory for bolus {bolus}"))
            })?;
            tracing::trace!(bolus, mae = err, "candidate scored");
            if best.is_none_or(|(_, b)| err < b) {
                best = Some((i, err));
            }
        }
        let (idx, mae) = best.ok_or(AgsError::insufficient(1, 0))?;
        let bolus = boluses[idx];
        self.control_output = trajectories[idx].clone();
        self.recommendation = Some(Recommendation {
            bolus,
            trajectory: self.control_output.clone(),
            mean_abs_error: mae,
            model: self.label.clone(),
        });
        tracing::info!(model = %self.label, bolus, mae, "recommendation");
        Ok(bolus)
    }
}

/// Fraction of a bolus still on board `t` minutes after dosing, for an
/// activity window of `end` minutes peaking at `peak`.
fn iob_fraction_fn(peak: f64, end: f64) -> Result<impl Fn(f64) -> f64> {
    let denom = 1.0 - 2.0 * peak / end;
    let tau = peak * (1.0 - peak / end) / denom;
    let a = 2.0 * tau / end;
    let s = 1.0 / (1.0 - a + (1.0 + a) * (-end / tau).exp());
    if denom == 0.0 || tau == 0.0 || !tau.is_finite() || !s.is_finite() {
        return Err(AgsError::Config(format!(
            "insulin action curve undefined for peak {peak} min over {end} min"
        ))
        .into());
    }
    Ok(move |t: f64| {
        let shape = (t * t / (tau * end * (1.0 - a)) - t / tau - 1.0) * (-t / tau).exp();
        1.0 - s * (1.0 - a) * (shape + 1.0)
    })
}
