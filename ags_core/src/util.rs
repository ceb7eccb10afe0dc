//! Common time and horizon constants for ags_core.

/// Native sensor cadence: one reading every 5 minutes.
pub const READING_INTERVAL_S: f64 = 300.0;
/// Minutes between consecutive trajectory points.
pub const STEP_MINUTES: usize = 5;
/// Prediction horizon in steps (90 minutes).
pub const HORIZON_STEPS: usize = 18;
/// BG values handed to a model per prediction.
pub const BG_WINDOW: usize = 6;
/// Insulin values handed to a model per prediction (t = 0..=90 min).
pub const INSULIN_WINDOW: usize = HORIZON_STEPS + 1;
/// Step between candidate boluses in the control search (units).
pub const BOLUS_STEP: f64 = 0.5;
/// Largest `max_bolus` accepted anywhere (units).
pub const MAX_BOLUS_LIMIT: f64 = 100.0;

/// Mean absolute error of `trajectory` against `target`. Empty input yields `None`.
#[inline]
pub fn mean_abs_error(trajectory: &[f64], target: f64) -> Option<f64> {
    if trajectory.is_empty() {
        return None;
    }
    let sum: f64 = trajectory.iter().map(|v| (v - target).abs()).sum();
    Some(sum / trajectory.len() as f64)
}

/// Candidate boluses from `max_bolus` down to 0 in `BOLUS_STEP` decrements.
/// Generated as `max_bolus - k * step` so no error accumulates.
pub fn candidate_boluses(max_bolus: f64) -> Vec<f64> {
    if !max_bolus.is_finite() || !(0.0..=MAX_BOLUS_LIMIT).contains(&max_bolus) {
        return Vec::new();
    }
    let steps = (max_bolus / BOLUS_STEP).floor() as usize;
    let mut out: Vec<f64> = (0..=steps)
        .map(|k| max_bolus - k as f64 * BOLUS_STEP)
        .collect();
    // max_bolus not a multiple of the step: still try zero.
    if out.last().is_some_and(|b| *b > 1e-9) {
        out.push(0.0);
    }
    out
}
