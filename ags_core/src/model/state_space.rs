use super::PredictionModel;
use crate::error::{AgsError, Result};

/// Recursive state-space model: each step moves BG by the change in insulin
/// on board times the sensitivity.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateSpaceModel;

impl StateSpaceModel {
    pub fn new() -> Self {
        Self
    }
}

impl PredictionModel for StateSpaceModel {
    fn predict(&mut self, bg: &[i32], _insulin: &[f64]) -> Result<Vec<f64>> {
        let latest = bg.last().ok_or(AgsError::insufficient(1, 0))?;
        Ok(vec![f64::from(*latest)])
    }

    fn project_correction(
        &mut self,
        baseline: &[f64],
        insulin: &[f64],
        sensitivity: i32,
    ) -> Result<Vec<f64>> {
        let mut bg = *baseline.last().ok_or(AgsError::insufficient(1, 0))?;
        if insulin.len() < 2 {
            return Err(AgsError::insufficient(2, insulin.len()).into());
        }
        let s = f64::from(sensitivity);
        Ok(insulin
            .windows(2)
            .map(|pair| {
                bg -= s * (pair[0] - pair[1]);
                bg
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_returns_latest_bg() {
        let mut m = StateSpaceModel::new();
        assert_eq!(m.predict(&[100, 110, 125], &[]).unwrap(), vec![125.0]);
    }

    #[test]
    fn projection_subtracts_insulin_deltas() {
        let mut m = StateSpaceModel::new();
        // deltas: 1.0 - 0.5 = 0.5, 0.5 - 0.25 = 0.25
        let out = m.project_correction(&[150.0], &[1.0, 0.5, 0.25], 30).unwrap();
        assert_eq!(out, vec![135.0, 127.5]);
    }

    #[test]
    fn empty_inputs_are_insufficient_history() {
        let mut m = StateSpaceModel::new();
        let err = m.predict(&[], &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgsError>(),
            Some(AgsError::InsufficientHistory { needed: 1, got: 0 })
        ));
        assert!(m.project_correction(&[120.0], &[1.0], 30).is_err());
        assert!(m.project_correction(&[], &[1.0, 0.5], 30).is_err());
    }
}
