//! Interchangeable BG prediction models.
//!
//! A model answers two questions: where is BG heading with no further action
//! (`predict`), and where would it head under a hypothetical insulin sequence
//! (`project_correction`). The optimizer only ever talks to this trait.

mod state_space;
mod statistical;

pub use state_space::StateSpaceModel;
pub use statistical::{StatisticalModel, format_exchange_line, parse_trajectory};

use crate::error::Result;

pub trait PredictionModel {
    /// Baseline trajectory from recent BG values (oldest first) and the
    /// insulin forecast.
    fn predict(&mut self, bg: &[i32], insulin: &[f64]) -> Result<Vec<f64>>;

    /// Trajectory under a candidate insulin sequence, starting from `baseline`.
    fn project_correction(
        &mut self,
        baseline: &[f64],
        insulin: &[f64],
        sensitivity: i32,
    ) -> Result<Vec<f64>>;
}

impl<T: PredictionModel + ?Sized> PredictionModel for Box<T> {
    fn predict(&mut self, bg: &[i32], insulin: &[f64]) -> Result<Vec<f64>> {
        (**self).predict(bg, insulin)
    }

    fn project_correction(
        &mut self,
        baseline: &[f64],
        insulin: &[f64],
        sensitivity: i32,
    ) -> Result<Vec<f64>> {
        (**self).project_correction(baseline, insulin, sensitivity)
    }
}
