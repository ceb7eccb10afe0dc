use std::path::PathBuf;

use ags_traits::{PredictionArchive, Predictor};

use super::PredictionModel;
use crate::atomic::write_atomic;
use crate::collab_error::to_report;
use crate::error::{AgsError, Result};
use crate::util::{BG_WINDOW, HORIZON_STEPS, INSULIN_WINDOW};

/// Model backed by an external statistical predictor.
///
/// Every call writes one exchange line (six BG values, then nineteen insulin
/// values), runs the predictor, and reads back eighteen newline-separated BG
/// values. Baseline predictions send BG most recent first; projections send
/// the baseline trajectory as-is.
pub struct StatisticalModel<P, A> {
    predictor: P,
    archive: A,
    exchange_file: PathBuf,
    archive_predictions: bool,
}

impl<P, A> std::fmt::Debug for StatisticalModel<P, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticalModel")
            .field("exchange_file", &self.exchange_file)
            .field("archive_predictions", &self.archive_predictions)
            .finish_non_exhaustive()
    }
}

impl<P: Predictor, A: PredictionArchive> StatisticalModel<P, A> {
    pub fn new(predictor: P, archive: A, exchange_file: impl Into<PathBuf>) -> Self {
        Self {
            predictor,
            archive,
            exchange_file: exchange_file.into(),
            archive_predictions: false,
        }
    }

    /// Invoke the archive collaborator after each baseline prediction.
    pub fn with_archiving(mut self, on: bool) -> Self {
        self.archive_predictions = on;
        self
    }

    fn exchange(&mut self, line: &str) -> Result<Vec<f64>> {
        write_atomic(&self.exchange_file, line.as_bytes())
            .map_err(|e| AgsError::Io(format!("write {:?}: {e}", self.exchange_file)))?;
        let out = self.predictor.run(&self.exchange_file).map_err(to_report)?;
        parse_trajectory(&out)
    }
}

/// Serialise one exchange line. `bg` must hold `BG_WINDOW` values.
pub fn format_exchange_line(bg: &[f64], insulin: &[f64]) -> String {
    bg
        .iter()
        .chain(insulin)
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse predictor output: the first `HORIZON_STEPS` non-blank lines as floats.
pub fn parse_trajectory(out: &str) -> Result<Vec<f64>> {
    let lines: Vec<&str> = out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < HORIZON_STEPS {
        return Err(AgsError::Predictor(format!(
            "expected {HORIZON_STEPS} values, got {}",
            lines.len()
        ))
        .into());
    }
    if lines.len() > HORIZON_STEPS {
        tracing::warn!(
            extra = lines.len() - HORIZON_STEPS,
            "ignoring extra predictor output lines"
        );
    }
    lines[..HORIZON_STEPS]
        .iter()
        .map(|l| {
            l.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| eyre::Report::new(AgsError::Predictor(format!("not a number: {l:?}"))))
        })
        .collect()
}

fn insulin_window(insulin: &[f64]) -> Result<&[f64]> {
    insulin
        .get(..INSULIN_WINDOW)
        .ok_or_else(|| AgsError::insufficient(INSULIN_WINDOW, insulin.len()).into())
}

impl<P: Predictor, A: PredictionArchive> PredictionModel for StatisticalModel<P, A> {
    fn predict(&mut self, bg: &[i32], insulin: &[f64]) -> Result<Vec<f64>> {
        if bg.len() < BG_WINDOW {
            return Err(AgsError::insufficient(BG_WINDOW, bg.len()).into());
        }
        let recent_first: Vec<f64> = bg
            .iter()
            .rev()
            .take(BG_WINDOW)
            .map(|v| f64::from(*v))
            .collect();
        let line = format_exchange_line(&recent_first, insulin_window(insulin)?);
        let trajectory = self.exchange(&line)?;
        if self.archive_predictions {
            if let Err(e) = self.archive.archive() {
                tracing::error!(error = %e, "prediction archive failed");
                return Err(to_report(e));
            }
            tracing::debug!("prediction archived");
        }
        Ok(trajectory)
    }

    /// The baseline window goes out in trajectory order (nearest point first),
    /// unlike `predict`, which reverses the oldest-first BG inputs.
    fn project_correction(
        &mut self,
        baseline: &[f64],
        insulin: &[f64],
        _sensitivity: i32,
    ) -> Result<Vec<f64>> {
        let window = baseline
            .get(..BG_WINDOW)
            .ok_or(AgsError::insufficient(BG_WINDOW, baseline.len()))?;
        let line = format_exchange_line(window, insulin_window(insulin)?);
        self.exchange(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ags_traits::BoxError;
    use std::path::Path;

    /// Predictor that keeps the last exchange line and returns a flat trajectory.
    #[derive(Default)]
    struct LastLine(String);

    impl Predictor for LastLine {
        fn run(&mut self, exchange_file: &Path) -> std::result::Result<String, BoxError> {
            self.0 = std::fs::read_to_string(exchange_file)?;
            Ok("110\n".repeat(18))
        }
    }

    struct NoArchive;

    impl PredictionArchive for NoArchive {
        fn archive(&mut self) -> std::result::Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn bg_order_differs_between_predict_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = StatisticalModel::new(LastLine::default(), NoArchive, dir.path().join("x.txt"));
        let insulin = [0.0; 19];
        let zeros = vec!["0"; 19].join(",");

        m.predict(&[100, 101, 102, 103, 104, 105], &insulin).unwrap();
        assert_eq!(m.predictor.0, format!("105,104,103,102,101,100,{zeros}"));

        let baseline = [150.0, 148.0, 146.0, 144.0, 142.0, 140.0, 138.0];
        m.project_correction(&baseline, &insulin, 30).unwrap();
        assert_eq!(m.predictor.0, format!("150,148,146,144,142,140,{zeros}"));
    }

    #[test]
    fn exchange_line_lists_bg_then_insulin() {
        let line = format_exchange_line(&[130.0, 125.0], &[1.5, 0.25]);
        assert_eq!(line, "130,125,1.5,0.25");
    }

    #[test]
    fn trajectory_needs_eighteen_numbers() {
        let ok: String = (0..18).map(|i| format!("{}\n", 100 + i)).collect();
        assert_eq!(parse_trajectory(&ok).unwrap().len(), 18);

        let short: String = (0..17).map(|i| format!("{i}\n")).collect();
        let err = parse_trajectory(&short).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgsError>(),
            Some(AgsError::Predictor(_))
        ));

        let bad = ok.replacen("105", "nan?", 1);
        assert!(parse_trajectory(&bad).is_err());
    }
}
