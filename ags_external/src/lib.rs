//! Concrete collaborators for the control loop.
//!
//! Command-backed implementations run the external acquisition, history,
//! predictor and archive programs with a bounded wait. Simulated
//! implementations stand in for them in replay mode and tests.
pub mod error;
pub mod util;

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use ags_traits::{BoxError, HistorySource, PredictionArchive, Predictor, ReadingSource};

use crate::error::CollabError;
pub use crate::util::CommandSpec;
use crate::util::run_checked;

/// Number of trajectory points the predictor emits (90 min at 5 min steps).
pub const PREDICTOR_POINTS: usize = 18;

/// Acquisition collaborator: prints one comma-separated record, or nothing.
#[derive(Debug, Clone)]
pub struct CommandReadingSource {
    spec: CommandSpec,
    timeout: Duration,
}

impl CommandReadingSource {
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        Self { spec, timeout }
    }
}

impl ReadingSource for CommandReadingSource {
    fn fetch(&mut self) -> Result<String, BoxError> {
        let out = run_checked(&self.spec, self.timeout)?;
        tracing::debug!(bytes = out.len(), "acquisition output");
        Ok(out)
    }
}

/// History-query collaborator: prints newline-separated BG integers, oldest first.
#[derive(Debug, Clone)]
pub struct CommandHistorySource {
    spec: CommandSpec,
    timeout: Duration,
}

impl CommandHistorySource {
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        Self { spec, timeout }
    }
}

/// Parse newline-separated integers and keep the `n` most recent (last) ones.
pub fn parse_bg_lines(program: &str, text: &str, n: usize) -> Result<Vec<i32>, CollabError> {
    let mut values = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let v = line.parse::<i32>().map_err(|e| CollabError::Output {
            program: program.to_string(),
            detail: format!("not an integer BG value {line:?}: {e}"),
        })?;
        values.push(v);
    }
    if values.len() < n {
        return Err(CollabError::Output {
            program: program.to_string(),
            detail: format!("expected {n} BG values, got {}", values.len()),
        });
    }
    Ok(values.split_off(values.len() - n))
}

impl HistorySource for CommandHistorySource {
    fn recent_bg(&mut self, n: usize) -> Result<Vec<i32>, BoxError> {
        let out = run_checked(&self.spec, self.timeout)?;
        Ok(parse_bg_lines(&self.spec.program, &out, n)?)
    }
}

/// Statistical predictor collaborator. The exchange file path is passed as the
/// last argument; stdout carries the trajectory.
#[derive(Debug, Clone)]
pub struct CommandPredictor {
    spec: CommandSpec,
    timeout: Duration,
}

impl CommandPredictor {
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        Self { spec, timeout }
    }
}

impl Predictor for CommandPredictor {
    fn run(&mut self, exchange_file: &Path) -> Result<String, BoxError> {
        let spec = self
            .spec
            .clone()
            .with_arg(exchange_file.to_string_lossy().into_owned());
        Ok(run_checked(&spec, self.timeout)?)
    }
}

/// Persistence collaborator; only the exit status matters.
#[derive(Debug, Clone)]
pub struct CommandArchive {
    spec: CommandSpec,
    timeout: Duration,
}

impl CommandArchive {
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        Self { spec, timeout }
    }
}

impl PredictionArchive for CommandArchive {
    fn archive(&mut self) -> Result<(), BoxError> {
        run_checked(&self.spec, self.timeout)?;
        Ok(())
    }
}

/// Archive that does nothing; used when archiving is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArchive;

impl PredictionArchive for NullArchive {
    fn archive(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Replays pre-recorded raw records, one per fetch. Empty once exhausted.
#[derive(Debug, Default, Clone)]
pub struct ReplaySource {
    records: VecDeque<String>,
}

impl ReplaySource {
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: records.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl ReadingSource for ReplaySource {
    fn fetch(&mut self) -> Result<String, BoxError> {
        Ok(self.records.pop_front().unwrap_or_default())
    }
}

/// In-memory BG store standing in for the history database.
#[derive(Debug, Default, Clone)]
pub struct SimulatedHistory {
    values: Vec<i32>,
}

impl SimulatedHistory {
    pub fn new(values: Vec<i32>) -> Self {
        Self { values }
    }
}

impl HistorySource for SimulatedHistory {
    fn recent_bg(&mut self, n: usize) -> Result<Vec<i32>, BoxError> {
        if self.values.len() < n {
            return Err(Box::new(CollabError::Output {
                program: "simulated-history".into(),
                detail: format!("expected {n} BG values, got {}", self.values.len()),
            }));
        }
        Ok(self.values[self.values.len() - n..].to_vec())
    }
}

/// Stand-in for the statistical predictor: extrapolates the latest BG trend,
/// damped by half per step, and subtracts insulin absorbed between steps.
///
/// Reads the same exchange line the real predictor consumes:
/// six BG values (most recent first) then nineteen insulin values.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedPredictor {
    pub sensitivity: f64,
}

impl Default for SimulatedPredictor {
    fn default() -> Self {
        Self { sensitivity: 30.0 }
    }
}

impl Predictor for SimulatedPredictor {
    fn run(&mut self, exchange_file: &Path) -> Result<String, BoxError> {
        let line = std::fs::read_to_string(exchange_file)?;
        let fields = line
            .trim()
            .split(',')
            .map(|f| f.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        if fields.len() < 6 + PREDICTOR_POINTS + 1 {
            return Err(Box::new(CollabError::Output {
                program: "simulated-predictor".into(),
                detail: format!("exchange line has {} fields", fields.len()),
            }));
        }
        let (bg, insulin) = fields.split_at(6);
        let mut slope = bg[0] - bg[1];
        let mut level = bg[0];
        let mut out = String::new();
        for step in 0..PREDICTOR_POINTS {
            slope *= 0.5;
            level += slope - self.sensitivity * (insulin[step] - insulin[step + 1]);
            out.push_str(&format!("{level:.3}\n"));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_source_drains_then_reports_empty() {
        let mut src = ReplaySource::new(["120,0,10,1000,0.0", "118,-2,10,1300,0.0"]);
        assert_eq!(src.fetch().unwrap(), "120,0,10,1000,0.0");
        assert_eq!(src.remaining(), 1);
        assert_eq!(src.fetch().unwrap(), "118,-2,10,1300,0.0");
        assert_eq!(src.fetch().unwrap(), "");
    }

    #[test]
    fn parse_bg_lines_keeps_most_recent() {
        let v = parse_bg_lines("q", "100\n110\n120\n130\n140\n150\n160\n", 6).unwrap();
        assert_eq!(v, vec![110, 120, 130, 140, 150, 160]);
    }

    #[test]
    fn parse_bg_lines_rejects_short_output() {
        let err = parse_bg_lines("q", "100\n110\n", 6).unwrap_err();
        assert!(matches!(err, CollabError::Output { .. }));
    }

    #[test]
    fn simulated_history_requires_enough_values() {
        let mut h = SimulatedHistory::new(vec![1, 2, 3]);
        assert_eq!(h.recent_bg(2).unwrap(), vec![2, 3]);
        assert!(h.recent_bg(4).is_err());
    }
}
