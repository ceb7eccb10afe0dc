//! Test and helper mocks for ags_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ags_traits::{BoxError, Clock, ReadingSource};

/// Manually advanced clock: `sleep(d)` moves time forward by `d` without blocking.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Total simulated time elapsed.
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Acquisition source that replays scripted responses, including failures.
/// Returns empty output once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<String, String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, line: impl Into<String>) -> Self {
        self.script.push_back(Ok(line.into()));
        self
    }

    pub fn failure(mut self, msg: impl Into<String>) -> Self {
        self.script.push_back(Err(msg.into()));
        self
    }
}

impl ReadingSource for ScriptedSource {
    fn fetch(&mut self) -> Result<String, BoxError> {
        match self.script.pop_front() {
            Some(Ok(line)) => Ok(line),
            Some(Err(msg)) => Err(msg.into()),
            None => Ok(String::new()),
        }
    }
}

/// Raw acquisition record with the given forecast tail.
pub fn record_line(bg: i32, sample_time: f64, iob: f64, forecast: &[f64]) -> String {
    let mut line = format!("{bg},0,10,{sample_time},{iob}");
    for v in forecast {
        line.push(',');
        line.push_str(&v.to_string());
    }
    line
}
