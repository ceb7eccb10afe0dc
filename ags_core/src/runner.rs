//! Scheduled control loop: one ingestion + optimisation cycle per wake-up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ags_traits::{Clock, HistorySource, ReadingSource};

use crate::config::{ControllerCfg, ScheduleCfg};
use crate::controller::{MpcOptimizer, Recommendation};
use crate::error::{AgsError, BuildError, Result};
use crate::ingest::IngestionService;
use crate::model::PredictionModel;
use crate::reading::InsulinReading;
use crate::status::CycleOutcome;
use crate::util::BG_WINDOW;

/// Longest single sleep between shutdown checks.
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// Builds a fresh model for every cycle.
pub type ModelFactory = Box<dyn FnMut() -> Box<dyn PredictionModel>>;

/// Per-outcome counters for a loop run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub recommended: u64,
    pub no_new_data: u64,
    pub failed: u64,
}

impl LoopSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::NoNewData => self.no_new_data += 1,
            CycleOutcome::Recommended(_) => self.recommended += 1,
            CycleOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Reduce any cycle error to the typed taxonomy.
pub fn classify(e: &eyre::Report) -> AgsError {
    if let Some(a) = e.downcast_ref::<AgsError>() {
        return a.clone();
    }
    if let Some(b) = e.downcast_ref::<BuildError>() {
        return AgsError::Config(b.to_string());
    }
    AgsError::External(format!("{e:#}"))
}

pub struct ControlLoop<R, H> {
    ingest: IngestionService<R, H>,
    controller: ControllerCfg,
    label: String,
    make_model: ModelFactory,
}

impl<R: ReadingSource, H: HistorySource> ControlLoop<R, H> {
    pub fn new(
        ingest: IngestionService<R, H>,
        controller: ControllerCfg,
        label: impl Into<String>,
        make_model: ModelFactory,
    ) -> Self {
        Self {
            ingest,
            controller,
            label: label.into(),
            make_model,
        }
    }

    pub fn ingest(&self) -> &IngestionService<R, H> {
        &self.ingest
    }

    /// Run one cycle. Errors never escape; `NoNewData` becomes its own
    /// outcome and everything else becomes `CycleOutcome::Failed`.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        match self.try_cycle() {
            Ok(rec) => CycleOutcome::Recommended(rec),
            Err(e) => match classify(&e) {
                AgsError::NoNewData => {
                    tracing::debug!("no new data this cycle");
                    CycleOutcome::NoNewData
                }
                kind => {
                    tracing::error!(error = %e, "cycle failed");
                    CycleOutcome::Failed(kind)
                }
            },
        }
    }

    fn try_cycle(&mut self) -> Result<Recommendation> {
        if !self.ingest.poll()?.is_new() {
            return Err(AgsError::NoNewData.into());
        }
        let bg = self.ingest.recent_bg(BG_WINDOW)?;

        let mut mpc = MpcOptimizer::builder()
            .with_config(self.controller)
            .model((self.make_model)())
            .label(self.label.clone())
            .try_build()?;
        for v in bg {
            mpc.add_bg_input(v);
        }
        // Insulin inputs start at t = 0 with the current IOB, then the forecast.
        let history = self.ingest.history();
        let iob = history
            .insulin()
            .last()
            .map(InsulinReading::insulin_on_board)
            .map_err(|_| AgsError::EmptyBuffer)?;
        mpc.add_insulin_input(iob);
        for v in history.forecast() {
            mpc.add_insulin_input(*v);
        }

        let baseline = mpc.run_prediction_model()?.to_vec();
        self.ingest.history_mut().record_predictions(&baseline);
        mpc.calculate_control_input()
    }

    /// Run cycles on a fixed cadence until `shutdown` is set or
    /// `schedule.max_cycles` is reached. `on_cycle` sees every outcome.
    pub fn run_loop<C: Clock + ?Sized>(
        &mut self,
        clock: &C,
        schedule: ScheduleCfg,
        shutdown: &AtomicBool,
        mut on_cycle: impl FnMut(u64, &CycleOutcome),
    ) -> LoopSummary {
        let mut summary = LoopSummary::default();
        let loop_start = clock.now();
        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(cycles = summary.cycles, "shutdown requested");
                break;
            }
            let started = clock.now();
            let outcome = self.run_cycle();
            summary.record(&outcome);
            on_cycle(summary.cycles, &outcome);
            if schedule.max_cycles.is_some_and(|m| summary.cycles >= m) {
                break;
            }
            let wake = started + schedule.wake_interval;
            tracing::debug!(
                sleep_s = wake.saturating_duration_since(clock.now()).as_secs(),
                "sleeping until next cycle"
            );
            sleep_until_or_shutdown(clock, wake, shutdown);
        }
        tracing::info!(
            cycles = summary.cycles,
            recommended = summary.recommended,
            no_new_data = summary.no_new_data,
            failed = summary.failed,
            elapsed_s = clock.secs_since(loop_start),
            "control loop stopped"
        );
        summary
    }
}

/// Sleep toward `deadline` in `SHUTDOWN_POLL` slices, returning early on shutdown.
fn sleep_until_or_shutdown<C: Clock + ?Sized>(clock: &C, deadline: Instant, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) && clock.now() < deadline {
        clock.sleep_until(deadline.min(clock.now() + SHUTDOWN_POLL));
    }
}
