use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ags_core::runner::SHUTDOWN_POLL;
use ags_traits::Clock;

use ags_core::mocks::{ManualClock, ScriptedSource, record_line};
use ags_core::util::HORIZON_STEPS;
use ags_core::{
    AgsError, ControlLoop, ControllerCfg, CycleOutcome, IngestionService, LoopSummary,
    PredictionModel, ScheduleCfg, StateSpaceModel,
};
use ags_external::SimulatedHistory;

fn control_loop(source: ScriptedSource) -> ControlLoop<ScriptedSource, SimulatedHistory> {
    let ingest =
        IngestionService::new(source, SimulatedHistory::new(vec![180; 6]), 288).unwrap();
    ControlLoop::new(
        ingest,
        ControllerCfg::default(),
        "state_space",
        Box::new(|| -> Box<dyn PredictionModel> { Box::new(StateSpaceModel::new()) }),
    )
}

fn flat_forecast() -> Vec<f64> {
    vec![0.0; HORIZON_STEPS]
}

#[test]
fn every_outcome_kind_is_reported_and_the_loop_keeps_going() {
    let good = record_line(180, 1000.0, 0.0, &flat_forecast());
    let source = ScriptedSource::new()
        .record(good.clone())
        .record(good)
        .failure("scraper timed out")
        .record("not,a,record")
        .record("");
    let mut lp = control_loop(source);
    let clock = ManualClock::new();
    let shutdown = AtomicBool::new(false);
    let schedule = ScheduleCfg {
        wake_interval: Duration::from_secs(240),
        max_cycles: Some(5),
    };

    let mut kinds = Vec::new();
    let summary = lp.run_loop(&clock, schedule, &shutdown, |n, outcome| {
        kinds.push((n, outcome.clone()));
    });

    assert_eq!(
        summary,
        LoopSummary {
            cycles: 5,
            recommended: 1,
            no_new_data: 2,
            failed: 2,
        }
    );
    assert_eq!(kinds[0].1.recommendation().map(|r| r.bolus), Some(3.0));
    assert_eq!(kinds[1].1, CycleOutcome::NoNewData);
    assert_eq!(kinds[2].1, CycleOutcome::Failed(AgsError::Timeout));
    assert!(matches!(
        kinds[3].1,
        CycleOutcome::Failed(AgsError::MalformedRecord(_))
    ));
    assert_eq!(kinds[4].1, CycleOutcome::NoNewData);
    // Four sleeps between five cycles.
    assert_eq!(clock.elapsed(), Duration::from_secs(4 * 240));
}

#[test]
fn baseline_predictions_are_kept_in_history() {
    let mut lp = control_loop(
        ScriptedSource::new().record(record_line(180, 600.0, 0.0, &flat_forecast())),
    );
    let outcome = lp.run_cycle();
    assert_eq!(outcome.kind(), "recommended");
    let preds: Vec<f64> = lp.ingest().history().predictions().iter().copied().collect();
    assert_eq!(preds, vec![180.0]);
}

#[test]
fn missing_forecast_fails_the_cycle_not_the_loop() {
    let mut lp = control_loop(ScriptedSource::new().record("150,0,10,600,0.0"));
    match lp.run_cycle() {
        CycleOutcome::Failed(AgsError::InsufficientHistory { needed, got }) => {
            assert_eq!((needed, got), (19, 1));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn shutdown_before_start_runs_nothing() {
    let mut lp = control_loop(ScriptedSource::new());
    let clock = ManualClock::new();
    let shutdown = AtomicBool::new(true);
    let summary = lp.run_loop(&clock, ScheduleCfg::default(), &shutdown, |_, _| {});
    assert_eq!(summary, LoopSummary::default());
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

/// Clock that raises the shutdown flag the first time the loop sleeps.
struct StopOnSleep<'a> {
    inner: ManualClock,
    shutdown: &'a AtomicBool,
}

impl Clock for StopOnSleep<'_> {
    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn sleep(&self, d: Duration) {
        self.inner.sleep(d);
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[test]
fn shutdown_interrupts_the_wait_between_cycles() {
    let mut lp = control_loop(ScriptedSource::new());
    let shutdown = AtomicBool::new(false);
    let clock = StopOnSleep {
        inner: ManualClock::new(),
        shutdown: &shutdown,
    };
    let summary = lp.run_loop(&clock, ScheduleCfg::default(), &shutdown, |_, _| {});
    assert_eq!(summary.cycles, 1);
    // One slice of the 240 s wait, not the whole interval.
    assert_eq!(clock.inner.elapsed(), SHUTDOWN_POLL);
}

#[test]
fn sleep_until_reaches_the_deadline_and_ignores_past_ones() {
    let clock = ManualClock::new();
    let start = clock.now();
    clock.sleep_until(start + Duration::from_secs(240));
    assert_eq!(clock.secs_since(start), 240);
    clock.sleep_until(start + Duration::from_secs(60));
    assert_eq!(clock.secs_since(start), 240);
}
