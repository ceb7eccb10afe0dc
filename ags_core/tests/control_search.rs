use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ags_core::util::HORIZON_STEPS;
use ags_core::{AgsError, MpcOptimizer, PredictionModel, StateSpaceModel, StatisticalModel};
use ags_external::{NullArchive, SimulatedPredictor};
use ags_traits::{BoxError, PredictionArchive, Predictor};
use rstest::rstest;

fn state_space(max_bolus: f64) -> MpcOptimizer {
    MpcOptimizer::builder()
        .model(Box::new(StateSpaceModel::new()))
        .label("state_space")
        .max_bolus(max_bolus)
        .try_build()
        .unwrap()
}

fn feed(mpc: &mut MpcOptimizer, bg: &[i32], insulin: &[f64]) {
    for v in bg {
        mpc.add_bg_input(*v);
    }
    for v in insulin {
        mpc.add_insulin_input(*v);
    }
}

#[rstest]
#[case::high(180, 3.0)]
#[case::mildly_high(150, 1.5)]
#[case::below_target(90, 0.0)]
#[case::at_target(110, 0.0)]
fn state_space_search_picks_expected_bolus(#[case] bg: i32, #[case] expected: f64) {
    let mut mpc = state_space(16.0);
    feed(&mut mpc, &[bg; 6], &[0.0; HORIZON_STEPS + 1]);
    assert_eq!(mpc.run_prediction_model().unwrap(), &[f64::from(bg)]);

    let rec = mpc.calculate_control_input().unwrap();
    assert_eq!(rec.bolus, expected);
    assert_eq!(rec.trajectory.len(), HORIZON_STEPS);
    assert_eq!(rec.model, "state_space");
    assert_eq!(mpc.control_output(), rec.trajectory.as_slice());
}

#[test]
fn search_without_baseline_is_insufficient_history() {
    let mut mpc = state_space(2.0);
    feed(&mut mpc, &[120; 6], &[0.0; HORIZON_STEPS + 1]);
    let err = mpc.calculate_control_input().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AgsError>(),
        Some(AgsError::InsufficientHistory { .. })
    ));
}

#[test]
fn short_insulin_forecast_fails_the_search() {
    let mut mpc = state_space(2.0);
    feed(&mut mpc, &[150; 6], &[0.0; 5]);
    mpc.run_prediction_model().unwrap();
    let err = mpc.calculate_control_input().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AgsError>(),
        Some(AgsError::InsufficientHistory { needed: 19, got: 5 })
    ));
}

#[test]
fn candidate_insulin_starts_with_whole_bolus_on_board() {
    let mut mpc = state_space(2.0);
    feed(&mut mpc, &[150; 6], &[0.25; HORIZON_STEPS + 1]);
    let seq = mpc.candidate_insulin(2.0).unwrap();
    assert_eq!(seq.len(), HORIZON_STEPS + 1);
    assert_eq!(seq[0], 2.25);
    assert!(seq[1] < seq[0]);
}

/// Predictor that records every exchange line and answers with a flat trajectory.
#[derive(Clone, Default)]
struct RecordingPredictor {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Predictor for RecordingPredictor {
    fn run(&mut self, exchange_file: &Path) -> Result<String, BoxError> {
        self.lines
            .borrow_mut()
            .push(std::fs::read_to_string(exchange_file)?);
        Ok("120\n".repeat(HORIZON_STEPS))
    }
}

#[derive(Clone, Default)]
struct CountingArchive(Rc<RefCell<u32>>);

impl PredictionArchive for CountingArchive {
    fn archive(&mut self) -> Result<(), BoxError> {
        *self.0.borrow_mut() += 1;
        Ok(())
    }
}

#[test]
fn statistical_model_exchange_layout_and_tie_break() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = RecordingPredictor::default();
    let archive = CountingArchive::default();
    let model = StatisticalModel::new(
        predictor.clone(),
        archive.clone(),
        dir.path().join("predictor").join("exchange.txt"),
    )
    .with_archiving(true);

    let mut mpc = MpcOptimizer::builder()
        .model(Box::new(model))
        .label("statistical")
        .max_bolus(1.0)
        .try_build()
        .unwrap();
    feed(&mut mpc, &[100, 101, 102, 103, 104, 105], &[0.0; HORIZON_STEPS + 1]);

    mpc.run_prediction_model().unwrap();
    assert_eq!(mpc.predictions().len(), HORIZON_STEPS);
    let rec = mpc.calculate_control_input().unwrap();

    // Every candidate projects the same flat trajectory: the first (largest) wins.
    assert_eq!(rec.bolus, 1.0);
    assert_eq!(rec.mean_abs_error, 10.0);

    let lines = predictor.lines.borrow();
    assert_eq!(lines.len(), 1 + 3);
    assert!(lines[0].starts_with("105,104,103,102,101,100,0,"));
    assert_eq!(lines[0].split(',').count(), 6 + HORIZON_STEPS + 1);
    assert!(lines[1].starts_with("120,120,120,120,120,120,1,"));
    assert_eq!(*archive.0.borrow(), 1);
}

#[test]
fn statistical_model_needs_six_bg_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = StatisticalModel::new(
        SimulatedPredictor::default(),
        NullArchive,
        dir.path().join("exchange.txt"),
    );
    let err = model.predict(&[120, 121], &[0.0; 19]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AgsError>(),
        Some(AgsError::InsufficientHistory { needed: 6, got: 2 })
    ));
}

#[test]
fn simulated_predictor_drives_a_full_search() {
    let dir = tempfile::tempdir().unwrap();
    let model = StatisticalModel::new(
        SimulatedPredictor::default(),
        NullArchive,
        dir.path().join("exchange.txt"),
    );
    let mut mpc = MpcOptimizer::builder()
        .model(Box::new(model))
        .try_build()
        .unwrap();
    feed(&mut mpc, &[170, 175, 180, 185, 190, 195], &[0.0; HORIZON_STEPS + 1]);
    mpc.run_prediction_model().unwrap();
    let rec = mpc.calculate_control_input().unwrap();
    assert!(rec.bolus > 0.0, "rising BG well above target needs insulin");
    assert_eq!(rec.trajectory.len(), HORIZON_STEPS);
}
