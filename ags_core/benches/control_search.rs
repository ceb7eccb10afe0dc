use ags_core::util::HORIZON_STEPS;
use ags_core::{MpcOptimizer, RingBuffer, StateSpaceModel};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Decaying insulin-on-board forecast, one value per 5 minute step
fn synth_forecast(n: usize, iob: f64) -> Vec<f64> {
    (0..n).map(|i| iob * (1.0 - i as f64 / n as f64)).collect()
}

fn primed_optimizer(max_bolus: f64) -> MpcOptimizer {
    let mut mpc = MpcOptimizer::builder()
        .model(Box::new(StateSpaceModel::new()))
        .max_bolus(max_bolus)
        .try_build()
        .expect("valid optimizer");
    for bg in [160, 166, 171, 175, 178, 180] {
        mpc.add_bg_input(bg);
    }
    for v in synth_forecast(HORIZON_STEPS + 1, 1.5) {
        mpc.add_insulin_input(v);
    }
    mpc.run_prediction_model().expect("baseline");
    mpc
}

pub fn bench_control_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_search");
    for max_bolus in [4.0, 16.0] {
        group.bench_function(format!("state_space_max_{max_bolus}"), |b| {
            b.iter_batched(
                || primed_optimizer(max_bolus),
                |mut mpc| black_box(mpc.calculate_control_input().expect("search")),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

pub fn bench_action_curve(c: &mut Criterion) {
    let mpc = primed_optimizer(16.0);
    c.bench_function("insulin_action_curve_18", |b| {
        b.iter(|| black_box(mpc.insulin_action_curve(HORIZON_STEPS, black_box(2.5))))
    });
}

pub fn bench_history_window(c: &mut Criterion) {
    let mut rb = RingBuffer::new(288).expect("capacity");
    for i in 0..1000 {
        rb.enqueue(i);
    }
    c.bench_function("ring_buffer_last_6", |b| b.iter(|| black_box(rb.last_n(6))));
}

criterion_group!(
    benches,
    bench_control_search,
    bench_action_curve,
    bench_history_window
);
criterion_main!(benches);
