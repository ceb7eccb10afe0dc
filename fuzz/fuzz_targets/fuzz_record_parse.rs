#![no_main]
use ags_core::RawRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(rec) = RawRecord::parse(data) {
        // Accepted records always carry finite values.
        assert!(rec.sample_time.is_finite());
        assert!(rec.insulin_on_board.is_finite());
        assert!(rec.forecast.iter().all(|v| v.is_finite()));
        let _ = rec.bg_reading();
        let _ = rec.insulin_reading();
    }
});
