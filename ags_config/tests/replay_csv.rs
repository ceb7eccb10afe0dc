use std::fs::File;
use std::io::Write;

use ags_config::load_replay_csv;
use rstest::rstest;
use tempfile::tempdir;

fn write(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("replay.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn replay_rows_become_raw_records() {
    let (_dir, path) = write(&[
        "# bg,trend,lag,sample_time,iob,future...",
        "120, 5, 10, 1000, 2.5, 1.1, 1.0",
        "118,-2,12,1300,2.1",
    ]);
    let records = load_replay_csv(&path).unwrap();
    assert_eq!(
        records,
        vec!["120,5,10,1000,2.5,1.1,1.0".to_string(), "118,-2,12,1300,2.1".to_string()]
    );
}

#[rstest]
fn replay_rejects_short_rows() {
    let (_dir, path) = write(&["120,5,10"]);
    let err = load_replay_csv(&path).expect_err("short row must fail");
    assert!(format!("{err}").contains("expected at least 5"));
}

#[rstest]
fn replay_rejects_empty_file() {
    let (_dir, path) = write(&["# only a comment"]);
    let err = load_replay_csv(&path).expect_err("empty replay must fail");
    assert!(format!("{err}").contains("contains no rows"));
}

#[rstest]
fn replay_reports_missing_file() {
    let dir = tempdir().unwrap();
    let err = load_replay_csv(&dir.path().join("nope.csv")).unwrap_err();
    assert!(format!("{err}").contains("open replay CSV"));
}
