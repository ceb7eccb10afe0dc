//! Wiring from the typed config to a running control loop, plus output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ags_core::util::BG_WINDOW;
use ags_core::{
    ControlLoop, ControllerCfg, CycleOutcome, IngestionService, LoopSummary, ModelCfg,
    ModelChoice, ModelFactory, PredictionModel, RawRecord, ScheduleCfg, StateSpaceModel,
    StatisticalModel,
};
use ags_external::{
    CommandArchive, CommandHistorySource, CommandPredictor, CommandReadingSource, CommandSpec,
    NullArchive, ReplaySource, SimulatedHistory, SimulatedPredictor,
};
use ags_traits::{HistorySource, MonotonicClock, PredictionArchive, ReadingSource};
use eyre::WrapErr;

/// How the `run` subcommand bounds the loop.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub once: bool,
    pub max_cycles: Option<u64>,
}

fn spec_for(name: &str, line: Option<&str>) -> eyre::Result<CommandSpec> {
    let line = line.ok_or_else(|| {
        eyre::Report::new(ags_core::AgsError::Config(format!(
            "collaborators.{name} is not configured"
        )))
    })?;
    CommandSpec::parse(line).wrap_err_with(|| format!("collaborators.{name} is invalid"))
}

fn optional_spec(name: &str, line: Option<&str>) -> eyre::Result<Option<CommandSpec>> {
    line.map(|l| spec_for(name, Some(l))).transpose()
}

fn timeout_of(cfg: &ags_config::Config) -> Duration {
    Duration::from_millis(cfg.collaborators.timeout_ms)
}

/// Model factory for the live loop: command-backed predictor and archive.
fn command_model_factory(cfg: &ags_config::Config) -> eyre::Result<ModelFactory> {
    let model = ModelCfg::from(cfg);
    if model.choice == ModelChoice::StateSpace {
        return Ok(Box::new(|| -> Box<dyn PredictionModel> {
            Box::new(StateSpaceModel::new())
        }));
    }
    let timeout = timeout_of(cfg);
    let predictor = CommandPredictor::new(
        spec_for("predictor", cfg.collaborators.predictor.as_deref())?,
        timeout,
    );
    let archive = optional_spec("archive", cfg.collaborators.archive.as_deref())?;
    if model.archive_predictions && archive.is_none() {
        tracing::warn!("model.archive_predictions is set but collaborators.archive is not");
    }
    Ok(Box::new(move || -> Box<dyn PredictionModel> {
        let archive: Box<dyn PredictionArchive> = match &archive {
            Some(spec) => Box::new(CommandArchive::new(spec.clone(), timeout)),
            None => Box::new(NullArchive),
        };
        Box::new(
            StatisticalModel::new(predictor.clone(), archive, model.exchange_file.clone())
                .with_archiving(model.archive_predictions),
        )
    }))
}

/// Model factory for replay: the statistical predictor is simulated in-process.
fn replay_model_factory(cfg: &ags_config::Config) -> ModelFactory {
    let model = ModelCfg::from(cfg);
    let sensitivity = f64::from(cfg.controller.sensitivity);
    match model.choice {
        ModelChoice::StateSpace => Box::new(|| -> Box<dyn PredictionModel> {
            Box::new(StateSpaceModel::new())
        }),
        ModelChoice::Statistical => Box::new(move || -> Box<dyn PredictionModel> {
            Box::new(StatisticalModel::new(
                SimulatedPredictor { sensitivity },
                NullArchive,
                model.exchange_file.clone(),
            ))
        }),
    }
}

/// Install a Ctrl-C handler that flips the returned flag.
fn shutdown_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let f = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        f.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; continuing without it");
    }
    flag
}

fn drive<R: ReadingSource, H: HistorySource>(
    mut control: ControlLoop<R, H>,
    schedule: ScheduleCfg,
    json: bool,
) -> LoopSummary {
    let shutdown = shutdown_flag();
    let summary = control.run_loop(&MonotonicClock::new(), schedule, &shutdown, |n, outcome| {
        println!("{}", render_outcome(n, outcome, json));
    });
    println!("{}", render_summary(&summary, json));
    summary
}

/// `ags run`: live loop against the configured collaborators.
pub fn run_live(cfg: &ags_config::Config, limits: RunLimits, json: bool) -> eyre::Result<LoopSummary> {
    let timeout = timeout_of(cfg);
    let source = CommandReadingSource::new(
        spec_for("acquisition", cfg.collaborators.acquisition.as_deref())?,
        timeout,
    );
    let history = CommandHistorySource::new(
        spec_for("history_query", cfg.collaborators.history_query.as_deref())?,
        timeout,
    );
    let ingest = IngestionService::new(source, history, cfg.history.capacity)?;
    let model = ModelCfg::from(cfg);
    let control = ControlLoop::new(
        ingest,
        ControllerCfg::from(&cfg.controller),
        model.choice.as_str(),
        command_model_factory(cfg)?,
    );

    let mut schedule = ScheduleCfg::from(&cfg.schedule);
    schedule.max_cycles = if limits.once {
        Some(1)
    } else {
        limits.max_cycles
    };
    tracing::info!(
        model = model.choice.as_str(),
        wake_interval_s = schedule.wake_interval.as_secs(),
        max_cycles = ?schedule.max_cycles,
        "control loop start"
    );
    Ok(drive(control, schedule, json))
}

/// `ags replay`: feed recorded rows through the loop back-to-back.
///
/// The history database is simulated by seeding six copies of the first
/// row's BG, so the first cycle already has a full BG window.
pub fn run_replay(cfg: &ags_config::Config, csv: &Path, json: bool) -> eyre::Result<LoopSummary> {
    let rows = ags_config::load_replay_csv(csv)?;
    let first = rows
        .first()
        .ok_or_else(|| eyre::eyre!("replay CSV {:?} contains no rows", csv))?;
    let seed = RawRecord::parse(first).wrap_err("replay row 1")?.bg;
    let cycles = rows.len() as u64;

    let ingest = IngestionService::new(
        ReplaySource::new(rows),
        SimulatedHistory::new(vec![seed; BG_WINDOW]),
        cfg.history.capacity,
    )?;
    let model = ModelCfg::from(cfg);
    let control = ControlLoop::new(
        ingest,
        ControllerCfg::from(&cfg.controller),
        model.choice.as_str(),
        replay_model_factory(cfg),
    );
    let schedule = ScheduleCfg {
        wake_interval: Duration::ZERO,
        max_cycles: Some(cycles),
    };
    tracing::info!(rows = cycles, model = model.choice.as_str(), "replay start");
    Ok(drive(control, schedule, json))
}

/// Resolve a program name the way the OS would when spawning it.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let p = Path::new(program);
    if p.components().count() > 1 || p.is_absolute() {
        return p.is_file().then(|| p.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// `ags self-check`: print the effective settings and verify every configured
/// collaborator program can be found.
pub fn self_check(cfg: &ags_config::Config, json: bool) -> eyre::Result<()> {
    let model = ModelCfg::from(cfg);
    let controller = ControllerCfg::from(&cfg.controller);
    let collab = &cfg.collaborators;
    let entries = [
        ("acquisition", collab.acquisition.as_deref()),
        ("history_query", collab.history_query.as_deref()),
        ("predictor", collab.predictor.as_deref()),
        ("archive", collab.archive.as_deref()),
    ];

    let mut missing = Vec::new();
    let mut checks = Vec::new();
    for (name, line) in entries {
        let Some(spec) = optional_spec(name, line)? else {
            checks.push((name, "not configured".to_string()));
            continue;
        };
        match resolve_program(&spec.program) {
            Some(path) => checks.push((name, format!("ok ({})", path.display()))),
            None => {
                checks.push((name, format!("missing program {:?}", spec.program)));
                missing.push(name);
            }
        }
    }

    if json {
        let collaborators: serde_json::Map<String, serde_json::Value> = checks
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(v.as_str())))
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "model": model.choice.as_str(),
                "sensitivity": controller.sensitivity,
                "target": controller.target,
                "max_bolus": controller.max_bolus,
                "history_capacity": cfg.history.capacity,
                "collaborators": collaborators,
            })
        );
    } else {
        println!("model: {}", model.choice.as_str());
        println!(
            "controller: sensitivity={} target={} max_bolus={} peak={} activity={}",
            controller.sensitivity,
            controller.target,
            controller.max_bolus,
            controller.peak_insulin_time,
            controller.activity_duration_minutes
        );
        println!("history capacity: {}", cfg.history.capacity);
        for (name, status) in &checks {
            println!("{name}: {status}");
        }
    }

    if !missing.is_empty() {
        return Err(eyre::Report::new(ags_core::AgsError::Config(format!(
            "collaborator program not found for: {}",
            missing.join(", ")
        ))));
    }
    Ok(())
}

pub fn render_outcome(cycle: u64, outcome: &CycleOutcome, json: bool) -> String {
    if json {
        let mut v = serde_json::json!({ "cycle": cycle, "outcome": outcome.kind() });
        match outcome {
            CycleOutcome::Recommended(r) => {
                v["bolus"] = r.bolus.into();
                v["mean_abs_error"] = r.mean_abs_error.into();
                v["model"] = r.model.as_str().into();
                v["trajectory"] = r.trajectory.clone().into();
            }
            CycleOutcome::Failed(e) => v["error"] = e.to_string().into(),
            CycleOutcome::NoNewData => {}
        }
        return v.to_string();
    }
    match outcome {
        CycleOutcome::Recommended(r) => format!(
            "cycle {cycle}: recommended bolus {:.1} U (mae {:.2} mg/dL, model {})",
            r.bolus, r.mean_abs_error, r.model
        ),
        CycleOutcome::NoNewData => format!("cycle {cycle}: no new data"),
        CycleOutcome::Failed(e) => format!("cycle {cycle}: failed: {e}"),
    }
}

pub fn render_summary(s: &LoopSummary, json: bool) -> String {
    if json {
        serde_json::json!({
            "summary": {
                "cycles": s.cycles,
                "recommended": s.recommended,
                "no_new_data": s.no_new_data,
                "failed": s.failed,
            }
        })
        .to_string()
    } else {
        format!(
            "{} cycles: {} recommended, {} no new data, {} failed",
            s.cycles, s.recommended, s.no_new_data, s.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ags_core::{AgsError, Recommendation};

    #[test]
    fn text_outcomes_name_the_bolus_and_model() {
        let rec = Recommendation {
            bolus: 1.5,
            trajectory: vec![120.0, 115.0],
            mean_abs_error: 7.25,
            model: "state_space".into(),
        };
        let line = render_outcome(3, &CycleOutcome::Recommended(rec), false);
        assert_eq!(
            line,
            "cycle 3: recommended bolus 1.5 U (mae 7.25 mg/dL, model state_space)"
        );
    }

    #[test]
    fn json_failure_carries_the_error() {
        let line = render_outcome(1, &CycleOutcome::Failed(AgsError::Timeout), true);
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["outcome"], "failed");
        assert_eq!(v["error"], "timeout waiting for collaborator");
    }

    #[test]
    fn missing_collaborator_is_a_config_error() {
        let cfg = ags_config::Config::default();
        let err = spec_for("acquisition", cfg.collaborators.acquisition.as_deref()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgsError>(),
            Some(AgsError::Config(_))
        ));
    }

    #[test]
    fn absolute_paths_resolve_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let prog = dir.path().join("collab");
        std::fs::write(&prog, "").unwrap();
        assert_eq!(resolve_program(prog.to_str().unwrap()), Some(prog.clone()));
        assert!(resolve_program(dir.path().join("nope").to_str().unwrap()).is_none());
    }
}
