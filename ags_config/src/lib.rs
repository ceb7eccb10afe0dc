#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and replay-file parsing for the glucose control loop.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The replay CSV loader turns recorded acquisition rows back into raw
//!   records for offline runs.
use serde::Deserialize;

/// Default history depth: 24 h of readings at a 5 minute cadence.
pub const DEFAULT_CAPACITY: usize = 288;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryCfg {
    /// Ring buffer capacity shared by the BG, insulin and prediction histories.
    pub capacity: usize,
}

impl Default for HistoryCfg {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControllerCfg {
    /// mg/dL drop per fully metabolized unit of insulin
    pub sensitivity: i32,
    /// Minutes until plasma insulin peaks
    pub peak_insulin_time: f64,
    /// Minutes until insulin is fully cleared
    pub activity_duration_minutes: f64,
    /// Target BG in mg/dL
    pub target: i32,
    /// Largest bolus the search may recommend (units)
    pub max_bolus: f64,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            sensitivity: 30,
            peak_insulin_time: 57.0,
            activity_duration_minutes: 90.0,
            target: 110,
            max_bolus: 16.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    StateSpace,
    Statistical,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ModelCfg {
    pub kind: ModelKind,
    /// Invoke the archive collaborator after every baseline prediction.
    pub archive_predictions: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Collaborators {
    /// Acquisition command line (prints one raw record)
    pub acquisition: Option<String>,
    /// History query command line (prints six BG values, oldest first)
    pub history_query: Option<String>,
    /// Statistical predictor command line; receives the exchange file path
    pub predictor: Option<String>,
    /// Prediction archive command line
    pub archive: Option<String>,
    /// Exchange file written before each predictor call
    pub exchange_file: String,
    /// Upper bound on any single collaborator call (ms)
    pub timeout_ms: u64,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            acquisition: None,
            history_query: None,
            predictor: None,
            archive: None,
            exchange_file: "predictor/exchange.txt".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Seconds between the start of consecutive cycles
    pub wake_interval_s: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            wake_interval_s: 240,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub history: HistoryCfg,
    pub controller: ControllerCfg,
    pub model: ModelCfg,
    pub collaborators: Collaborators,
    pub schedule: Schedule,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // History
        if self.history.capacity == 0 {
            eyre::bail!("history.capacity must be >= 1");
        }

        // Controller
        let c = &self.controller;
        if c.sensitivity <= 0 {
            eyre::bail!("controller.sensitivity must be > 0");
        }
        if c.target <= 0 {
            eyre::bail!("controller.target must be > 0");
        }
        if !c.max_bolus.is_finite() || c.max_bolus < 0.0 {
            eyre::bail!("controller.max_bolus must be a finite value >= 0");
        }
        if c.max_bolus > 100.0 {
            eyre::bail!("controller.max_bolus is unreasonably large (>100 units)");
        }
        if !(c.activity_duration_minutes.is_finite() && c.activity_duration_minutes > 0.0) {
            eyre::bail!("controller.activity_duration_minutes must be > 0");
        }
        if !(c.peak_insulin_time.is_finite() && c.peak_insulin_time > 0.0) {
            eyre::bail!("controller.peak_insulin_time must be > 0");
        }
        if c.peak_insulin_time >= c.activity_duration_minutes {
            eyre::bail!("controller.peak_insulin_time must be below activity_duration_minutes");
        }

        // Model
        if self.model.kind == ModelKind::Statistical && self.collaborators.exchange_file.is_empty()
        {
            eyre::bail!("collaborators.exchange_file must be set for the statistical model");
        }

        // Collaborators
        if self.collaborators.timeout_ms == 0 {
            eyre::bail!("collaborators.timeout_ms must be >= 1");
        }

        // Schedule
        if self.schedule.wake_interval_s == 0 {
            eyre::bail!("schedule.wake_interval_s must be >= 1");
        }
        if self.schedule.wake_interval_s > 24 * 60 * 60 {
            eyre::bail!("schedule.wake_interval_s is unreasonably large (>24h)");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// Load recorded acquisition rows for offline replay.
///
/// The file is headerless; each row uses the acquisition record layout
/// `bg,trend,lag,sample_time,iob[,future...]` and rows may differ in width.
/// Blank lines and rows starting with `#` are skipped. Each returned string is
/// one raw record, exactly as the acquisition collaborator would print it.
pub fn load_replay_csv(path: &std::path::Path) -> eyre::Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open replay CSV {:?}: {}", path, e))?;

    let mut records = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| eyre::eyre!("invalid replay row {}: {}", idx + 1, e))?;
        if rec.iter().all(str::is_empty) {
            continue;
        }
        if rec.len() < 5 {
            eyre::bail!(
                "replay row {} has {} fields; expected at least 5 (bg,trend,lag,sample_time,iob)",
                idx + 1,
                rec.len()
            );
        }
        records.push(rec.iter().collect::<Vec<_>>().join(","));
    }
    if records.is_empty() {
        eyre::bail!("replay CSV {:?} contains no rows", path);
    }
    Ok(records)
}
