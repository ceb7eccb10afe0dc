//! Human-readable error descriptions and structured JSON error formatting.

use ags_core::error::{AgsError, BuildError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingModel => {
                "What happened: No prediction model was provided to the optimizer.\nLikely causes: The model factory was not wired into the builder.\nHow to fix: Set [model].kind in the config and pass a model via model(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid controller configuration ({msg}).\nLikely causes: Missing or out-of-range values in [controller].\nHow to fix: Edit the config file, then rerun `ags self-check`."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<AgsError>() {
        return match ae {
            AgsError::Timeout => "What happened: A collaborator program did not finish in time.\nLikely causes: Network stall in the acquisition script or a slow predictor.\nHow to fix: Check the collaborator by hand, or raise collaborators.timeout_ms.".to_string(),
            AgsError::External(msg) => format!(
                "What happened: A collaborator program failed ({msg}).\nLikely causes: Wrong command line in [collaborators], missing interpreter, or a crash in the script.\nHow to fix: Run the command by hand and check its output; `ags self-check` lists what is configured."
            ),
            AgsError::MalformedRecord(msg) => format!(
                "What happened: An acquisition record could not be parsed ({msg}).\nLikely causes: The acquisition script printed a warning or changed its output layout.\nHow to fix: Records must be `bg,trend,lag,sample_time,iob[,future...]`."
            ),
            AgsError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: An out-of-range value or a missing entry in the TOML.\nHow to fix: Edit the config file, then rerun `ags self-check`."
            ),
            AgsError::Predictor(msg) => format!(
                "What happened: The statistical predictor returned unusable output ({msg}).\nLikely causes: The model file is missing or the exchange file was not read.\nHow to fix: Run the predictor by hand against the exchange file; it must print 18 numbers."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with the path to your TOML file."
        );
    }

    if lower.contains("parse config") {
        let cause = err.source().map(|s| format!(" Cause: {s}")).unwrap_or_default();
        return format!(
            "What happened: The config file is not valid TOML for this program.{cause}\nLikely causes: A typo in a section or key name, or a value of the wrong type.\nHow to fix: Compare with etc/ags_config.toml and try again."
        );
    }

    if lower.starts_with("history.")
        || lower.starts_with("controller.")
        || lower.starts_with("collaborators.")
        || lower.starts_with("schedule.")
        || lower.starts_with("logging.")
    {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: An out-of-range value in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("replay") {
        return format!(
            "What happened: The replay file could not be used ({msg}).\nLikely causes: Wrong path, or rows not in the `bg,trend,lag,sample_time,iob[,future...]` layout.\nHow to fix: Check the CSV and rerun `ags replay --csv FILE`."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable short name for the error class.
pub fn error_reason(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    let msg = err.to_string();
    if msg.starts_with("parse config") {
        return "Config";
    }
    if msg.starts_with("read config") {
        return "Io";
    }
    match err.downcast_ref::<AgsError>() {
        Some(AgsError::Config(_)) => "Config",
        Some(AgsError::Timeout) => "Timeout",
        Some(AgsError::External(_)) => "External",
        Some(AgsError::Io(_)) => "Io",
        Some(AgsError::MalformedRecord(_)) => "MalformedRecord",
        Some(AgsError::Predictor(_)) => "Predictor",
        Some(_) => "Data",
        None => "Error",
    }
}

/// Map error classes to stable exit codes; unclassified errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match error_reason(err) {
        "Config" => 3,
        "Io" => 4,
        "Timeout" | "External" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": error_reason(err),
        "error": err.to_string(),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_get_a_dedicated_hint_and_code() {
        let err = eyre::Report::new(AgsError::Timeout);
        assert!(humanize(&err).contains("collaborators.timeout_ms"));
        assert_eq!(exit_code_for_error(&err), 5);
    }

    #[test]
    fn validation_messages_are_config_errors() {
        let err = eyre::Report::new(AgsError::Config(
            "controller.sensitivity must be > 0".into(),
        ));
        assert!(humanize(&err).starts_with("What happened: Configuration is invalid"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Config");
        assert_eq!(exit_code_for_error(&err), 3);
    }

    #[test]
    fn unreadable_config_is_an_io_error() {
        let err = eyre::eyre!("read config \"missing.toml\": No such file or directory");
        assert!(humanize(&err).contains("--config"));
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn build_errors_exit_with_config_code() {
        let err = eyre::Report::new(BuildError::InvalidConfig("target must be > 0"));
        assert_eq!(exit_code_for_error(&err), 3);
        assert_eq!(error_reason(&err), "Config");
    }
}
