//! Maps `Box<dyn Error>` from collaborator trait boundaries to typed `AgsError`.
//!
//! The traits in `ags_traits` return `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `ags_external::CollabError` downcasting.

use crate::error::AgsError;

/// Map a trait-boundary error to a typed `AgsError`.
///
/// Attempts to downcast known collaborator error types first, then falls back
/// to string-based heuristics.
pub fn map_collab_error(e: &(dyn std::error::Error + 'static)) -> AgsError {
    #[cfg(feature = "external-errors")]
    {
        use ags_external::error::CollabError;
        if let Some(c) = e.downcast_ref::<CollabError>() {
            return match c {
                CollabError::Timeout { .. } => AgsError::Timeout,
                CollabError::Io(io) => AgsError::Io(io.to_string()),
                other => AgsError::External(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        if io.kind() == std::io::ErrorKind::TimedOut {
            return AgsError::Timeout;
        }
        return AgsError::Io(io.to_string());
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        AgsError::Timeout
    } else {
        AgsError::External(s)
    }
}

/// Convenience for `map_err` on boxed collaborator results.
pub(crate) fn to_report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_collab_error(e.as_ref()))
}
