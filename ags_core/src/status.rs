//! Outcome of one control cycle.

use crate::controller::Recommendation;
use crate::error::AgsError;

/// Public status of a single ingestion + optimisation cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Acquisition had nothing new (empty output or a repeated sample).
    NoNewData,
    /// A correction was chosen.
    Recommended(Recommendation),
    /// The cycle failed; the loop carries on with the next one.
    Failed(AgsError),
}

impl CycleOutcome {
    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            Self::Recommended(r) => Some(r),
            _ => None,
        }
    }

    /// Short tag for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoNewData => "no_new_data",
            Self::Recommended(_) => "recommended",
            Self::Failed(_) => "failed",
        }
    }
}
