//! Ingestion and deduplication of acquisition records.
//!
//! Each poll calls the acquisition collaborator once. A record is accepted only
//! when its sample time is strictly newer than the newest BG reading held; the
//! BG and insulin readings are then enqueued together and the future-insulin
//! forecast is replaced. Any failure leaves the history untouched.

use ags_traits::{HistorySource, ReadingSource};

use crate::collab_error::to_report;
use crate::error::{AgsError, Result};
use crate::history::History;
use crate::record::RawRecord;

/// What a single ingestion attempt did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// Acquisition returned nothing (or a record without a sample time).
    NoNewData,
    /// The record is not newer than the newest reading held.
    Stale { sample_time: f64, last: f64 },
    /// Both readings were enqueued and the forecast replaced.
    Accepted { sample_time: f64 },
}

impl IngestOutcome {
    /// True only when new readings were stored.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

pub struct IngestionService<R, H> {
    source: R,
    history_source: H,
    history: History,
}

impl<R: ReadingSource, H: HistorySource> IngestionService<R, H> {
    pub fn new(source: R, history_source: H, capacity: usize) -> Result<Self> {
        let history = History::new(capacity).map_err(|e| AgsError::Config(e.to_string()))?;
        Ok(Self {
            source,
            history_source,
            history,
        })
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Fetch one record from the acquisition collaborator and ingest it.
    pub fn poll(&mut self) -> Result<IngestOutcome> {
        let raw = self.source.fetch().map_err(to_report)?;
        if raw.trim().is_empty() {
            tracing::debug!("acquisition returned no data");
            return Ok(IngestOutcome::NoNewData);
        }
        self.ingest_record(&raw)
    }

    /// Ingest a raw record already in hand.
    pub fn ingest_record(&mut self, raw: &str) -> Result<IngestOutcome> {
        let record = RawRecord::parse(raw)?;
        // The acquisition script reports a zero sample time when the sensor
        // share had nothing to offer.
        if record.sample_time == 0.0 {
            tracing::debug!("record carries no sample time");
            return Ok(IngestOutcome::NoNewData);
        }
        let bg = record.bg_reading();
        let insulin = record.insulin_reading();

        if let Some(last) = self.history.last_sample_time()
            && bg.sample_time() <= last
        {
            tracing::info!(sample_time = bg.sample_time(), last, "not a new reading");
            return Ok(IngestOutcome::Stale {
                sample_time: bg.sample_time(),
                last,
            });
        }

        let sample_time = bg.sample_time();
        tracing::info!(
            bg = bg.value(),
            trend = bg.trend(),
            iob = insulin.insulin_on_board(),
            sample_time,
            forecast_len = record.forecast.len(),
            "accepted reading"
        );
        self.history.accept(bg, insulin, record.forecast);
        Ok(IngestOutcome::Accepted { sample_time })
    }

    /// The `n` most recent BG values, oldest first. Served from memory when the
    /// history holds enough readings, otherwise from the history collaborator.
    pub fn recent_bg(&mut self, n: usize) -> Result<Vec<i32>> {
        if self.history.bg().len() >= n {
            return self
                .history
                .recent_bg(n)
                .map_err(|e| eyre::Report::new(AgsError::Io(e.to_string())));
        }
        tracing::debug!(
            have = self.history.bg().len(),
            need = n,
            "querying history collaborator"
        );
        let values = self.history_source.recent_bg(n).map_err(to_report)?;
        if values.len() < n {
            return Err(eyre::Report::new(AgsError::insufficient(n, values.len())));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ags_traits::BoxError;

    struct Scripted(Vec<&'static str>);

    impl ReadingSource for Scripted {
        fn fetch(&mut self) -> std::result::Result<String, BoxError> {
            if self.0.is_empty() {
                Ok(String::new())
            } else {
                Ok(self.0.remove(0).to_string())
            }
        }
    }

    struct NoHistory;

    impl HistorySource for NoHistory {
        fn recent_bg(&mut self, _n: usize) -> std::result::Result<Vec<i32>, BoxError> {
            Err("history database unavailable".into())
        }
    }

    #[test]
    fn duplicate_record_is_stale_and_changes_nothing() {
        let line = "120,5,10,1000,2.5,1.1,1.0";
        let mut svc = IngestionService::new(Scripted(vec![line, line]), NoHistory, 8).unwrap();
        assert!(svc.poll().unwrap().is_new());
        let second = svc.poll().unwrap();
        assert!(!second.is_new());
        assert!(matches!(second, IngestOutcome::Stale { .. }));
        assert_eq!(svc.history().bg().len(), 1);
        assert_eq!(svc.history().insulin().len(), 1);
        assert_eq!(svc.history().forecast(), &[1.1, 1.0]);
    }

    #[test]
    fn empty_output_is_no_new_data() {
        let mut svc = IngestionService::new(Scripted(vec![" \n"]), NoHistory, 8).unwrap();
        assert_eq!(svc.poll().unwrap(), IngestOutcome::NoNewData);
        assert!(svc.history().bg().is_empty());
    }

    #[test]
    fn zero_sample_time_is_no_new_data() {
        let mut svc = IngestionService::new(Scripted(vec![]), NoHistory, 8).unwrap();
        assert_eq!(
            svc.ingest_record("0,0,0,0,0").unwrap(),
            IngestOutcome::NoNewData
        );
    }

    #[test]
    fn malformed_record_leaves_state_unchanged() {
        let mut svc = IngestionService::new(Scripted(vec![]), NoHistory, 8).unwrap();
        svc.ingest_record("120,5,10,1000,2.5,3.0").unwrap();
        assert!(svc.ingest_record("121,5,10,1300").is_err());
        assert_eq!(svc.history().bg().len(), 1);
        assert_eq!(svc.history().forecast(), &[3.0]);
    }

    #[test]
    fn recent_bg_falls_back_to_collaborator_error() {
        let mut svc = IngestionService::new(Scripted(vec![]), NoHistory, 8).unwrap();
        svc.ingest_record("120,5,10,1000,2.5").unwrap();
        assert_eq!(svc.recent_bg(1).unwrap(), vec![120]);
        let err = svc.recent_bg(6).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgsError>(),
            Some(AgsError::External(_))
        ));
    }
}
