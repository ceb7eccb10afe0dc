//! Raw acquisition record parsing and the reading factories.
//!
//! Layout: `bg,trend,lag,sample_time,iob[,future0,future1,...]`.

use crate::error::{AgsError, Result};
use crate::reading::{BgReading, InsulinReading, TimedReading};

/// Minimum number of fields in a record (everything before the forecast tail).
pub const MIN_FIELDS: usize = 5;

/// One parsed acquisition record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub bg: i32,
    pub trend: i32,
    pub lag_s: f64,
    pub sample_time: f64,
    pub insulin_on_board: f64,
    /// Future insulin-on-board forecast, one value per 5 minute step.
    pub forecast: Vec<f64>,
}

fn malformed(msg: String) -> eyre::Report {
    eyre::Report::new(AgsError::MalformedRecord(msg))
}

fn field<T: std::str::FromStr>(fields: &[&str], idx: usize, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = fields[idx];
    raw.parse::<T>()
        .map_err(|e| malformed(format!("field {idx} ({name}) = {raw:?}: {e}")))
}

fn finite(v: f64, name: &str) -> Result<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(malformed(format!("{name} must be finite, got {v}")))
    }
}

impl RawRecord {
    /// Parse one record. Surrounding whitespace and a trailing newline are ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() < MIN_FIELDS {
            return Err(malformed(format!(
                "expected at least {MIN_FIELDS} fields, got {}",
                fields.len()
            )));
        }
        let bg = field::<i32>(&fields, 0, "bg")?;
        let trend = field::<i32>(&fields, 1, "trend")?;
        let lag_s = finite(field::<f64>(&fields, 2, "lag")?, "lag")?;
        let sample_time = finite(field::<f64>(&fields, 3, "sample_time")?, "sample_time")?;
        let insulin_on_board = finite(field::<f64>(&fields, 4, "iob")?, "iob")?;
        if lag_s < 0.0 {
            return Err(malformed(format!("negative acquisition lag {lag_s}")));
        }
        let forecast = (MIN_FIELDS..fields.len())
            .map(|i| field::<f64>(&fields, i, "forecast").and_then(|v| finite(v, "forecast")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            bg,
            trend,
            lag_s,
            sample_time,
            insulin_on_board,
            forecast,
        })
    }

    fn timing(&self) -> TimedReading {
        TimedReading::new(self.sample_time, self.lag_s)
    }

    /// Factory: the BG reading carried by this record.
    pub fn bg_reading(&self) -> BgReading {
        BgReading::new(self.timing(), self.bg, self.trend)
    }

    /// Factory: the insulin reading carried by this record. Shares the
    /// timestamp triple of the BG reading.
    pub fn insulin_reading(&self) -> InsulinReading {
        InsulinReading::new(self.timing(), self.insulin_on_board)
    }
}
