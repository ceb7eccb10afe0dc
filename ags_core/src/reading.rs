//! Typed reading entities built from one acquisition record.

use crate::util::READING_INTERVAL_S;

/// Timestamp triple shared by the BG and insulin readings of one record.
///
/// Times are seconds since the Unix epoch. `scrape_time >= sample_time`
/// always holds; the record factory rejects a negative lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedReading {
    sample_time: f64,
    scrape_time: f64,
    delay_time: f64,
}

impl TimedReading {
    pub(crate) fn new(sample_time: f64, lag_s: f64) -> Self {
        let scrape_time = sample_time + lag_s;
        Self {
            sample_time,
            scrape_time,
            delay_time: (sample_time + READING_INTERVAL_S) - scrape_time,
        }
    }

    /// When the sensor took the measurement.
    pub fn sample_time(&self) -> f64 {
        self.sample_time
    }

    /// When the acquisition collaborator fetched it.
    pub fn scrape_time(&self) -> f64 {
        self.scrape_time
    }

    /// Seconds left until the next reading is due, as seen at scrape time.
    pub fn delay_time(&self) -> f64 {
        self.delay_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BgReading {
    timing: TimedReading,
    value: i32,
    trend: i32,
}

impl BgReading {
    pub(crate) fn new(timing: TimedReading, value: i32, trend: i32) -> Self {
        Self {
            timing,
            value,
            trend,
        }
    }

    pub fn timing(&self) -> &TimedReading {
        &self.timing
    }

    pub fn sample_time(&self) -> f64 {
        self.timing.sample_time
    }

    /// mg/dL
    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn trend(&self) -> i32 {
        self.trend
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsulinReading {
    timing: TimedReading,
    insulin_on_board: f64,
}

impl InsulinReading {
    pub(crate) fn new(timing: TimedReading, insulin_on_board: f64) -> Self {
        Self {
            timing,
            insulin_on_board,
        }
    }

    pub fn timing(&self) -> &TimedReading {
        &self.timing
    }

    pub fn sample_time(&self) -> f64 {
        self.timing.sample_time
    }

    /// Units of insulin still active.
    pub fn insulin_on_board(&self) -> f64 {
        self.insulin_on_board
    }
}
