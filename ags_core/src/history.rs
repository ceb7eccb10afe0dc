//! Rolling in-memory history: BG readings, insulin readings, raw prediction
//! values and the latest future-insulin forecast.

use crate::reading::{BgReading, InsulinReading};
use crate::ring_buffer::{RingBuffer, RingBufferError};

#[derive(Debug)]
pub struct History {
    bg: RingBuffer<BgReading>,
    insulin: RingBuffer<InsulinReading>,
    predictions: RingBuffer<f64>,
    forecast: Vec<f64>,
}

impl History {
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        Ok(Self {
            bg: RingBuffer::new(capacity)?,
            insulin: RingBuffer::new(capacity)?,
            predictions: RingBuffer::new(capacity)?,
            forecast: Vec::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.bg.capacity()
    }

    /// Resize all three buffers together. Fails without side effects if any
    /// buffer holds more than `capacity` elements.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), RingBufferError> {
        let longest = self.bg.len().max(self.insulin.len()).max(self.predictions.len());
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        if capacity < longest {
            return Err(RingBufferError::CapacityBelowLen {
                capacity,
                len: longest,
            });
        }
        self.bg.set_capacity(capacity)?;
        self.insulin.set_capacity(capacity)?;
        self.predictions.set_capacity(capacity)
    }

    pub fn bg(&self) -> &RingBuffer<BgReading> {
        &self.bg
    }

    pub fn insulin(&self) -> &RingBuffer<InsulinReading> {
        &self.insulin
    }

    pub fn predictions(&self) -> &RingBuffer<f64> {
        &self.predictions
    }

    /// Latest future-insulin forecast; replaced on every accepted record.
    pub fn forecast(&self) -> &[f64] {
        &self.forecast
    }

    /// Sample time of the newest BG reading, if any.
    pub fn last_sample_time(&self) -> Option<f64> {
        self.bg.last().ok().map(BgReading::sample_time)
    }

    pub(crate) fn accept(&mut self, bg: BgReading, insulin: InsulinReading, forecast: Vec<f64>) {
        if let Some(old) = self.bg.enqueue(bg) {
            tracing::trace!(sample_time = old.sample_time(), "evicted oldest BG reading");
        }
        self.insulin.enqueue(insulin);
        self.forecast = forecast;
    }

    /// Record raw prediction values (oldest evicted when full).
    pub fn record_predictions(&mut self, values: &[f64]) {
        for v in values {
            self.predictions.enqueue(*v);
        }
    }

    /// The `n` most recent BG values, oldest first.
    pub fn recent_bg(&self, n: usize) -> Result<Vec<i32>, RingBufferError> {
        Ok(self.bg.last_n(n)?.into_iter().map(BgReading::value).collect())
    }
}
