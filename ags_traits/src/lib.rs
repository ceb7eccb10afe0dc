pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::path::Path;

/// Error type used across every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw acquisition source (CGM scraper).
pub trait ReadingSource {
    /// Fetch the latest raw record: `bg,trend,lag,sample_time,iob[,future...]`.
    /// An empty string means the source had nothing new this cycle.
    fn fetch(&mut self) -> Result<String, BoxError>;
}

/// Long-term BG store queried when the in-memory history is too short.
pub trait HistorySource {
    /// The `n` most recent BG values in mg/dL, oldest first.
    fn recent_bg(&mut self, n: usize) -> Result<Vec<i32>, BoxError>;
}

/// External statistical predictor.
pub trait Predictor {
    /// Run the predictor against the exchange file and return its raw stdout.
    fn run(&mut self, exchange_file: &Path) -> Result<String, BoxError>;
}

/// Optional sink that archives the last prediction.
pub trait PredictionArchive {
    fn archive(&mut self) -> Result<(), BoxError>;
}

impl<T: ReadingSource + ?Sized> ReadingSource for Box<T> {
    fn fetch(&mut self) -> Result<String, BoxError> {
        (**self).fetch()
    }
}

impl<T: HistorySource + ?Sized> HistorySource for Box<T> {
    fn recent_bg(&mut self, n: usize) -> Result<Vec<i32>, BoxError> {
        (**self).recent_bg(n)
    }
}

impl<T: Predictor + ?Sized> Predictor for Box<T> {
    fn run(&mut self, exchange_file: &Path) -> Result<String, BoxError> {
        (**self).run(exchange_file)
    }
}

impl<T: PredictionArchive + ?Sized> PredictionArchive for Box<T> {
    fn archive(&mut self) -> Result<(), BoxError> {
        (**self).archive()
    }
}
