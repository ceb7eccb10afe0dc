use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgsError {
    #[error("no new data from acquisition")]
    NoNewData,
    #[error("insufficient history: needed {needed}, got {got}")]
    InsufficientHistory { needed: usize, got: usize },
    #[error("external collaborator error: {0}")]
    External(String),
    #[error("timeout waiting for collaborator")]
    Timeout,
    #[error("buffer is empty")]
    EmptyBuffer,
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("predictor output error: {0}")]
    Predictor(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(String),
}

impl AgsError {
    pub(crate) fn insufficient(needed: usize, got: usize) -> Self {
        Self::InsufficientHistory { needed, got }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing prediction model")]
    MissingModel,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
