use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` timed out after {timeout_ms} ms")]
    Timeout { program: String, timeout_ms: u64 },
    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected output from `{program}`: {detail}")]
    Output { program: String, detail: String },
    #[error("empty command line")]
    EmptyCommand,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollabError>;
