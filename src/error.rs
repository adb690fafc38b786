//! Error types shared across the solver.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Coordinates and declared dimension disagree. Raised before any model is built.
    #[error("malformed instance: {0}")]
    MalformedInstance(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// An invariant inside the callback adapter was violated; the search must stop.
    #[error("fatal callback fault: {0}")]
    Fatal(String),
    #[error("solver backend '{0}' is not available in this build")]
    BackendUnavailable(String),
    #[error("solver backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInstance(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
