use crate::types::TimestampKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Summary store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("No summaries for series '{series}' in window [{from}, {to}]")]
    NoDataInWindow {
        series: String,
        from:   TimestampKey,
        to:     TimestampKey,
    },

    #[error("Pagination could not complete after {pages} pages: {reason}")]
    PaginationTruncated { pages: usize, reason: String },

    #[error("Simulation run aborted at hour {timestamp_key}; no further steps allowed")]
    RunAborted { timestamp_key: TimestampKey },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// `NoDataInWindow` means "not enough history yet"; everything else is a
    /// genuine failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoDataInWindow { .. })
    }
}

impl From<rusqlite::Error> for SimError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreUnavailable { reason: err.to_string() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
