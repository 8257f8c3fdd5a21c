// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetch::FetchAttempt;

/// Every failure the ingestion run can surface.
///
/// `Transport`, `Http` and `InvalidPayload` are per-attempt conditions: the
/// transport client swallows them and moves on to the next candidate source.
/// Everything else ends the materialization of a fiscal year.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("invalid payload from {url}: {reason}")]
    InvalidPayload { url: String, reason: String },

    #[error("all {} candidate sources for {target} failed", attempts.len())]
    SourcesExhausted {
        target: String,
        attempts: Vec<FetchAttempt>,
    },

    /// The publisher changed its table layout. Retrying reproduces it.
    #[error("schema drift: {0}")]
    SchemaDrift(String),

    #[error("no usable price records for {target}")]
    NoRecords { target: String },

    #[error("persistence error at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IngestError {
    /// Worth another try against the same source: network trouble, 5xx and 429.
    /// Everything else moves on to the next candidate or ends the run.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Transport { .. } => true,
            IngestError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Process exit code reported to the scheduler.
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::Transport { .. }
            | IngestError::Http { .. }
            | IngestError::InvalidPayload { .. }
            | IngestError::SourcesExhausted { .. } => 2,
            IngestError::SchemaDrift(_) => 3,
            IngestError::Persistence { .. } => 4,
            IngestError::NoRecords { .. } => 5,
            IngestError::Config(_) => 1,
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Persistence {
            path: path.into(),
            source,
        }
    }
}
