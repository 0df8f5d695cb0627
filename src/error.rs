// src/error.rs

use std::{fmt, path::PathBuf};

/// Why a single geocode attempt did not yield a usable coordinate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// Request could not be sent, or the service answered with a non-success status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body was not the expected XML document.
    #[error("decode error: {0}")]
    Decode(String),
    /// Response decoded fine but listed zero candidates.
    #[error("no candidates returned")]
    NoCandidates,
}

/// Fatal failures of a run. None of these are recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{} not found", .path.display())]
    ConfigMissing { path: PathBuf },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("cannot find the header row (no `{marker}` cell in the identifier column)")]
    HeaderNotFound { marker: String },

    #[error("failed to geocode `{address}` after {attempts} attempts: {last}")]
    GeocodeUnresolved {
        address: String,
        attempts: u32,
        last: AttemptFailure,
    },

    #[error("failed to find reward table `{key}`")]
    RewardTableNotFound { key: String },

    #[error("unsupported source extension for {locator}")]
    UnsupportedSource { locator: String },
}

impl PipelineError {
    pub fn parse(what: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Parse {
            what: what.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
