//! Error types for schedule generation and the patient store.
//!
//! The generator itself never fails on bad medication parameters; those
//! degrade to an empty or default-length schedule. [`ScheduleError`] only
//! covers inputs that cannot be interpreted at all.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while interpreting generator inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The start time text matched none of the accepted formats.
    #[error("unparseable start time '{0}' (expected e.g. '2025-03-09 12:55')")]
    UnparseableStartTime(String),

    /// Active window bounds are not whole hours with `start < end <= 24`.
    #[error("invalid active window {start}..{end}: need whole hours with start < end <= 24")]
    InvalidWindow { start: String, end: String },
}

/// Failures reading or updating the JSON patient store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize patient database: {0}")]
    Json(#[from] serde_json::Error),

    #[error("patient '{0}' not found")]
    PatientNotFound(String),

    #[error("patient '{0}' already exists")]
    PatientExists(String),
}
