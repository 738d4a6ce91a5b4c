//! Sweep-side error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures from the materialization collaborator.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    #[error("materialization rejected: {0}")]
    Rejected(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Failures from a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures surfaced by sweep-level operations.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("unknown obligation: {0}")]
    UnknownObligation(String),

    #[error("{date} is not the held occurrence for {subject}")]
    NotHeld { subject: String, date: NaiveDate },
}
