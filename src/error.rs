//! Error types for repair-queue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid check-in: {0}")]
    Validation(String),

    #[error("failed to read slot {slot}: {reason}")]
    PersistenceRead { slot: String, reason: String },

    #[error("failed to write slot {slot}: {reason}")]
    PersistenceWrite { slot: String, reason: String },

    #[error("customer not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
