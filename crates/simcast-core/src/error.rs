//! Error types for simcast

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Not enough history to train or forecast
    #[error("Insufficient data: {0}")]
    DataInsufficiency(String),

    /// The model artifact is missing, unreadable or corrupt
    #[error("Model artifact unavailable at {}: {reason}", path.display())]
    ArtifactUnavailable { path: PathBuf, reason: String },

    #[error("Training error: {0}")]
    Training(String),
}

pub type Result<T> = std::result::Result<T, Error>;
