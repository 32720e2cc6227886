//! Quota error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type QuotaResult<T> = Result<T, QuotaError>;
