//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quota error: {0}")]
    Quota(#[from] tandem_quota::QuotaError),

    #[error("Engine error: {0}")]
    Engine(#[from] tandem_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tandem_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] tandem_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
