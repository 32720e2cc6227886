//! Engine error types.

use tandem_account::AccountError;
use thiserror::Error;

/// Errors surfaced while assembling or starting the engine.
///
/// Once the tick loop is running, failures are handled in place (retry,
/// compensation, failover) or latched on the stop controller instead of
/// being returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("account error: {0}")]
    Account(#[from] AccountError),

    #[error("no account pair groups configured")]
    NoGroups,
}

pub type EngineResult<T> = Result<T, EngineError>;
