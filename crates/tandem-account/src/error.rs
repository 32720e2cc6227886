//! Account error types.

use thiserror::Error;

/// Errors surfaced by venue operations.
///
/// `Auth` is permanent for the account; everything else is transient and
/// handled by compensation/retry at the coordinator level.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("venue unavailable: {0}")]
    Unavailable(String),
}

impl AccountError {
    /// Permanent failures must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

pub type AccountResult<T> = Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_auth_is_fatal() {
        assert!(AccountError::Auth("bad key".into()).is_fatal());
        assert!(!AccountError::OrderRejected("size".into()).is_fatal());
        assert!(!AccountError::Unavailable("timeout".into()).is_fatal());
    }
}
