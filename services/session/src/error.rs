//! Error taxonomy for session operations
//!
//! The set of failures is closed: callers match on [`SessionError`] variants
//! instead of comparing against shared sentinel values.

use common::error::{CacheError, DatabaseError};
use thiserror::Error;

use crate::context::Interrupted;

/// Error type surfaced by the session manager and its adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No record exists for the key
    #[error("not found: {0}")]
    NotFound(String),

    /// A registration collided with an existing account
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// A registration used a mail address bound to another account
    #[error("mail address already in use: {0}")]
    AlreadyUsedMail(String),

    /// Malformed input
    #[error("invalid: {0}")]
    Invalid(String),

    /// Credential check failed in the registration layer
    #[error("invalid password")]
    InvalidPassword,

    /// Adapter or infrastructure failure not otherwise classified
    #[error("server error: {0}")]
    OnServer(String),

    /// An encoded record could not be decoded into a complete record
    #[error("failed to extract: {0}")]
    Extract(String),
}

impl SessionError {
    /// Whether this is the "key absent" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_))
    }
}

/// Type alias for session results
pub type SessionResult<T> = Result<T, SessionError>;

impl From<DatabaseError> for SessionError {
    fn from(err: DatabaseError) -> Self {
        SessionError::OnServer(err.to_string())
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::Query(err).into()
    }
}

impl From<CacheError> for SessionError {
    fn from(err: CacheError) -> Self {
        SessionError::OnServer(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Extract(err.to_string())
    }
}

impl From<Interrupted> for SessionError {
    fn from(err: Interrupted) -> Self {
        SessionError::OnServer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruption_is_a_server_error() {
        assert_eq!(
            SessionError::from(Interrupted::DeadlineExceeded),
            SessionError::OnServer("deadline exceeded".to_string())
        );
    }

    #[test]
    fn test_json_errors_are_extract_failures() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(SessionError::from(err), SessionError::Extract(_)));
    }

    #[test]
    fn test_migration_errors_keep_their_message() {
        let err = SessionError::from(DatabaseError::Migration("table missing".to_string()));
        assert_eq!(
            err,
            SessionError::OnServer("Database migration error: table missing".to_string())
        );
        assert!(!err.is_not_found());
    }
}
