//! Errors raised before anything reaches the remote store.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Input rejected by a record's own checks. Store, transport and auth
/// failures have their own error types downstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A field of a create/patch payload is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Text that should have been a uuid-backed id.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
