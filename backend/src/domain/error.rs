//! Transport-agnostic domain errors.
//!
//! Inbound adapters map these onto HTTP responses; the domain never sees a
//! status code. Fan-out failures deliberately do not appear here: they are
//! absorbed into the retry pipeline instead of surfacing to callers.

use thiserror::Error;

use super::PostValidationError;
use super::ports::StoreError;

/// Failure categories surfaced to callers of domain services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The request was malformed; never retried.
    #[error("{0}")]
    Validation(String),
    /// A referenced post or user does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The request conflicts with current state (duplicate follow,
    /// self-follow, unfollow of a missing edge).
    #[error("{0}")]
    Conflict(String),
    /// An authoritative store failed; the operation was aborted.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Helper for validation failures.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Helper for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Helper for state conflicts.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Helper for store and infrastructure failures.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<PostValidationError> for Error {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        Self::Internal(value.to_string())
    }
}

/// Result alias for domain services.
pub type DomainResult<T> = Result<T, Error>;
