//! # DomainError
//!
//! Centralized error handling for the Story feed.
//! Every port and service returns this type so adapters can surface
//! client errors and storage conflicts without string matching.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed request (missing file, empty comment, unsupported media type)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resource absent or soft-deleted (entity kind, id)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Requester does not own the resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Operation not allowed in the resource's current state (e.g. expired)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No usable viewer identity on the request
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Transient write conflict; the unit of work may be retried
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (DB down, disk full)
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn story_not_found(id: impl ToString) -> Self {
        Self::NotFound("story", id.to_string())
    }

    pub fn reply_not_found(id: impl ToString) -> Self {
        Self::NotFound("reply", id.to_string())
    }

    pub fn access_denied() -> Self {
        Self::Forbidden("access denied".to_string())
    }

    /// Wraps any displayable infrastructure error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// A specialized Result type for Story feed logic.
pub type Result<T> = std::result::Result<T, DomainError>;
