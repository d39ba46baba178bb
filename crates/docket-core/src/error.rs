//! Error taxonomy shared by every engine operation.
//!
//! [`EngineError`] is the only error type that crosses the engine boundary.
//! Storage backends translate their native failures into it (duplicate key
//! → [`EngineError::DuplicateEmail`], missing row or dangling foreign key →
//! [`EngineError::ClientNotFound`]); embedding providers surface every
//! failure as [`EngineError::EmbeddingUnavailable`].

use thiserror::Error;
use uuid::Uuid;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure kinds surfaced by the store, the embedding provider, and the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// A client with this email already exists.
    #[error("Email is already in use: {email}")]
    DuplicateEmail { email: String },

    /// No client row matches the given id.
    #[error("Client not found: {id}")]
    ClientNotFound { id: Uuid },

    /// The remote embedding call failed, timed out, or returned a malformed payload.
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The caller-supplied deadline elapsed before the operation completed.
    #[error("Operation timed out")]
    Timeout,

    /// The query was empty after normalization.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Catch-all for storage or unexpected failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`EngineError`], used by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    NotFound,
    InvalidInput,
    Unavailable,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Machine-readable error code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "bad_request",
            ErrorKind::Unavailable => "embedding_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Conflict => 409,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::Timeout => 504,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether retrying the same request unchanged may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Unavailable | ErrorKind::Timeout | ErrorKind::Internal
        )
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::DuplicateEmail { .. } => ErrorKind::Conflict,
            EngineError::ClientNotFound { .. } => ErrorKind::NotFound,
            EngineError::EmbeddingUnavailable(_) => ErrorKind::Unavailable,
            EngineError::Timeout => ErrorKind::Timeout,
            EngineError::InvalidQuery(_) => ErrorKind::InvalidInput,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    pub fn embedding_unavailable(message: impl Into<String>) -> Self {
        EngineError::EmbeddingUnavailable(message.into())
    }
}
