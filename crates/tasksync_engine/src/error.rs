//! Error types for the sync engine.

use std::fmt;
use std::time::Duration;
use tasksync_model::{EntityType, ModelError};
use tasksync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for remote backend calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unreachable or timed out.
    Network,
    /// 5xx.
    Server,
    /// 401/403.
    Auth,
    /// 400/422.
    Validation,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Returns true if failures of this kind are retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Server)
    }

    /// Uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Server => "SERVER",
            ErrorKind::Auth => "AUTH",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// Classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// HTTP-style status, when the backend sent one.
    pub status: Option<u16>,
}

impl RemoteError {
    /// Creates an error of a given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// A connection-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// A call that exceeded its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self::network(format!("remote call timed out after {}ms", after.as_millis()))
    }

    /// Classifies a status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ErrorKind::Auth,
            400 | 422 => ErrorKind::Validation,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<ModelError> for RemoteError {
    fn from(err: ModelError) -> Self {
        Self::new(ErrorKind::Unknown, err.to_string())
    }
}

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// Remote backend failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Entity data could not be converted.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The operation needs a signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Entity not found or tombstoned.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        /// Entity type.
        entity_type: EntityType,
        /// Missing id.
        id: String,
    },

    /// Queue item not found.
    #[error("queue item not found: {0}")]
    QueueItemNotFound(u64),

    /// Operation not permitted in current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl SyncError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EntityNotFound { entity_type, id } => Self::NotFound { entity_type, id },
            StoreError::QueueItemNotFound(id) => Self::QueueItemNotFound(id),
            StoreError::InvalidOperation(message) => Self::InvalidOperation(message),
            StoreError::Model(err) => Self::Model(err),
            other => Self::Store(other),
        }
    }
}
