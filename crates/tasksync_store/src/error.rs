//! Error types for the local store.

use std::io;
use tasksync_model::{EntityType, ModelError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The snapshot was written by an unknown format version.
    #[error("unsupported snapshot format version {0}")]
    UnsupportedFormat(u16),

    /// Entity not found.
    #[error("{entity_type} not found: {id}")]
    EntityNotFound {
        /// Entity type searched.
        entity_type: EntityType,
        /// Missing id.
        id: String,
    },

    /// An entity with this id already exists.
    #[error("{entity_type} already exists: {id}")]
    DuplicateId {
        /// Entity type.
        entity_type: EntityType,
        /// Conflicting id.
        id: String,
    },

    /// Queue item not found.
    #[error("queue item not found: {0}")]
    QueueItemNotFound(u64),

    /// Entity data could not be converted.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The storage backend refused the write.
    #[error("backend error: {0}")]
    Backend(String),

    /// Operation not permitted in current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Creates an entity-not-found error.
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::not_found(EntityType::TaskList, "l1");
        assert_eq!(err.to_string(), "taskList not found: l1");

        let err = StoreError::QueueItemNotFound(9);
        assert_eq!(err.to_string(), "queue item not found: 9");

        assert!(StoreError::Locked.to_string().contains("locked"));
    }
}
