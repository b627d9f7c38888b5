//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// Clones share the same snapshot, so a test can "reopen" a store by
/// handing a clone of the backend to a new [`crate::LocalStore`].
///
/// # Example
///
/// ```rust
/// use tasksync_store::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// assert!(backend.load().unwrap().is_none());
/// backend.store(b"snapshot").unwrap();
/// assert_eq!(backend.load().unwrap().as_deref(), Some(&b"snapshot"[..]));
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Option<Vec<u8>>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding an existing snapshot.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(Some(data))),
        }
    }

    /// Returns the size of the stored snapshot in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.read().as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().clone())
    }

    fn store(&mut self, snapshot: &[u8]) -> StoreResult<()> {
        *self.data.write() = Some(snapshot.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_snapshot() {
        let mut backend = InMemoryBackend::new();
        let reopened = backend.clone();

        backend.store(&[1, 2, 3]).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(reopened.size(), 3);
    }

    #[test]
    fn store_replaces() {
        let mut backend = InMemoryBackend::with_data(vec![9; 10]);
        backend.store(&[1]).unwrap();
        assert_eq!(backend.load().unwrap(), Some(vec![1]));
    }
}
