//! Task lists known to exist remotely.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared cache of list ids confirmed present on the backend.
///
/// Filled by successful list pushes, by existence checks and by pulls.
/// Cleared when the session ends.
#[derive(Debug, Clone, Default)]
pub struct ConfirmedLists {
    ids: Arc<RwLock<HashSet<String>>>,
}

impl ConfirmedLists {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a list as present remotely.
    pub fn confirm(&self, id: impl Into<String>) {
        self.ids.write().insert(id.into());
    }

    /// Records several lists as present remotely.
    pub fn confirm_all<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = self.ids.write();
        set.extend(ids.into_iter().map(Into::into));
    }

    /// Returns true if the list is known to exist remotely.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.read().contains(id)
    }

    /// Forgets everything.
    pub fn clear(&self) {
        self.ids.write().clear();
    }

    /// Number of confirmed lists.
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Returns true if nothing is confirmed.
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}
