//! Storage backend trait definition.

use crate::error::StoreResult;

/// Snapshot persistence for the local store.
///
/// Backends are **opaque byte stores** holding exactly one snapshot. The
/// store owns the encoding; backends never interpret the bytes.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `store`
/// - `store` either replaces the snapshot entirely or leaves the previous
///   one intact (no torn writes)
/// - Backends must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads the current snapshot, or `None` if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn load(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically replaces the snapshot.
    ///
    /// After this returns successfully the new snapshot survives process
    /// termination (subject to the backend's durability settings).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the previous snapshot is kept.
    fn store(&mut self, snapshot: &[u8]) -> StoreResult<()>;

    /// Short human-readable description (path, "memory", ...).
    fn describe(&self) -> String;
}
