//! CLI command implementations.

pub mod entities;
pub mod purge;
pub mod queue;
pub mod status;

use std::path::Path;
use std::sync::Arc;
use tasksync_model::SystemClock;
use tasksync_store::{LocalStore, StoreConfig, StoreResult};

/// Opens an existing store directory.
pub fn open(path: &Path) -> StoreResult<LocalStore> {
    let config = StoreConfig::new().create_if_missing(false);
    LocalStore::open_path(path, &config, Arc::new(SystemClock))
}
