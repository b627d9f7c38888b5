//! # tasksync store
//!
//! Local entity store and durable operation queue.
//!
//! This crate provides:
//! - `LocalStore`: tasks, task lists, the sync queue and pull watermarks
//! - `Transaction`: all-or-nothing mutation scope (local write + enqueue)
//! - `StorageBackend`: pluggable snapshot persistence
//!   (`InMemoryBackend`, `FileBackend`)
//!
//! ## Key Invariants
//!
//! - A mutation and its queue item are committed together or not at all
//! - The snapshot is persisted before the in-memory state is replaced
//! - Queue ids are monotonic; reading back by id is creation order
//! - Local writes stamp timestamps from the store's clock; only the
//!   import path keeps caller-supplied timestamps

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod file;
mod memory;
mod queue;
mod snapshot;
mod store;

pub use backend::StorageBackend;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use snapshot::FORMAT_VERSION;
pub use store::{LocalStore, PurgeReport, Scope, StoreView, Transaction};
