//! # tasksync engine
//!
//! Offline-first sync for tasks and task lists.
//!
//! This crate provides:
//! - The push executor that drains the durable operation queue
//! - Pull and last-write-wins merge of remote changes
//! - The session and connectivity lifecycle coordinator
//! - Retry with exponential backoff for transient failures
//! - A remote backend abstraction with an in-memory implementation
//! - The `TaskSync` facade used by the UI layer
//!
//! ## Architecture
//!
//! Every local mutation commits to the local store and enqueues its
//! operation in one transaction. The remote is reconciled later:
//! 1. On sign-in, ownerless local data is claimed and queued
//! 2. Remote changes since the last pull are merged (newer wins)
//! 3. Queued operations are pushed in insertion order
//!
//! ## Key Invariants
//!
//! - A local change and its queue item commit together or not at all
//! - Only one drain pass runs at a time
//! - A task is never pushed before its list exists remotely
//! - Each owner has at most one active list on the remote
//! - Ties between local and remote timestamps keep the local version

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod executor;
mod memory_remote;
mod merge;
mod presence;
mod remote;
mod service;
mod session;
pub mod status;

pub use config::{RetryConfig, SyncConfig};
pub use coordinator::{ClaimReport, Coordinator, SessionStartReport};
pub use error::{ErrorKind, RemoteError, RemoteResult, SyncError, SyncResult};
pub use executor::{DrainReport, SyncExecutor};
pub use memory_remote::{MemoryRemote, RemoteCall};
pub use merge::{remote_wins, MergeEngine, PullReport};
pub use presence::ConfirmedLists;
pub use remote::RemoteBackend;
pub use service::TaskSync;
pub use session::{LifecycleEvent, SessionProvider, StaticSession};
pub use status::SyncStatus;
