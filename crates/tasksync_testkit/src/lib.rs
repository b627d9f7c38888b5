//! # tasksync testkit
//!
//! Test utilities for tasksync.
//!
//! This crate provides:
//! - Store fixtures (in-memory, temporary directory, failing backend)
//! - A wired engine harness over a manual clock and an in-memory remote
//! - Entity builders for local and remote records
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tasksync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pushes_a_new_list() {
//!     let h = Harness::signed_in("user-1");
//!     let list = h.sync.add_task_list("Work").await.unwrap();
//!     assert!(h.remote.task_list(&list.id).is_some());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
