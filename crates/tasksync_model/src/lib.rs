//! # tasksync model
//!
//! Entity, queue and wire types for the tasksync offline-first engine.
//!
//! This crate provides:
//! - `Task` and `TaskList` in their local (persisted) shape
//! - `QueueItem` and `NewOperation` for the durable operation queue
//! - `Timestamp` and the `Clock` trait for comparable epoch-millisecond time
//! - `RemoteTask` / `RemoteTaskList` in the backend's wire shape
//! - The schema translator between the two shapes
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod entity;
mod error;
mod queue;
pub mod translate;
mod wire;

pub use clock::{format_iso, parse_millis, Clock, ManualClock, SystemClock, Timestamp};
pub use entity::{
    new_id, DeleteState, Entity, EntityRef, EntityType, LayoutSettings, Quadrant, Record, Task,
    TaskList, ViewMode,
};
pub use error::{ModelError, ModelResult};
pub use queue::{NewOperation, Payload, QueueAction, QueueItem, QueuePatch, QueueStatus};
pub use wire::{RemoteFields, RemoteRecord, RemoteTask, RemoteTaskList};
