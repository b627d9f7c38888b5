//! Remote backend abstraction.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tasksync_model::{EntityType, RemoteFields, RemoteRecord, RemoteTask, RemoteTaskList};

/// The shared backend the engine converges with.
///
/// Every call is scoped to an owner; the backend only exposes that owner's
/// rows. Payloads are already in the backend's naming (see
/// [`tasksync_model::translate`]).
///
/// The backend enforces two constraints the local store does not: a task
/// may only reference a list that exists remotely, and each owner has at
/// most one active list.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Creates (or idempotently re-creates) a record.
    async fn insert(&self, owner: &str, record: RemoteRecord) -> RemoteResult<()>;

    /// Patches fields of an existing record.
    async fn update(
        &self,
        owner: &str,
        entity_type: EntityType,
        id: &str,
        fields: RemoteFields,
    ) -> RemoteResult<()>;

    /// Applies a delete-state change (soft delete or tombstone).
    async fn delete(
        &self,
        owner: &str,
        entity_type: EntityType,
        id: &str,
        fields: RemoteFields,
    ) -> RemoteResult<()>;

    /// Returns true if the owner has a record with this id.
    async fn exists(&self, owner: &str, entity_type: EntityType, id: &str) -> RemoteResult<bool>;

    /// Task lists updated after `since` (epoch ms), or all when `None`.
    async fn fetch_task_lists_since(
        &self,
        owner: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<RemoteTaskList>>;

    /// Tasks updated after `since` (epoch ms), or all when `None`.
    async fn fetch_tasks_since(&self, owner: &str, since: Option<i64>)
        -> RemoteResult<Vec<RemoteTask>>;
}

/// Runs a remote call under an optional deadline; an elapsed deadline is a
/// network error.
pub(crate) async fn with_deadline<T, F>(deadline: Option<Duration>, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::timeout(limit)),
        },
        None => call.await,
    }
}
