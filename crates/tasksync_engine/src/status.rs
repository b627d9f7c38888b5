//! Operator view of the queue and manual recovery actions.

use crate::error::SyncResult;
use serde::Serialize;
use tasksync_model::{QueueItem, QueuePatch, QueueStatus};
use tasksync_store::{LocalStore, StoreError};

/// Queue items grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    /// Waiting to be pushed.
    pub pending: Vec<QueueItem>,
    /// Being pushed.
    pub processing: Vec<QueueItem>,
    /// Gave up; need a retry or discard.
    pub failed: Vec<QueueItem>,
    /// Accepted by the backend and not yet pruned.
    pub completed: Vec<QueueItem>,
}

impl SyncStatus {
    /// Reads the queue in one consistent snapshot.
    pub fn collect(store: &LocalStore) -> Self {
        store.read(|view| Self {
            pending: view.list_by_status(QueueStatus::Pending),
            processing: view.list_by_status(QueueStatus::Processing),
            failed: view.list_by_status(QueueStatus::Failed),
            completed: view.list_by_status(QueueStatus::Completed),
        })
    }

    /// Items in one state.
    pub fn items(&self, status: QueueStatus) -> &[QueueItem] {
        match status {
            QueueStatus::Pending => &self.pending,
            QueueStatus::Processing => &self.processing,
            QueueStatus::Failed => &self.failed,
            QueueStatus::Completed => &self.completed,
        }
    }

    /// Returns true if nothing is waiting or in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.processing.is_empty()
    }

    /// Total number of items.
    pub fn total(&self) -> usize {
        self.pending.len() + self.processing.len() + self.failed.len() + self.completed.len()
    }
}

/// Moves a failed item back to pending with a fresh retry budget.
///
/// # Errors
///
/// `QueueItemNotFound` for an unknown id, `InvalidOperation` if the item
/// is not failed.
pub fn retry_failed(store: &LocalStore, id: u64) -> SyncResult<QueueItem> {
    let item = store.transaction(|txn| {
        let item = txn
            .view()
            .queue_item(id)
            .ok_or(StoreError::QueueItemNotFound(id))?;
        if item.status != QueueStatus::Failed {
            return Err(StoreError::InvalidOperation(format!(
                "queue item {id} is {}, not failed",
                item.status
            )));
        }
        txn.patch(
            id,
            QueuePatch {
                status: Some(QueueStatus::Pending),
                retry_count: Some(0),
                last_error: Some(None),
                completed_at: Some(None),
                ..Default::default()
            },
        )
    })?;
    tracing::info!(item_id = id, "failed item requeued");
    Ok(item)
}

/// Deletes a queue item regardless of its state.
pub fn discard(store: &LocalStore, id: u64) -> SyncResult<QueueItem> {
    let item = store.delete_item(id)?;
    tracing::info!(item_id = id, status = %item.status, "queue item discarded");
    Ok(item)
}
