//! Durable operation queue.
//!
//! Items live in the same snapshot as the entities they describe, so an
//! entity write and its queue item commit together.

use crate::error::{StoreError, StoreResult};
use crate::store::{LocalStore, StoreView, Transaction};
use tasksync_model::{EntityRef, NewOperation, QueueItem, QueuePatch, QueueStatus};

impl<'a> StoreView<'a> {
    /// Items in one state, oldest first.
    pub fn list_by_status(&self, status: QueueStatus) -> Vec<QueueItem> {
        self.state
            .queue
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect()
    }

    /// Gets a queue item by id.
    pub fn queue_item(&self, id: u64) -> Option<QueueItem> {
        self.state.queue.get(&id).cloned()
    }

    /// Every queue item, oldest first.
    pub fn queue_items(&self) -> Vec<QueueItem> {
        self.state.queue.values().cloned().collect()
    }

    /// Items targeting one entity, oldest first.
    pub fn items_for_entity(&self, entity: &EntityRef) -> Vec<QueueItem> {
        self.state
            .queue
            .values()
            .filter(|item| item.targets(entity.entity_type, &entity.id))
            .cloned()
            .collect()
    }

    /// Returns true if a pending or processing item targets the entity.
    pub fn has_open_items(&self, entity: &EntityRef) -> bool {
        self.state.queue.values().any(|item| {
            matches!(item.status, QueueStatus::Pending | QueueStatus::Processing)
                && item.targets(entity.entity_type, &entity.id)
        })
    }
}

impl<'a> Transaction<'a> {
    /// Appends a pending item and returns it.
    pub fn enqueue(&mut self, operation: NewOperation) -> StoreResult<QueueItem> {
        let id = self.state.next_queue_id;
        self.state.next_queue_id += 1;
        let item = QueueItem::from_operation(id, operation, self.clock.now_millis());
        tracing::debug!(
            id,
            action = %item.action,
            entity = %item.entity(),
            "enqueued"
        );
        self.state.queue.insert(id, item.clone());
        self.changed = true;
        Ok(item)
    }

    /// Appends several items in order.
    pub fn enqueue_batch(&mut self, operations: Vec<NewOperation>) -> StoreResult<Vec<QueueItem>> {
        operations.into_iter().map(|op| self.enqueue(op)).collect()
    }

    /// Moves an item to a new state.
    ///
    /// Completing stamps `completedAt`. An error message, if given, replaces
    /// `lastError`.
    pub fn set_status(
        &mut self,
        id: u64,
        status: QueueStatus,
        error: Option<String>,
    ) -> StoreResult<QueueItem> {
        let completed_at = match status {
            QueueStatus::Completed => Some(Some(self.clock.now_millis())),
            _ => None,
        };
        self.patch(
            id,
            QueuePatch {
                status: Some(status),
                last_error: error.map(Some),
                completed_at,
                ..Default::default()
            },
        )
    }

    /// Applies a partial update to an item.
    pub fn patch(&mut self, id: u64, patch: QueuePatch) -> StoreResult<QueueItem> {
        let item = self
            .state
            .queue
            .get_mut(&id)
            .ok_or(StoreError::QueueItemNotFound(id))?;
        patch.apply(item);
        self.changed = true;
        Ok(item.clone())
    }

    /// Removes an item.
    pub fn delete_item(&mut self, id: u64) -> StoreResult<QueueItem> {
        let item = self
            .state
            .queue
            .remove(&id)
            .ok_or(StoreError::QueueItemNotFound(id))?;
        self.changed = true;
        Ok(item)
    }

    /// Removes several items; unknown ids are skipped. Returns how many
    /// were removed.
    pub fn delete_batch(&mut self, ids: &[u64]) -> usize {
        let removed = ids
            .iter()
            .filter(|id| self.state.queue.remove(*id).is_some())
            .count();
        self.changed |= removed > 0;
        removed
    }

    /// Removes pending items targeting an entity. Returns their ids.
    pub fn delete_pending_for(&mut self, entity: &EntityRef) -> Vec<u64> {
        let ids: Vec<u64> = self
            .state
            .queue
            .values()
            .filter(|item| {
                item.status == QueueStatus::Pending && item.targets(entity.entity_type, &entity.id)
            })
            .map(|item| item.id)
            .collect();
        self.delete_batch(&ids);
        ids
    }

    /// Removes completed items finished before `before_ms`.
    pub fn prune_completed(&mut self, before_ms: i64) -> usize {
        let ids: Vec<u64> = self
            .state
            .queue
            .values()
            .filter(|item| {
                item.status == QueueStatus::Completed
                    && item.completed_at.unwrap_or(item.created_at) < before_ms
            })
            .map(|item| item.id)
            .collect();
        self.delete_batch(&ids)
    }
}

impl LocalStore {
    /// Enqueues one operation in its own transaction.
    pub fn enqueue(&self, operation: NewOperation) -> StoreResult<QueueItem> {
        self.transaction(|txn| txn.enqueue(operation))
    }

    /// Enqueues several operations atomically, in order.
    pub fn enqueue_batch(&self, operations: Vec<NewOperation>) -> StoreResult<Vec<QueueItem>> {
        self.transaction(|txn| txn.enqueue_batch(operations))
    }

    /// Moves an item to a new state.
    pub fn set_status(
        &self,
        id: u64,
        status: QueueStatus,
        error: Option<String>,
    ) -> StoreResult<QueueItem> {
        self.transaction(|txn| txn.set_status(id, status, error))
    }

    /// Applies a partial update to an item.
    pub fn patch_item(&self, id: u64, patch: QueuePatch) -> StoreResult<QueueItem> {
        self.transaction(|txn| txn.patch(id, patch))
    }

    /// Removes an item.
    pub fn delete_item(&self, id: u64) -> StoreResult<QueueItem> {
        self.transaction(|txn| txn.delete_item(id))
    }

    /// Removes several items atomically.
    pub fn delete_batch(&self, ids: &[u64]) -> StoreResult<usize> {
        self.transaction(|txn| Ok(txn.delete_batch(ids)))
    }

    /// Items in one state, oldest first.
    pub fn list_by_status(&self, status: QueueStatus) -> Vec<QueueItem> {
        self.read(|view| view.list_by_status(status))
    }

    /// Gets a queue item by id.
    pub fn queue_item(&self, id: u64) -> Option<QueueItem> {
        self.read(|view| view.queue_item(id))
    }

    /// Every queue item, oldest first.
    pub fn queue_items(&self) -> Vec<QueueItem> {
        self.read(|view| view.queue_items())
    }
}
