//! Durable operation queue items.

use crate::entity::{DeleteState, EntityRef, EntityType, Record};
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Partial entity fields in local naming.
pub type Payload = Map<String, Value>;

/// Lifecycle state of a queue item.
///
/// ```text
/// pending → processing → completed
///                      → pending (retryable, attempts left)
///                      → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Waiting to be pushed.
    Pending,
    /// Being pushed right now.
    Processing,
    /// Accepted by the backend.
    Completed,
    /// Gave up; needs a manual retry or discard.
    Failed,
}

impl QueueStatus {
    /// All states, in display order.
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Failed,
        QueueStatus::Completed,
    ];

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(ModelError::invalid_code("queue status", other)),
        }
    }
}

/// What the queued operation does remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    /// Create the entity.
    Add,
    /// Patch some fields.
    Update,
    /// Set the delete state.
    Delete,
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            QueueAction::Add => "add",
            QueueAction::Update => "update",
            QueueAction::Delete => "delete",
        })
    }
}

/// An operation about to be enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    /// Action.
    pub action: QueueAction,
    /// Target entity.
    pub entity: EntityRef,
    /// Fields relevant to the action.
    pub payload: Payload,
}

impl NewOperation {
    /// An `add` carrying the full entity.
    pub fn add<R: Record>(record: &R) -> ModelResult<Self> {
        Ok(Self {
            action: QueueAction::Add,
            entity: record.entity_ref(),
            payload: record.to_payload()?,
        })
    }

    /// An `update` carrying only the changed fields.
    pub fn update(entity: EntityRef, fields: Payload) -> Self {
        Self {
            action: QueueAction::Update,
            entity,
            payload: fields,
        }
    }

    /// A `delete` carrying the new delete state.
    pub fn delete(entity: EntityRef, state: DeleteState) -> Self {
        let mut payload = Payload::new();
        payload.insert("deleted".into(), Value::from(state.to_code()));
        Self {
            action: QueueAction::Delete,
            entity,
            payload,
        }
    }
}

/// A durable record of one local mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Monotonic id; creation order.
    pub id: u64,
    /// Lifecycle state.
    pub status: QueueStatus,
    /// Action.
    pub action: QueueAction,
    /// Target entity type.
    pub entity_type: EntityType,
    /// Target entity id.
    pub entity_id: String,
    /// Fields relevant to the action, in local naming.
    pub payload: Payload,
    /// Enqueue time (epoch ms).
    pub created_at: i64,
    /// Completion time (epoch ms).
    pub completed_at: Option<i64>,
    /// Number of retryable failures so far.
    pub retry_count: u32,
    /// Last failure message.
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Builds a pending item from an operation.
    pub fn from_operation(id: u64, operation: NewOperation, created_at: i64) -> Self {
        Self {
            id,
            status: QueueStatus::Pending,
            action: operation.action,
            entity_type: operation.entity.entity_type,
            entity_id: operation.entity.id,
            payload: operation.payload,
            created_at,
            completed_at: None,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Reference to the target entity.
    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id.clone())
    }

    /// Returns true if this item targets the given entity.
    pub fn targets(&self, entity_type: EntityType, id: &str) -> bool {
        self.entity_type == entity_type && self.entity_id == id
    }

    /// The task list a task item depends on, if its payload names one.
    pub fn referenced_list_id(&self) -> Option<&str> {
        if self.entity_type != EntityType::Task {
            return None;
        }
        self.payload.get("listId").and_then(Value::as_str)
    }

    /// For task-list updates and deletes touching `isActive`, the new value.
    ///
    /// Deleting the active list carries `isActive = 0`, so it counts as a
    /// deactivation.
    pub fn activation(&self) -> Option<bool> {
        if self.entity_type != EntityType::TaskList || self.action == QueueAction::Add {
            return None;
        }
        match self.payload.get("isActive")? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Owner named in the payload, if any.
    pub fn owner_hint(&self) -> Option<&str> {
        self.payload.get("ownerId").and_then(Value::as_str)
    }
}

/// Field changes for [`QueueItem`] applied in one read-modify-write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuePatch {
    /// New status.
    pub status: Option<QueueStatus>,
    /// Replacement payload.
    pub payload: Option<Payload>,
    /// New retry count.
    pub retry_count: Option<u32>,
    /// New last error (`Some(None)` clears it).
    pub last_error: Option<Option<String>>,
    /// New completion time (`Some(None)` clears it).
    pub completed_at: Option<Option<i64>>,
}

impl QueuePatch {
    /// Applies the patch to an item.
    pub fn apply(self, item: &mut QueueItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(payload) = self.payload {
            item.payload = payload;
        }
        if let Some(retry_count) = self.retry_count {
            item.retry_count = retry_count;
        }
        if let Some(last_error) = self.last_error {
            item.last_error = last_error;
        }
        if let Some(completed_at) = self.completed_at {
            item.completed_at = completed_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Quadrant, Task, TaskList};
    use serde_json::json;

    fn list_update(active: Value) -> QueueItem {
        let mut payload = Payload::new();
        payload.insert("isActive".into(), active);
        QueueItem::from_operation(
            1,
            NewOperation::update(EntityRef::new(EntityType::TaskList, "l1"), payload),
            0,
        )
    }

    #[test]
    fn add_carries_full_entity() {
        let task = Task::new("l1", "Write tests", Quadrant::UrgentImportant);
        let op = NewOperation::add(&task).unwrap();
        assert_eq!(op.action, QueueAction::Add);
        assert_eq!(op.entity.entity_type, EntityType::Task);
        assert_eq!(op.payload["text"], json!("Write tests"));

        let item = QueueItem::from_operation(7, op, 1_000);
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.referenced_list_id(), Some("l1"));
    }

    #[test]
    fn delete_payload_is_state_code() {
        let op = NewOperation::delete(EntityRef::new(EntityType::Task, "t1"), DeleteState::Tombstoned);
        assert_eq!(op.payload["deleted"], json!(2));
    }

    #[test]
    fn list_items_have_no_parent() {
        let list = TaskList::new("Work");
        let item = QueueItem::from_operation(1, NewOperation::add(&list).unwrap(), 0);
        assert_eq!(item.referenced_list_id(), None);
        // An add is not an activation toggle even if isActive is set.
        assert_eq!(item.activation(), None);
    }

    #[test]
    fn activation_reads_ints_and_bools() {
        assert_eq!(list_update(json!(0)).activation(), Some(false));
        assert_eq!(list_update(json!(1)).activation(), Some(true));
        assert_eq!(list_update(json!(true)).activation(), Some(true));
        assert_eq!(list_update(json!("yes")).activation(), None);
    }

    #[test]
    fn deleting_the_active_list_deactivates_it() {
        let entity = EntityRef::new(EntityType::TaskList, "l1");
        let mut op = NewOperation::delete(entity.clone(), DeleteState::Tombstoned);
        op.payload.insert("isActive".into(), json!(0));
        assert_eq!(QueueItem::from_operation(2, op, 0).activation(), Some(false));

        let plain = NewOperation::delete(entity, DeleteState::Tombstoned);
        assert_eq!(QueueItem::from_operation(3, plain, 0).activation(), None);

        let mut task_op =
            NewOperation::delete(EntityRef::new(EntityType::Task, "t1"), DeleteState::Tombstoned);
        task_op.payload.insert("isActive".into(), json!(0));
        assert_eq!(QueueItem::from_operation(4, task_op, 0).activation(), None);
    }

    #[test]
    fn patch_applies_selected_fields() {
        let mut item = list_update(json!(1));
        item.last_error = Some("boom".into());

        QueuePatch {
            status: Some(QueueStatus::Failed),
            retry_count: Some(2),
            last_error: Some(None),
            ..Default::default()
        }
        .apply(&mut item);

        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 2);
        assert_eq!(item.last_error, None);
        assert_eq!(item.activation(), Some(true));
    }

    #[test]
    fn status_names() {
        for status in QueueStatus::ALL {
            assert_eq!(status.as_str().parse::<QueueStatus>().unwrap(), status);
        }
        assert_eq!(serde_json::to_value(QueueStatus::Failed).unwrap(), json!("failed"));
    }
}
