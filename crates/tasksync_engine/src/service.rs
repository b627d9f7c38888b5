//! The facade exposed to the UI and session layer.

use crate::config::SyncConfig;
use crate::coordinator::Coordinator;
use crate::error::{SyncError, SyncResult};
use crate::executor::{DrainReport, SyncExecutor};
use crate::merge::{MergeEngine, PullReport};
use crate::presence::ConfirmedLists;
use crate::remote::RemoteBackend;
use crate::session::{LifecycleEvent, SessionProvider};
use crate::status::{self, SyncStatus};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tasksync_model::{
    DeleteState, EntityType, NewOperation, Payload, Quadrant, QueueItem, Record, Task,
    TaskList, Timestamp,
};
use tasksync_store::{LocalStore, PurgeReport, Scope, StoreError, StoreResult, Transaction};

/// Fields callers may not set through the generic update calls.
const PROTECTED_FIELDS: &[&str] = &["id", "ownerId", "createdAt", "updatedAt", "deleted"];

/// Offline-first task sync.
///
/// Every mutation writes the local store first and, when a user is signed
/// in, queues exactly one operation per changed entity in the same
/// transaction. Signed-out mutations stay local and ownerless until the
/// next session start claims them.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tasksync_engine::{MemoryRemote, StaticSession, SyncConfig, TaskSync};
/// use tasksync_model::{Quadrant, SystemClock};
/// use tasksync_store::LocalStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Arc::new(LocalStore::in_memory(Arc::new(SystemClock)));
/// let sync = TaskSync::new(
///     store,
///     Arc::new(MemoryRemote::new()),
///     Arc::new(StaticSession::signed_in("user-1")),
///     SyncConfig::default(),
/// );
///
/// let list = sync.add_task_list("Work").await.unwrap();
/// sync.add_task(&list.id, "Review PR", Quadrant::UrgentImportant).await.unwrap();
/// assert!(sync.get_sync_status().is_idle());
/// # }
/// ```
pub struct TaskSync {
    store: Arc<LocalStore>,
    coordinator: Arc<Coordinator>,
    session: Arc<dyn SessionProvider>,
    config: SyncConfig,
}

impl TaskSync {
    /// Wires the executor, merge engine and coordinator over one store and
    /// one remote.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteBackend>,
        session: Arc<dyn SessionProvider>,
        config: SyncConfig,
    ) -> Self {
        let confirmed = ConfirmedLists::new();
        let executor = Arc::new(SyncExecutor::new(
            Arc::clone(&store),
            Arc::clone(&remote),
            config.clone(),
            confirmed.clone(),
        ));
        let merge = Arc::new(MergeEngine::new(
            Arc::clone(&store),
            remote,
            config.clone(),
            confirmed,
        ));
        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&store),
            executor,
            merge,
            Arc::clone(&session),
            config.clone(),
        ));
        Self {
            store,
            coordinator,
            session,
            config,
        }
    }

    /// Starts the lifecycle loop. Idempotent: later calls return `Ok(false)`.
    ///
    /// If a user is already signed in, a session start is queued.
    pub fn initialize(&self) -> SyncResult<bool> {
        let started = self.coordinator.start()?;
        if started {
            if let Some(user) = self.session.current_user() {
                self.coordinator
                    .notify(LifecycleEvent::SessionStarted(user));
            }
        }
        Ok(started)
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The lifecycle coordinator.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Delivers a lifecycle event to the loop.
    pub fn notify(&self, event: LifecycleEvent) {
        self.coordinator.notify(event);
    }

    // Reads

    /// Non-tombstoned tasks of a list visible to the current user.
    pub fn get_tasks(&self, list_id: &str) -> Vec<Task> {
        let user = self.session.current_user();
        self.store
            .tasks_in_list(list_id)
            .into_iter()
            .filter(|t| t.owner_id.is_none() || t.owner_id == user)
            .collect()
    }

    /// Non-tombstoned lists visible to the current user.
    pub fn get_task_lists(&self) -> Vec<TaskList> {
        self.store
            .task_lists(&Scope::VisibleTo(self.session.current_user()))
    }

    /// The current user's active list.
    pub fn active_task_list(&self) -> Option<TaskList> {
        self.store
            .active_task_list(self.session.current_user().as_deref())
    }

    /// Queue items grouped by status.
    pub fn get_sync_status(&self) -> SyncStatus {
        SyncStatus::collect(&self.store)
    }

    // Task mutations

    /// Adds a task at the end of its (list, quadrant) bucket.
    pub async fn add_task(
        &self,
        list_id: &str,
        text: impl Into<String>,
        quadrant: Quadrant,
    ) -> SyncResult<Task> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SyncError::InvalidOperation("task text is empty".into()));
        }

        self.commit(|txn, owner| {
            let list = live_task_list(txn, list_id)?;
            let mut task = Task::new(&list.id, text, quadrant);
            task.order = txn.view().next_order(&list.id, quadrant);
            task.owner_id = owner.map(str::to_string);

            let task = txn.insert_task(task)?;
            let operation = NewOperation::add(&task)?;
            Ok((task, vec![operation]))
        })
        .await
    }

    /// Merges fields into a task.
    ///
    /// Delete state goes through [`TaskSync::delete_task`]; identity,
    /// ownership and timestamps cannot be set.
    pub async fn update_task(&self, id: &str, fields: Payload) -> SyncResult<Task> {
        reject_protected(&fields, &[])?;

        self.commit(|txn, _| {
            live_task(txn, id)?;
            if let Some(list_id) = fields.get("listId").and_then(Value::as_str) {
                live_task_list(txn, list_id)?;
            }
            let updated = txn.update_task(id, &fields)?;
            let operation = update_operation(&updated, fields);
            Ok((updated, vec![operation]))
        })
        .await
    }

    /// Soft-deletes a task, or tombstones it when `permanent`.
    pub async fn delete_task(&self, id: &str, permanent: bool) -> SyncResult<()> {
        let state = delete_state(permanent);
        self.commit(|txn, _| {
            live_task(txn, id)?;
            let updated = txn.update_task(id, &delete_fields(state))?;
            Ok(((), vec![delete_operation(&updated, state)]))
        })
        .await
    }

    /// Re-sequences a bucket to the given order (0..n).
    ///
    /// Only tasks whose position changed are written and queued; their
    /// updates are queued together.
    pub async fn reorder_tasks(
        &self,
        list_id: &str,
        quadrant: Quadrant,
        ordered_ids: &[String],
    ) -> SyncResult<Vec<Task>> {
        let unique: HashSet<&String> = ordered_ids.iter().collect();
        if unique.len() != ordered_ids.len() {
            return Err(SyncError::InvalidOperation("duplicate task id in reorder".into()));
        }

        self.commit(|txn, _| {
            live_task_list(txn, list_id)?;
            let mut tasks = Vec::with_capacity(ordered_ids.len());
            let mut operations = Vec::new();

            for (position, id) in ordered_ids.iter().enumerate() {
                let task = live_task(txn, id)?;
                if task.list_id != list_id || task.quadrant != quadrant {
                    return Err(StoreError::InvalidOperation(format!(
                        "task {id} is not in the reordered bucket"
                    )));
                }
                let order = position as i64;
                if task.order == order {
                    tasks.push(task);
                    continue;
                }
                let mut fields = Payload::new();
                fields.insert("order".into(), Value::from(order));
                let updated = txn.update_task(id, &fields)?;
                operations.push(update_operation(&updated, fields));
                tasks.push(updated);
            }
            Ok((tasks, operations))
        })
        .await
    }

    /// Moves a task to the end of another (list, quadrant) bucket.
    pub async fn move_task(&self, id: &str, list_id: &str, quadrant: Quadrant) -> SyncResult<Task> {
        self.commit(|txn, _| {
            let task = live_task(txn, id)?;
            live_task_list(txn, list_id)?;
            if task.list_id == list_id && task.quadrant == quadrant {
                return Ok((task, Vec::new()));
            }

            let mut fields = Payload::new();
            fields.insert("listId".into(), Value::from(list_id));
            fields.insert("quadrant".into(), Value::from(quadrant.as_str()));
            fields.insert(
                "order".into(),
                Value::from(txn.view().next_order(list_id, quadrant)),
            );
            let updated = txn.update_task(id, &fields)?;
            let operation = update_operation(&updated, fields);
            Ok((updated, vec![operation]))
        })
        .await
    }

    // Task list mutations

    /// Creates a list and makes it the active one.
    ///
    /// The previous active list is deactivated first; both operations are
    /// queued in that order.
    pub async fn add_task_list(&self, name: impl Into<String>) -> SyncResult<TaskList> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SyncError::InvalidOperation("task list name is empty".into()));
        }

        self.commit(|txn, owner| {
            let mut operations = deactivate_others(txn, owner, None)?;

            let mut list = TaskList::new(name);
            list.is_active = true;
            list.owner_id = owner.map(str::to_string);
            let list = txn.insert_task_list(list)?;
            operations.push(NewOperation::add(&list)?);
            Ok((list, operations))
        })
        .await
    }

    /// Merges fields into a list. Activation goes through
    /// [`TaskSync::set_active_task_list`].
    pub async fn update_task_list(&self, id: &str, fields: Payload) -> SyncResult<TaskList> {
        reject_protected(&fields, &["isActive"])?;

        self.commit(|txn, _| {
            live_task_list(txn, id)?;
            let updated = txn.update_task_list(id, &fields)?;
            let operation = update_operation(&updated, fields);
            Ok((updated, vec![operation]))
        })
        .await
    }

    /// Makes a list the active one, deactivating the previous one first.
    pub async fn set_active_task_list(&self, id: &str) -> SyncResult<TaskList> {
        self.commit(|txn, owner| {
            let target = live_task_list(txn, id)?;
            if target.is_active {
                return Ok((target, Vec::new()));
            }

            let mut operations = deactivate_others(txn, owner, Some(id))?;
            let fields = activation_fields(true);
            let activated = txn.update_task_list(id, &fields)?;
            operations.push(update_operation(&activated, fields));
            Ok((activated, operations))
        })
        .await
    }

    /// Deletes a list and cascades the same delete state to its tasks.
    ///
    /// Each affected entity gets its own queue item, list first.
    pub async fn delete_task_list(&self, id: &str, permanent: bool) -> SyncResult<()> {
        let state = delete_state(permanent);
        self.commit(|txn, _| {
            let list = live_task_list(txn, id)?;

            let mut fields = delete_fields(state);
            if list.is_active {
                fields.insert("isActive".into(), Value::from(0));
            }
            let updated = txn.update_task_list(id, &fields)?;
            let mut operation = delete_operation(&updated, state);
            if list.is_active {
                operation.payload.insert("isActive".into(), Value::from(0));
            }
            let mut operations = vec![operation];

            let tasks = txn.view().tasks(&Scope::List(id.to_string()));
            for task in tasks {
                if task.deleted.to_code() >= state.to_code() {
                    continue;
                }
                let updated = txn.update_task(&task.id, &delete_fields(state))?;
                operations.push(delete_operation(&updated, state));
            }
            Ok(((), operations))
        })
        .await
    }

    // Queue recovery

    /// Moves a failed item back to pending and triggers a drain.
    pub async fn retry_failed_item(&self, id: u64) -> SyncResult<QueueItem> {
        let item = status::retry_failed(&self.store, id)?;
        if self.session.current_user().is_some() {
            self.after_mutation().await;
        }
        Ok(item)
    }

    /// Discards a queue item.
    pub fn delete_queue_item(&self, id: u64) -> SyncResult<QueueItem> {
        status::discard(&self.store, id)
    }

    // Sync

    /// Runs one drain pass now.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        self.coordinator.drain().await
    }

    /// Pulls remote changes now.
    pub async fn pull(&self) -> SyncResult<PullReport> {
        self.coordinator.pull().await
    }

    /// Physically removes tombstones older than `older_than`.
    pub fn purge_tombstones(&self, older_than: Duration) -> SyncResult<PurgeReport> {
        let age_ms = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);
        let cutoff = self.store.clock().now_millis().saturating_sub(age_ms);
        Ok(self.store.purge_tombstones(cutoff)?)
    }

    /// Runs a mutation and queues its operations in one transaction, then
    /// triggers a drain.
    ///
    /// The closure receives the signed-in user. Its operations are dropped
    /// when nobody is signed in.
    async fn commit<T, F>(&self, mutate: F) -> SyncResult<T>
    where
        F: FnOnce(&mut Transaction<'_>, Option<&str>) -> StoreResult<(T, Vec<NewOperation>)>,
    {
        let owner = self.session.current_user();
        let value = self.store.transaction(|txn| {
            let (value, operations) = mutate(txn, owner.as_deref())?;
            if owner.is_some() && !operations.is_empty() {
                txn.enqueue_batch(operations)?;
            }
            Ok(value)
        })?;

        if owner.is_some() {
            self.after_mutation().await;
        }
        Ok(value)
    }

    async fn after_mutation(&self) {
        if !self.config.drain_on_mutation {
            return;
        }
        if let Err(err) = self.coordinator.drain().await {
            tracing::warn!(error = %err, "drain after mutation failed");
        }
    }
}

fn live_task(txn: &Transaction<'_>, id: &str) -> StoreResult<Task> {
    txn.get_task(id)
        .filter(|t| !t.deleted.is_tombstoned())
        .ok_or_else(|| StoreError::not_found(EntityType::Task, id))
}

fn live_task_list(txn: &Transaction<'_>, id: &str) -> StoreResult<TaskList> {
    txn.get_task_list(id)
        .filter(|l| !l.deleted.is_tombstoned())
        .ok_or_else(|| StoreError::not_found(EntityType::TaskList, id))
}

/// Deactivates every active list in the owner's scope except `keep`.
fn deactivate_others(
    txn: &mut Transaction<'_>,
    owner: Option<&str>,
    keep: Option<&str>,
) -> StoreResult<Vec<NewOperation>> {
    let scope = match owner {
        Some(owner) => Scope::Owner(owner.to_string()),
        None => Scope::Unowned,
    };
    let active = txn.view().active_task_lists(&scope);

    let mut operations = Vec::new();
    for list in active.iter().filter(|l| Some(l.id.as_str()) != keep) {
        let fields = activation_fields(false);
        let updated = txn.update_task_list(&list.id, &fields)?;
        operations.push(update_operation(&updated, fields));
    }
    Ok(operations)
}

fn reject_protected(fields: &Payload, extra: &[&str]) -> SyncResult<()> {
    match fields
        .keys()
        .find(|key| PROTECTED_FIELDS.contains(&key.as_str()) || extra.contains(&key.as_str()))
    {
        Some(key) => Err(SyncError::InvalidOperation(format!(
            "field {key} cannot be updated directly"
        ))),
        None => Ok(()),
    }
}

fn delete_state(permanent: bool) -> DeleteState {
    if permanent {
        DeleteState::Tombstoned
    } else {
        DeleteState::SoftDeleted
    }
}

fn delete_fields(state: DeleteState) -> Payload {
    let mut fields = Payload::new();
    fields.insert("deleted".into(), Value::from(state.to_code()));
    fields
}

fn activation_fields(active: bool) -> Payload {
    let mut fields = Payload::new();
    fields.insert("isActive".into(), Value::from(u8::from(active)));
    fields
}

fn timestamp_value(timestamp: &Timestamp) -> Value {
    match timestamp {
        Timestamp::Millis(ms) => Value::from(*ms),
        Timestamp::Text(text) => Value::from(text.as_str()),
    }
}

/// An update carrying the changed fields plus the new `updatedAt`.
fn update_operation<R: Record>(record: &R, mut fields: Payload) -> NewOperation {
    fields.insert("updatedAt".into(), timestamp_value(record.updated_at()));
    NewOperation::update(record.entity_ref(), fields)
}

fn delete_operation<R: Record>(record: &R, state: DeleteState) -> NewOperation {
    let mut operation = NewOperation::delete(record.entity_ref(), state);
    operation
        .payload
        .insert("updatedAt".into(), timestamp_value(record.updated_at()));
    operation
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protected_fields_are_rejected() {
        let fields = json!({ "text": "x", "ownerId": "u2" });
        let fields = fields.as_object().unwrap();
        assert!(reject_protected(fields, &[]).is_err());

        let fields = json!({ "name": "x", "isActive": 1 });
        assert!(reject_protected(fields.as_object().unwrap(), &["isActive"]).is_err());
        assert!(reject_protected(fields.as_object().unwrap(), &[]).is_ok());
    }

    #[test]
    fn operations_carry_new_timestamp() {
        let mut task = Task::new("l1", "x", Quadrant::UrgentImportant);
        task.updated_at = Timestamp::Millis(42);

        let op = update_operation(&task, Payload::new());
        assert_eq!(op.payload["updatedAt"], json!(42));

        let op = delete_operation(&task, DeleteState::SoftDeleted);
        assert_eq!(op.payload["deleted"], json!(1));
        assert_eq!(op.payload["updatedAt"], json!(42));
    }
}
