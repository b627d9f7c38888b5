//! The local store: tasks, task lists, queue and watermarks.

use crate::backend::StorageBackend;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use crate::snapshot::StoreState;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tasksync_model::{
    Clock, DeleteState, Entity, EntityType, Payload, Quadrant, QueueStatus, Record, Task,
    TaskList,
};

/// Which entities a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Everything.
    All,
    /// Entities owned by exactly this owner.
    Owner(String),
    /// Entities not yet claimed.
    Unowned,
    /// Entities owned by this owner or not yet claimed.
    VisibleTo(Option<String>),
    /// Tasks in this list (or the list itself).
    List(String),
}

impl Scope {
    fn matches_task(&self, task: &Task) -> bool {
        match self {
            Scope::List(list_id) => task.list_id == *list_id,
            other => other.matches_owner(task.owner_id()),
        }
    }

    fn matches_list(&self, list: &TaskList) -> bool {
        match self {
            Scope::List(list_id) => list.id == *list_id,
            other => other.matches_owner(list.owner_id()),
        }
    }

    fn matches_owner(&self, owner: Option<&str>) -> bool {
        match self {
            Scope::All | Scope::List(_) => true,
            Scope::Owner(expected) => owner == Some(expected.as_str()),
            Scope::Unowned => owner.is_none(),
            Scope::VisibleTo(user) => owner.is_none() || owner == user.as_deref(),
        }
    }
}

/// Entities removed by a tombstone purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Purged task ids.
    pub tasks: Vec<String>,
    /// Purged task-list ids.
    pub task_lists: Vec<String>,
}

impl PurgeReport {
    /// Total number of purged entities.
    pub fn total(&self) -> usize {
        self.tasks.len() + self.task_lists.len()
    }
}

/// Maps a record type to its collection in the state.
pub(crate) trait Stored: Record {
    fn collection(state: &StoreState) -> &BTreeMap<String, Self>;
    fn collection_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self>;
}

impl Stored for Task {
    fn collection(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.tasks
    }

    fn collection_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.tasks
    }
}

impl Stored for TaskList {
    fn collection(state: &StoreState) -> &BTreeMap<String, Self> {
        &state.task_lists
    }

    fn collection_mut(state: &mut StoreState) -> &mut BTreeMap<String, Self> {
        &mut state.task_lists
    }
}

/// Read-only view over committed (or in-transaction) state.
#[derive(Clone, Copy)]
pub struct StoreView<'a> {
    pub(crate) state: &'a StoreState,
}

impl<'a> StoreView<'a> {
    /// Gets any entity by type and id.
    pub fn get(&self, entity_type: EntityType, id: &str) -> Option<Entity> {
        match entity_type {
            EntityType::Task => self.get_task(id).map(Entity::Task),
            EntityType::TaskList => self.get_task_list(id).map(Entity::TaskList),
        }
    }

    /// Gets a task, including tombstoned ones.
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.state.tasks.get(id).cloned()
    }

    /// Gets a task list, including tombstoned ones.
    pub fn get_task_list(&self, id: &str) -> Option<TaskList> {
        self.state.task_lists.get(id).cloned()
    }

    /// Non-tombstoned entities of one type within a scope.
    pub fn list_active(&self, entity_type: EntityType, scope: &Scope) -> Vec<Entity> {
        match entity_type {
            EntityType::Task => self.tasks(scope).into_iter().map(Entity::Task).collect(),
            EntityType::TaskList => self
                .task_lists(scope)
                .into_iter()
                .map(Entity::TaskList)
                .collect(),
        }
    }

    /// Non-tombstoned tasks in scope, by quadrant then sort order.
    pub fn tasks(&self, scope: &Scope) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .state
            .tasks
            .values()
            .filter(|t| !t.deleted.is_tombstoned() && scope.matches_task(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            (a.quadrant, a.order, a.created_at.millis_or_zero(), &a.id).cmp(&(
                b.quadrant,
                b.order,
                b.created_at.millis_or_zero(),
                &b.id,
            ))
        });
        tasks
    }

    /// Non-tombstoned task lists in scope, oldest first.
    pub fn task_lists(&self, scope: &Scope) -> Vec<TaskList> {
        let mut lists: Vec<TaskList> = self
            .state
            .task_lists
            .values()
            .filter(|l| !l.deleted.is_tombstoned() && scope.matches_list(l))
            .cloned()
            .collect();
        lists.sort_by(|a, b| {
            (a.created_at.millis_or_zero(), &a.id).cmp(&(b.created_at.millis_or_zero(), &b.id))
        });
        lists
    }

    /// Non-tombstoned lists in scope flagged active.
    pub fn active_task_lists(&self, scope: &Scope) -> Vec<TaskList> {
        self.task_lists(scope)
            .into_iter()
            .filter(|l| l.is_active)
            .collect()
    }

    /// The active list of an owner (or of unclaimed data for `None`).
    pub fn active_task_list(&self, owner: Option<&str>) -> Option<TaskList> {
        let scope = match owner {
            Some(owner) => Scope::Owner(owner.to_string()),
            None => Scope::Unowned,
        };
        self.active_task_lists(&scope).into_iter().next()
    }

    /// Next free sort position in (list, quadrant).
    pub fn next_order(&self, list_id: &str, quadrant: Quadrant) -> i64 {
        self.state
            .tasks
            .values()
            .filter(|t| t.list_id == list_id && t.quadrant == quadrant && !t.deleted.is_tombstoned())
            .map(|t| t.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Entities not yet claimed by any owner, excluding tombstones.
    pub fn ownerless(&self) -> (Vec<TaskList>, Vec<Task>) {
        (self.task_lists(&Scope::Unowned), self.tasks(&Scope::Unowned))
    }

    /// Last successful pull for an owner.
    pub fn watermark(&self, owner: &str) -> Option<i64> {
        self.state.watermarks.get(owner).copied()
    }

    /// Tombstoned entities last touched before `cutoff_ms` that no open
    /// queue item references.
    pub fn purgeable_tombstones(&self, cutoff_ms: i64) -> PurgeReport {
        let referenced = |entity_type: EntityType, id: &str| {
            self.state
                .queue
                .values()
                .any(|item| item.status != QueueStatus::Completed && item.targets(entity_type, id))
        };

        let tasks = self
            .state
            .tasks
            .values()
            .filter(|t| t.deleted == DeleteState::Tombstoned)
            .filter(|t| t.updated_at.millis_or_zero() < cutoff_ms)
            .filter(|t| !referenced(EntityType::Task, &t.id))
            .map(|t| t.id.clone())
            .collect();

        let task_lists = self
            .state
            .task_lists
            .values()
            .filter(|l| l.deleted == DeleteState::Tombstoned)
            .filter(|l| l.updated_at.millis_or_zero() < cutoff_ms)
            .filter(|l| !referenced(EntityType::TaskList, &l.id))
            .map(|l| l.id.clone())
            .collect();

        PurgeReport { tasks, task_lists }
    }

    /// Number of stored tasks and lists, including tombstones.
    pub fn entity_count(&self) -> usize {
        self.state.tasks.len() + self.state.task_lists.len()
    }
}

/// A mutation scope over a working copy of the store.
///
/// Changes become visible, and are persisted, only when the closure passed
/// to [`LocalStore::transaction`] returns `Ok`.
pub struct Transaction<'a> {
    pub(crate) state: StoreState,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) changed: bool,
}

impl<'a> Transaction<'a> {
    /// Read access to the working copy.
    pub fn view(&self) -> StoreView<'_> {
        StoreView { state: &self.state }
    }

    /// Gets a task from the working copy.
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.view().get_task(id)
    }

    /// Gets a task list from the working copy.
    pub fn get_task_list(&self, id: &str) -> Option<TaskList> {
        self.view().get_task_list(id)
    }

    /// Current time from the store's clock.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Inserts a new task, stamping both timestamps.
    pub fn insert_task(&mut self, task: Task) -> StoreResult<Task> {
        self.insert_record(task)
    }

    /// Inserts a new task list, stamping both timestamps.
    pub fn insert_task_list(&mut self, list: TaskList) -> StoreResult<TaskList> {
        self.insert_record(list)
    }

    /// Inserts any new entity, stamping both timestamps.
    pub fn insert(&mut self, entity: Entity) -> StoreResult<Entity> {
        Ok(match entity {
            Entity::Task(task) => Entity::Task(self.insert_task(task)?),
            Entity::TaskList(list) => Entity::TaskList(self.insert_task_list(list)?),
        })
    }

    /// Writes a remote task verbatim (timestamps untouched).
    pub fn import_task(&mut self, task: Task) -> Option<Task> {
        self.import_record(task)
    }

    /// Writes a remote task list verbatim (timestamps untouched).
    pub fn import_task_list(&mut self, list: TaskList) -> Option<TaskList> {
        self.import_record(list)
    }

    /// Merges fields into a task and stamps `updatedAt`.
    pub fn update_task(&mut self, id: &str, fields: &Payload) -> StoreResult<Task> {
        self.update_record(id, fields)
    }

    /// Merges fields into a task list and stamps `updatedAt`.
    pub fn update_task_list(&mut self, id: &str, fields: &Payload) -> StoreResult<TaskList> {
        self.update_record(id, fields)
    }

    /// Merges fields into any entity and stamps `updatedAt`.
    pub fn update(
        &mut self,
        entity_type: EntityType,
        id: &str,
        fields: &Payload,
    ) -> StoreResult<Entity> {
        Ok(match entity_type {
            EntityType::Task => Entity::Task(self.update_task(id, fields)?),
            EntityType::TaskList => Entity::TaskList(self.update_task_list(id, fields)?),
        })
    }

    /// Physically removes an entity. Returns false if it was absent.
    pub fn purge(&mut self, entity_type: EntityType, id: &str) -> bool {
        let removed = match entity_type {
            EntityType::Task => self.state.tasks.remove(id).is_some(),
            EntityType::TaskList => self.state.task_lists.remove(id).is_some(),
        };
        self.changed |= removed;
        removed
    }

    /// Removes purgeable tombstones (see [`StoreView::purgeable_tombstones`]).
    pub fn purge_tombstones(&mut self, cutoff_ms: i64) -> PurgeReport {
        let report = self.view().purgeable_tombstones(cutoff_ms);
        for id in &report.tasks {
            self.purge(EntityType::Task, id);
        }
        for id in &report.task_lists {
            self.purge(EntityType::TaskList, id);
        }
        report
    }

    /// Records the last successful pull for an owner.
    pub fn set_watermark(&mut self, owner: &str, millis: i64) {
        self.state.watermarks.insert(owner.to_string(), millis);
        self.changed = true;
    }

    fn insert_record<R: Stored>(&mut self, mut record: R) -> StoreResult<R> {
        if R::collection(&self.state).contains_key(record.id()) {
            return Err(StoreError::DuplicateId {
                entity_type: R::ENTITY_TYPE,
                id: record.id().to_string(),
            });
        }
        let now = self.clock.now();
        record.set_timestamps(now.clone(), now);
        R::collection_mut(&mut self.state).insert(record.id().to_string(), record.clone());
        self.changed = true;
        Ok(record)
    }

    fn import_record<R: Stored>(&mut self, record: R) -> Option<R> {
        self.changed = true;
        R::collection_mut(&mut self.state).insert(record.id().to_string(), record)
    }

    fn update_record<R: Stored>(&mut self, id: &str, fields: &Payload) -> StoreResult<R> {
        let current = R::collection(&self.state)
            .get(id)
            .ok_or_else(|| StoreError::not_found(R::ENTITY_TYPE, id))?;
        let mut updated = current.merged(fields)?;
        // Timestamps always come from the clock on local writes.
        updated.set_timestamps(current.created_at().clone(), self.clock.now());
        R::collection_mut(&mut self.state).insert(id.to_string(), updated.clone());
        self.changed = true;
        Ok(updated)
    }
}

/// The on-device store.
///
/// All writes go through [`LocalStore::transaction`]; writers are
/// serialized, and every commit persists a full snapshot through the
/// backend before it becomes visible to readers.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tasksync_model::{NewOperation, SystemClock, TaskList};
/// use tasksync_store::LocalStore;
///
/// let store = LocalStore::in_memory(Arc::new(SystemClock));
/// let list = store
///     .transaction(|txn| {
///         let list = txn.insert_task_list(TaskList::new("Work"))?;
///         txn.enqueue(NewOperation::add(&list)?)?;
///         Ok(list)
///     })
///     .unwrap();
/// assert_eq!(store.get_task_list(&list.id).unwrap().name, "Work");
/// ```
pub struct LocalStore {
    state: RwLock<StoreState>,
    backend: Mutex<Box<dyn StorageBackend>>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// Opens a store over an existing backend, loading its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded.
    pub fn open(backend: Box<dyn StorageBackend>, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let state = match backend.load()? {
            Some(bytes) => StoreState::decode(&bytes)?,
            None => StoreState::default(),
        };

        tracing::debug!(
            backend = %backend.describe(),
            tasks = state.tasks.len(),
            task_lists = state.task_lists.len(),
            queue = state.queue.len(),
            "store opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            backend: Mutex::new(backend),
            clock,
        })
    }

    /// Opens (or creates) a file-backed store directory.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process has the directory open.
    pub fn open_path(path: &Path, config: &StoreConfig, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let backend = FileBackend::open_with_config(path, config)?;
        Self::open(Box::new(backend), clock)
    }

    /// Creates an empty, non-persistent store.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            backend: Mutex::new(Box::new(InMemoryBackend::new())),
            clock,
        }
    }

    /// The store's clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Executes a function within a transaction.
    ///
    /// If the function returns `Ok` and changed anything, the new state is
    /// persisted and then published. If it returns `Err`, or persisting
    /// fails, nothing is changed and the error is returned.
    pub fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    {
        let mut backend = self.backend.lock();
        let working = self.state.read().clone();
        let mut txn = Transaction {
            state: working,
            clock: self.clock.as_ref(),
            changed: false,
        };

        let value = f(&mut txn)?;

        if txn.changed {
            let bytes = txn.state.encode()?;
            backend.store(&bytes)?;
            tracing::trace!(bytes = bytes.len(), "snapshot persisted");
            *self.state.write() = txn.state;
        }

        Ok(value)
    }

    /// Runs a read-only function against committed state.
    pub fn read<T>(&self, f: impl FnOnce(StoreView<'_>) -> T) -> T {
        let state = self.state.read();
        f(StoreView { state: &state })
    }

    /// Gets any entity by type and id.
    pub fn get(&self, entity_type: EntityType, id: &str) -> Option<Entity> {
        self.read(|view| view.get(entity_type, id))
    }

    /// Gets a task.
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.read(|view| view.get_task(id))
    }

    /// Gets a task list.
    pub fn get_task_list(&self, id: &str) -> Option<TaskList> {
        self.read(|view| view.get_task_list(id))
    }

    /// Non-tombstoned entities of one type within a scope.
    pub fn list_active(&self, entity_type: EntityType, scope: &Scope) -> Vec<Entity> {
        self.read(|view| view.list_active(entity_type, scope))
    }

    /// Non-tombstoned tasks in scope.
    pub fn tasks(&self, scope: &Scope) -> Vec<Task> {
        self.read(|view| view.tasks(scope))
    }

    /// Non-tombstoned task lists in scope.
    pub fn task_lists(&self, scope: &Scope) -> Vec<TaskList> {
        self.read(|view| view.task_lists(scope))
    }

    /// Non-tombstoned tasks in one list.
    pub fn tasks_in_list(&self, list_id: &str) -> Vec<Task> {
        self.tasks(&Scope::List(list_id.to_string()))
    }

    /// Non-tombstoned task lists of one owner.
    pub fn task_lists_for_owner(&self, owner: &str) -> Vec<TaskList> {
        self.task_lists(&Scope::Owner(owner.to_string()))
    }

    /// The active list of an owner (or of unclaimed data for `None`).
    pub fn active_task_list(&self, owner: Option<&str>) -> Option<TaskList> {
        self.read(|view| view.active_task_list(owner))
    }

    /// Last successful pull for an owner.
    pub fn watermark(&self, owner: &str) -> Option<i64> {
        self.read(|view| view.watermark(owner))
    }

    /// Inserts a task in its own transaction.
    pub fn insert_task(&self, task: Task) -> StoreResult<Task> {
        self.transaction(|txn| txn.insert_task(task))
    }

    /// Inserts a task list in its own transaction.
    pub fn insert_task_list(&self, list: TaskList) -> StoreResult<TaskList> {
        self.transaction(|txn| txn.insert_task_list(list))
    }

    /// Inserts any entity in its own transaction.
    pub fn insert(&self, entity: Entity) -> StoreResult<Entity> {
        self.transaction(|txn| txn.insert(entity))
    }

    /// Updates any entity in its own transaction.
    pub fn update(&self, entity_type: EntityType, id: &str, fields: &Payload) -> StoreResult<Entity> {
        self.transaction(|txn| txn.update(entity_type, id, fields))
    }

    /// Records the last successful pull for an owner.
    pub fn set_watermark(&self, owner: &str, millis: i64) -> StoreResult<()> {
        self.transaction(|txn| {
            txn.set_watermark(owner, millis);
            Ok(())
        })
    }

    /// Removes purgeable tombstones older than `cutoff_ms`.
    pub fn purge_tombstones(&self, cutoff_ms: i64) -> StoreResult<PurgeReport> {
        let report = self.transaction(|txn| Ok(txn.purge_tombstones(cutoff_ms)))?;
        if report.total() > 0 {
            tracing::info!(
                tasks = report.tasks.len(),
                task_lists = report.task_lists.len(),
                "purged tombstones"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tasksync_model::{ManualClock, Timestamp};

    fn store() -> (LocalStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (LocalStore::in_memory(clock.clone()), clock)
    }

    fn fields(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_stamps_from_clock() {
        let (store, _) = store();
        let mut list = TaskList::new("Work");
        list.updated_at = Timestamp::Millis(5);

        let stored = store.insert_task_list(list).unwrap();
        assert_eq!(stored.created_at, Timestamp::Millis(1_000));
        assert_eq!(stored.updated_at, Timestamp::Millis(1_000));
    }

    #[test]
    fn tagged_insert_dispatches_by_type() {
        let (store, _) = store();
        let list = store.insert(Entity::TaskList(TaskList::new("Work"))).unwrap();
        let task = Task::new(list.id(), "Review PR", tasksync_model::Quadrant::UrgentImportant);
        let task = store.insert(Entity::Task(task)).unwrap();

        assert_eq!(task.entity_type(), EntityType::Task);
        assert_eq!(task.updated_at(), &Timestamp::Millis(1_000));
        assert!(store.get(EntityType::TaskList, list.id()).is_some());
        assert!(store.get(EntityType::Task, task.id()).is_some());
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let (store, _) = store();
        let list = TaskList::new("Work");
        store.insert_task_list(list.clone()).unwrap();
        assert!(matches!(
            store.insert_task_list(list),
            Err(StoreError::DuplicateId { .. })
        ));
    }

    #[test]
    fn update_merges_and_restamps() {
        let (store, clock) = store();
        let task = store
            .insert_task(Task::new("l1", "Draft", Quadrant::UrgentImportant))
            .unwrap();
        clock.set(2_000);

        let updated = store
            .update(
                EntityType::Task,
                &task.id,
                &fields(json!({ "text": "Final", "updatedAt": 1 })),
            )
            .unwrap();
        let updated = updated.as_task().unwrap();
        assert_eq!(updated.text, "Final");
        assert_eq!(updated.created_at, Timestamp::Millis(1_000));
        assert_eq!(updated.updated_at, Timestamp::Millis(2_000));
    }

    #[test]
    fn update_missing_entity() {
        let (store, _) = store();
        let result = store.update(EntityType::TaskList, "nope", &Payload::new());
        assert!(matches!(result, Err(StoreError::EntityNotFound { .. })));
    }

    #[test]
    fn import_keeps_timestamps() {
        let (store, _) = store();
        let mut list = TaskList::new("Remote");
        list.updated_at = Timestamp::from("2020-01-01T00:00:00Z");
        store
            .transaction(|txn| {
                txn.import_task_list(list.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(store.get_task_list(&list.id).unwrap().updated_at, list.updated_at);
    }

    #[test]
    fn failed_closure_changes_nothing() {
        let (store, _) = store();
        let result: StoreResult<()> = store.transaction(|txn| {
            txn.insert_task_list(TaskList::new("Ghost"))?;
            Err(StoreError::InvalidOperation("abort".into()))
        });
        assert!(result.is_err());
        assert!(store.task_lists(&Scope::All).is_empty());
    }

    #[test]
    fn list_active_hides_tombstones_only() {
        let (store, _) = store();
        let list = store.insert_task_list(TaskList::new("Work")).unwrap();
        let keep = store
            .insert_task(Task::new(&list.id, "keep", Quadrant::UrgentImportant))
            .unwrap();
        let soft = store
            .insert_task(Task::new(&list.id, "soft", Quadrant::UrgentImportant))
            .unwrap();
        let gone = store
            .insert_task(Task::new(&list.id, "gone", Quadrant::UrgentImportant))
            .unwrap();
        store
            .update(EntityType::Task, &soft.id, &fields(json!({ "deleted": 1 })))
            .unwrap();
        store
            .update(EntityType::Task, &gone.id, &fields(json!({ "deleted": 2 })))
            .unwrap();

        let ids: Vec<String> = store
            .list_active(EntityType::Task, &Scope::List(list.id.clone()))
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&keep.id));
        assert!(ids.contains(&soft.id));
        assert!(store.get(EntityType::Task, &gone.id).is_some());
    }

    #[test]
    fn scopes_filter_by_owner() {
        let (store, _) = store();
        let mut mine = TaskList::new("Mine");
        mine.owner_id = Some("u1".into());
        let mut theirs = TaskList::new("Theirs");
        theirs.owner_id = Some("u2".into());
        let unowned = TaskList::new("Local");
        for list in [mine, theirs, unowned] {
            store.insert_task_list(list).unwrap();
        }

        assert_eq!(store.task_lists(&Scope::All).len(), 3);
        assert_eq!(store.task_lists(&Scope::Owner("u1".into())).len(), 1);
        assert_eq!(store.task_lists(&Scope::Unowned).len(), 1);
        assert_eq!(store.task_lists(&Scope::VisibleTo(Some("u1".into()))).len(), 2);
    }

    #[test]
    fn next_order_per_bucket() {
        let (store, _) = store();
        let mut a = Task::new("l1", "a", Quadrant::UrgentImportant);
        a.order = 4;
        let mut b = Task::new("l1", "b", Quadrant::NotUrgentImportant);
        b.order = 9;
        store.insert_task(a).unwrap();
        store.insert_task(b).unwrap();

        store.read(|view| {
            assert_eq!(view.next_order("l1", Quadrant::UrgentImportant), 5);
            assert_eq!(view.next_order("l1", Quadrant::NotUrgentImportant), 10);
            assert_eq!(view.next_order("l2", Quadrant::UrgentImportant), 0);
        });
    }

    #[test]
    fn watermarks_per_owner() {
        let (store, _) = store();
        assert_eq!(store.watermark("u1"), None);
        store.set_watermark("u1", 500).unwrap();
        assert_eq!(store.watermark("u1"), Some(500));
        assert_eq!(store.watermark("u2"), None);
    }
}
