//! In-memory remote backend for tests and local development.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::RemoteBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tasksync_model::{
    parse_millis, DeleteState, EntityType, RemoteFields, RemoteRecord, RemoteTask, RemoteTaskList,
};

/// One call received by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Method name (`insert`, `update`, `delete`, `exists`, `fetch`).
    pub method: &'static str,
    /// Entity type addressed.
    pub entity_type: EntityType,
    /// Entity id, for single-record calls.
    pub id: Option<String>,
}

#[derive(Default)]
struct Tables {
    task_lists: BTreeMap<String, RemoteTaskList>,
    tasks: BTreeMap<String, RemoteTask>,
}

/// A remote backend held in memory.
///
/// Enforces the same constraints as the hosted backend (list before task,
/// one active list per owner) and supports failure injection, latency and
/// an offline switch.
#[derive(Default)]
pub struct MemoryRemote {
    tables: Mutex<Tables>,
    failures: Mutex<VecDeque<Option<RemoteError>>>,
    calls: Mutex<Vec<RemoteCall>>,
    latency: Mutex<Duration>,
    offline: AtomicBool,
}

impl MemoryRemote {
    /// Creates an empty, reachable backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with a network error while `false`.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Delays every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Fails the next call with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().push_back(Some(error));
    }

    /// Lets the next scripted call through; later failures shift back by one.
    pub fn pass_next(&self) {
        self.failures.lock().push_back(None);
    }

    /// Fails the next `times` calls with `error`.
    pub fn fail_times(&self, times: usize, error: RemoteError) {
        let mut failures = self.failures.lock();
        for _ in 0..times {
            failures.push_back(Some(error.clone()));
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Calls of one method, as `(entity_type, id)`.
    pub fn calls_to(&self, method: &str) -> Vec<(EntityType, Option<String>)> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .map(|call| (call.entity_type, call.id.clone()))
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Writes a list directly, as another device would.
    pub fn put_task_list(&self, list: RemoteTaskList) {
        self.tables.lock().task_lists.insert(list.id.clone(), list);
    }

    /// Writes a task directly, as another device would.
    pub fn put_task(&self, task: RemoteTask) {
        self.tables.lock().tasks.insert(task.id.clone(), task);
    }

    /// Reads a stored list.
    pub fn task_list(&self, id: &str) -> Option<RemoteTaskList> {
        self.tables.lock().task_lists.get(id).cloned()
    }

    /// Reads a stored task.
    pub fn task(&self, id: &str) -> Option<RemoteTask> {
        self.tables.lock().tasks.get(id).cloned()
    }

    /// Lists of an owner currently flagged active.
    pub fn active_task_lists(&self, owner: &str) -> Vec<RemoteTaskList> {
        self.tables
            .lock()
            .task_lists
            .values()
            .filter(|l| l.is_active && l.user_id.as_deref() == Some(owner))
            .cloned()
            .collect()
    }

    /// Number of stored lists and tasks.
    pub fn len(&self) -> usize {
        let tables = self.tables.lock();
        tables.task_lists.len() + tables.tasks.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn enter(&self, method: &'static str, entity_type: EntityType, id: Option<&str>) -> RemoteResult<()> {
        self.calls.lock().push(RemoteCall {
            method,
            entity_type,
            id: id.map(str::to_string),
        });

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::network("network unreachable"));
        }
        match self.failures.lock().pop_front() {
            Some(Some(error)) => Err(error),
            _ => Ok(()),
        }
    }
}

fn newer_than(updated_at: &str, since: Option<i64>) -> bool {
    match since {
        Some(since) => parse_millis(updated_at).unwrap_or(0) > since,
        None => true,
    }
}

fn patched<T: Serialize + DeserializeOwned>(record: &T, fields: &RemoteFields) -> RemoteResult<T> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| RemoteError::from_status(500, e.to_string()))?;
    if let Some(object) = value.as_object_mut() {
        for (key, field) in fields {
            if key == "id" {
                return Err(RemoteError::from_status(400, "id cannot be changed"));
            }
            if !object.contains_key(key) {
                return Err(RemoteError::from_status(400, format!("unknown column {key}")));
            }
            object.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value).map_err(|e| RemoteError::from_status(400, e.to_string()))
}

impl Tables {
    fn check_list_exists(&self, owner: &str, list_id: &str) -> RemoteResult<()> {
        match self.task_lists.get(list_id) {
            Some(list) if list.user_id.as_deref() == Some(owner) => Ok(()),
            _ => Err(RemoteError::from_status(
                422,
                format!("insert or update on table \"tasks\" violates foreign key constraint: list {list_id} is not present"),
            )),
        }
    }

    fn check_single_active(&self, owner: &str, list: &RemoteTaskList) -> RemoteResult<()> {
        if !list.is_active {
            return Ok(());
        }
        let clash = self.task_lists.values().any(|other| {
            other.id != list.id && other.is_active && other.user_id.as_deref() == Some(owner)
        });
        if clash {
            return Err(RemoteError::from_status(
                422,
                "duplicate key value violates unique constraint \"one_active_list_per_user\"",
            ));
        }
        Ok(())
    }

    fn owned_task_list(&self, owner: &str, id: &str) -> RemoteResult<&RemoteTaskList> {
        self.task_lists
            .get(id)
            .filter(|l| l.user_id.as_deref() == Some(owner))
            .ok_or_else(|| RemoteError::from_status(404, format!("task list {id} not found")))
    }

    fn owned_task(&self, owner: &str, id: &str) -> RemoteResult<&RemoteTask> {
        self.tasks
            .get(id)
            .filter(|t| t.user_id.as_deref() == Some(owner))
            .ok_or_else(|| RemoteError::from_status(404, format!("task {id} not found")))
    }

    fn patch(
        &mut self,
        owner: &str,
        entity_type: EntityType,
        id: &str,
        fields: &RemoteFields,
    ) -> RemoteResult<()> {
        match entity_type {
            EntityType::TaskList => {
                let updated = patched(self.owned_task_list(owner, id)?, fields)?;
                self.check_single_active(owner, &updated)?;
                self.task_lists.insert(id.to_string(), updated);
            }
            EntityType::Task => {
                let updated = patched(self.owned_task(owner, id)?, fields)?;
                if fields.contains_key("list_id") {
                    self.check_list_exists(owner, &updated.list_id)?;
                }
                self.tasks.insert(id.to_string(), updated);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemote {
    async fn insert(&self, owner: &str, record: RemoteRecord) -> RemoteResult<()> {
        self.enter("insert", record.entity_type(), Some(record.id())).await?;

        if record.user_id().is_some_and(|user| user != owner) {
            return Err(RemoteError::from_status(403, "row belongs to another user"));
        }

        let mut tables = self.tables.lock();
        match record {
            RemoteRecord::TaskList(mut list) => {
                list.user_id = Some(owner.to_string());
                tables.check_single_active(owner, &list)?;
                tables.task_lists.insert(list.id.clone(), list);
            }
            RemoteRecord::Task(mut task) => {
                task.user_id = Some(owner.to_string());
                tables.check_list_exists(owner, &task.list_id)?;
                tables.tasks.insert(task.id.clone(), task);
            }
        }
        Ok(())
    }

    async fn update(
        &self,
        owner: &str,
        entity_type: EntityType,
        id: &str,
        fields: RemoteFields,
    ) -> RemoteResult<()> {
        self.enter("update", entity_type, Some(id)).await?;
        self.tables.lock().patch(owner, entity_type, id, &fields)
    }

    async fn delete(
        &self,
        owner: &str,
        entity_type: EntityType,
        id: &str,
        fields: RemoteFields,
    ) -> RemoteResult<()> {
        self.enter("delete", entity_type, Some(id)).await?;
        let code = fields
            .get("deleted")
            .and_then(|v| v.as_u64())
            .and_then(|code| u8::try_from(code).ok())
            .and_then(DeleteState::from_code);
        if code.is_none() {
            return Err(RemoteError::from_status(400, "delete requires a deleted code"));
        }
        self.tables.lock().patch(owner, entity_type, id, &fields)
    }

    async fn exists(&self, owner: &str, entity_type: EntityType, id: &str) -> RemoteResult<bool> {
        self.enter("exists", entity_type, Some(id)).await?;
        let tables = self.tables.lock();
        Ok(match entity_type {
            EntityType::TaskList => tables.owned_task_list(owner, id).is_ok(),
            EntityType::Task => tables.owned_task(owner, id).is_ok(),
        })
    }

    async fn fetch_task_lists_since(
        &self,
        owner: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<RemoteTaskList>> {
        self.enter("fetch", EntityType::TaskList, None).await?;
        let mut lists: Vec<RemoteTaskList> = self
            .tables
            .lock()
            .task_lists
            .values()
            .filter(|l| l.user_id.as_deref() == Some(owner) && newer_than(&l.updated_at, since))
            .cloned()
            .collect();
        lists.sort_by_key(|l| (parse_millis(&l.updated_at).unwrap_or(0), l.id.clone()));
        Ok(lists)
    }

    async fn fetch_tasks_since(
        &self,
        owner: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<RemoteTask>> {
        self.enter("fetch", EntityType::Task, None).await?;
        let mut tasks: Vec<RemoteTask> = self
            .tables
            .lock()
            .tasks
            .values()
            .filter(|t| t.user_id.as_deref() == Some(owner) && newer_than(&t.updated_at, since))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (parse_millis(&t.updated_at).unwrap_or(0), t.id.clone()));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use tasksync_model::{Quadrant, ViewMode};

    fn list(id: &str, active: bool) -> RemoteTaskList {
        RemoteTaskList {
            id: id.into(),
            name: id.to_uppercase(),
            is_active: active,
            deleted: DeleteState::Active,
            layout_view: ViewMode::Matrix,
            show_completed: true,
            user_id: Some("u1".into()),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    fn task(id: &str, list_id: &str) -> RemoteTask {
        RemoteTask {
            id: id.into(),
            text: "do it".into(),
            is_completed: false,
            deleted: DeleteState::Active,
            quadrant: Quadrant::UrgentImportant,
            list_id: list_id.into(),
            estimate_text: String::new(),
            sort_order: 0,
            user_id: Some("u1".into()),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    fn fields(value: serde_json::Value) -> RemoteFields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn task_requires_remote_list() {
        let remote = MemoryRemote::new();
        let err = remote
            .insert("u1", RemoteRecord::Task(task("t1", "l1")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        remote.insert("u1", RemoteRecord::TaskList(list("l1", false))).await.unwrap();
        remote.insert("u1", RemoteRecord::Task(task("t1", "l1"))).await.unwrap();
        assert!(remote.exists("u1", EntityType::Task, "t1").await.unwrap());
        assert!(!remote.exists("u2", EntityType::Task, "t1").await.unwrap());
    }

    #[tokio::test]
    async fn one_active_list_per_owner() {
        let remote = MemoryRemote::new();
        remote.put_task_list(list("a", true));
        remote.put_task_list(list("b", false));

        let err = remote
            .update("u1", EntityType::TaskList, "b", fields(json!({ "is_active": true })))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        remote
            .update("u1", EntityType::TaskList, "a", fields(json!({ "is_active": false })))
            .await
            .unwrap();
        remote
            .update("u1", EntityType::TaskList, "b", fields(json!({ "is_active": true })))
            .await
            .unwrap();
        assert_eq!(remote.active_task_lists("u1")[0].id, "b");
    }

    #[tokio::test]
    async fn delete_sets_state() {
        let remote = MemoryRemote::new();
        remote.put_task_list(list("l1", false));
        remote
            .delete("u1", EntityType::TaskList, "l1", fields(json!({ "deleted": 2 })))
            .await
            .unwrap();
        assert_eq!(remote.task_list("l1").unwrap().deleted, DeleteState::Tombstoned);

        let err = remote
            .delete("u1", EntityType::TaskList, "missing", fields(json!({ "deleted": 1 })))
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn injected_failures_and_offline() {
        let remote = MemoryRemote::new();
        remote.fail_next(RemoteError::from_status(503, "busy"));
        let err = remote.fetch_tasks_since("u1", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert!(remote.fetch_tasks_since("u1", None).await.is_ok());

        remote.pass_next();
        remote.fail_next(RemoteError::network("reset"));
        assert!(remote.fetch_tasks_since("u1", None).await.is_ok());
        assert!(remote.fetch_tasks_since("u1", None).await.is_err());
        assert!(remote.fetch_tasks_since("u1", None).await.is_ok());

        remote.set_online(false);
        let err = remote.exists("u1", EntityType::Task, "t").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(remote.calls().len(), 6);
    }

    #[tokio::test]
    async fn fetch_filters_by_owner_and_watermark() {
        let remote = MemoryRemote::new();
        let mut old = list("old", false);
        old.updated_at = "2024-01-01T00:00:00Z".into();
        let mut new = list("new", false);
        new.updated_at = "2024-06-01T00:00:00Z".into();
        let mut foreign = list("foreign", false);
        foreign.user_id = Some("u2".into());
        for l in [old, new, foreign] {
            remote.put_task_list(l);
        }

        let all = remote.fetch_task_lists_since("u1", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let since = parse_millis("2024-03-01T00:00:00Z");
        let recent = remote.fetch_task_lists_since("u1", since).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");
    }
}
