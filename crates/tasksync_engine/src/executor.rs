//! Push path: drains pending queue items to the backend.

use crate::config::SyncConfig;
use crate::error::{RemoteError, RemoteResult, SyncResult};
use crate::presence::ConfirmedLists;
use crate::remote::{with_deadline, RemoteBackend};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tasksync_model::{translate, Entity, EntityType, QueueAction, QueueItem, QueuePatch, QueueStatus};
use tasksync_store::{LocalStore, StoreError};

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items sent to the backend.
    pub attempted: usize,
    /// Items the backend accepted.
    pub completed: usize,
    /// Items returned to pending after a retryable failure.
    pub retried: usize,
    /// Items marked failed.
    pub failed: usize,
    /// Items left pending untouched (parent list not confirmed, or another
    /// owner's data).
    pub skipped: usize,
    /// Items found stuck in processing and requeued.
    pub recovered: usize,
    /// Completed items pruned after the pass.
    pub pruned: usize,
    /// True if the pass was dropped because another one was running.
    pub busy: bool,
}

impl DrainReport {
    /// Returns true if retryable failures left work pending.
    pub fn needs_retry(&self) -> bool {
        self.retried > 0
    }
}

/// Resets the in-flight flag when a pass ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Pushes queued local mutations to the remote backend.
///
/// One pass processes the pending items in creation order (with the
/// deactivations moved ahead of activations). A task whose list is not
/// yet known remotely is skipped and stays pending, and once an item is
/// left unpushed the later items for the same entity wait for the next
/// pass. At most one pass runs
/// at a time; a request that arrives while one is running is dropped.
pub struct SyncExecutor {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteBackend>,
    config: SyncConfig,
    confirmed: ConfirmedLists,
    in_flight: AtomicBool,
}

impl SyncExecutor {
    /// Creates an executor.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteBackend>,
        config: SyncConfig,
        confirmed: ConfirmedLists,
    ) -> Self {
        Self {
            store,
            remote,
            config,
            confirmed,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Lists known to exist remotely.
    pub fn confirmed(&self) -> &ConfirmedLists {
        &self.confirmed
    }

    /// Returns true while a pass is running.
    pub fn is_draining(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one drain pass for `owner`.
    ///
    /// # Errors
    ///
    /// Only local store failures are returned; remote failures are recorded
    /// on the queue items.
    pub async fn drain(&self, owner: &str) -> SyncResult<DrainReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(owner, "drain already in flight; request dropped");
            return Ok(DrainReport {
                busy: true,
                ..Default::default()
            });
        }
        let _guard = InFlight(&self.in_flight);

        let mut report = DrainReport {
            recovered: self.recover_stale()?,
            ..Default::default()
        };

        let pending = self.store.list_by_status(QueueStatus::Pending);
        tracing::debug!(owner, pending = pending.len(), "drain started");

        let mut absent_lists = HashSet::new();
        let mut held_entities: HashSet<String> = HashSet::new();
        let mut deactivation_outstanding = false;
        for (position, planned) in activation_order(pending).into_iter().enumerate() {
            if position > 0 && !self.config.drain_throttle.is_zero() {
                tokio::time::sleep(self.config.drain_throttle).await;
            }

            // Re-read: a pull or a manual action may have touched it.
            let item = match self.store.queue_item(planned.id) {
                Some(item) if item.status == QueueStatus::Pending => item,
                _ => continue,
            };

            let foreign = !self.belongs_to(&item, owner);
            let skip_reason = if foreign {
                Some("item belongs to another owner")
            } else if held_entities.contains(&item.entity_id) {
                Some("earlier item for this entity not pushed")
            } else if !self.parent_present(owner, &item, &mut absent_lists).await {
                Some("parent list not confirmed remotely")
            } else if deactivation_outstanding && activates(&item) {
                Some("earlier deactivation not pushed; activation held back")
            } else {
                None
            };

            let entity_id = item.entity_id.clone();
            let deactivates = item.activation() == Some(false);
            let pushed = match skip_reason {
                Some(reason) => {
                    report.skipped += 1;
                    tracing::debug!(
                        item_id = item.id,
                        entity_id = %item.entity_id,
                        list_id = ?item.referenced_list_id(),
                        reason,
                        "item skipped"
                    );
                    false
                }
                None => self.process(owner, item, &mut report).await?,
            };
            if !pushed {
                held_entities.insert(entity_id);
                // Activations wait for any of this owner's unpushed deactivations.
                deactivation_outstanding |= deactivates && !foreign;
            }
        }

        report.pruned = self.prune_completed()?;

        tracing::info!(
            owner,
            attempted = report.attempted,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            skipped = report.skipped,
            "drain finished"
        );
        Ok(report)
    }

    /// Pushes one item and records the outcome. Returns true if the backend
    /// accepted it.
    async fn process(
        &self,
        owner: &str,
        item: QueueItem,
        report: &mut DrainReport,
    ) -> SyncResult<bool> {
        self.store
            .set_status(item.id, QueueStatus::Processing, None)?;
        report.attempted += 1;

        match self.push(owner, &item).await {
            Ok(()) => {
                let completed = QueuePatch {
                    status: Some(QueueStatus::Completed),
                    completed_at: Some(Some(self.store.clock().now_millis())),
                    ..Default::default()
                };
                self.finish(item.id, completed)?;
                if item.entity_type == EntityType::TaskList {
                    self.confirmed.confirm(item.entity_id.clone());
                }
                report.completed += 1;
                tracing::debug!(
                    item_id = item.id,
                    action = %item.action,
                    entity_type = %item.entity_type,
                    entity_id = %item.entity_id,
                    "pushed"
                );
                Ok(true)
            }
            Err(err) => {
                self.record_failure(&item, err, report)?;
                Ok(false)
            }
        }
    }

    fn record_failure(
        &self,
        item: &QueueItem,
        err: RemoteError,
        report: &mut DrainReport,
    ) -> SyncResult<()> {
        let message = err.to_string();
        let patch = if err.is_retryable() && self.config.retry.should_retry(item.retry_count) {
            report.retried += 1;
            tracing::warn!(
                item_id = item.id,
                kind = %err.kind,
                retry_count = item.retry_count + 1,
                error = %message,
                "push failed; will retry"
            );
            QueuePatch {
                status: Some(QueueStatus::Pending),
                retry_count: Some(item.retry_count + 1),
                last_error: Some(Some(message)),
                ..Default::default()
            }
        } else {
            report.failed += 1;
            tracing::warn!(
                item_id = item.id,
                kind = %err.kind,
                retry_count = item.retry_count,
                error = %message,
                "push failed; marked failed"
            );
            QueuePatch {
                status: Some(QueueStatus::Failed),
                last_error: Some(Some(message)),
                ..Default::default()
            }
        };
        self.finish(item.id, patch)
    }

    /// Applies the outcome of a push. The item may have been discarded
    /// while the call was in flight.
    fn finish(&self, id: u64, patch: QueuePatch) -> SyncResult<()> {
        match self.store.patch_item(id, patch) {
            Ok(_) => Ok(()),
            Err(StoreError::QueueItemNotFound(_)) => {
                tracing::debug!(item_id = id, "item discarded during push");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn push(&self, owner: &str, item: &QueueItem) -> RemoteResult<()> {
        let deadline = self.config.remote_timeout;
        match item.action {
            QueueAction::Add => {
                let record = translate::payload_to_record(item.entity_type, &item.payload)?;
                with_deadline(deadline, self.remote.insert(owner, record)).await
            }
            QueueAction::Update => {
                let fields = translate::fields_to_remote(item.entity_type, &item.payload)?;
                with_deadline(
                    deadline,
                    self.remote
                        .update(owner, item.entity_type, &item.entity_id, fields),
                )
                .await
            }
            QueueAction::Delete => {
                let fields = translate::fields_to_remote(item.entity_type, &item.payload)?;
                with_deadline(
                    deadline,
                    self.remote
                        .delete(owner, item.entity_type, &item.entity_id, fields),
                )
                .await
            }
        }
    }

    fn belongs_to(&self, item: &QueueItem, owner: &str) -> bool {
        let local_owner = match self.store.get(item.entity_type, &item.entity_id) {
            Some(Entity::Task(task)) => task.owner_id,
            Some(Entity::TaskList(list)) => list.owner_id,
            None => None,
        };
        local_owner
            .as_deref()
            .or(item.owner_hint())
            .map_or(true, |o| o == owner)
    }

    /// True unless the item is a task whose list is not known remotely.
    async fn parent_present(&self, owner: &str, item: &QueueItem, absent: &mut HashSet<String>) -> bool {
        match item.referenced_list_id() {
            Some(list_id) => self.list_present(owner, list_id, absent).await,
            None => true,
        }
    }

    async fn list_present(&self, owner: &str, list_id: &str, absent: &mut HashSet<String>) -> bool {
        if self.confirmed.contains(list_id) {
            return true;
        }
        if absent.contains(list_id) {
            return false;
        }

        let check = self.remote.exists(owner, EntityType::TaskList, list_id);
        match with_deadline(self.config.remote_timeout, check).await {
            Ok(true) => {
                self.confirmed.confirm(list_id);
                true
            }
            Ok(false) => {
                absent.insert(list_id.to_string());
                false
            }
            Err(err) => {
                tracing::debug!(list_id, error = %err, "presence check failed");
                absent.insert(list_id.to_string());
                false
            }
        }
    }

    /// Items left in processing by an interrupted pass go back to pending.
    fn recover_stale(&self) -> SyncResult<usize> {
        let stale = self.store.list_by_status(QueueStatus::Processing);
        if stale.is_empty() {
            return Ok(0);
        }
        self.store.transaction(|txn| {
            for item in &stale {
                txn.patch(
                    item.id,
                    QueuePatch {
                        status: Some(QueueStatus::Pending),
                        ..Default::default()
                    },
                )?;
            }
            Ok(())
        })?;
        tracing::warn!(count = stale.len(), "requeued items left in processing");
        Ok(stale.len())
    }

    fn prune_completed(&self) -> SyncResult<usize> {
        let Some(retention) = self.config.completed_retention else {
            return Ok(0);
        };
        let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let cutoff = self.store.clock().now_millis().saturating_sub(retention_ms);
        let pruned = self.store.transaction(|txn| Ok(txn.prune_completed(cutoff)))?;
        if pruned > 0 {
            tracing::debug!(pruned, "pruned completed queue items");
        }
        Ok(pruned)
    }
}

/// Orders one pass so that deactivations reach the backend before
/// activations.
///
/// Creation order is kept, except that a pending `isActive = 0` update or
/// delete that comes after an activation (an `isActive = 1` update, or the `add` of an
/// active list) is pulled in front of it. A deactivation never overtakes an
/// earlier item for the same list.
pub(crate) fn activation_order(items: Vec<QueueItem>) -> Vec<QueueItem> {
    let mut slots: Vec<Option<QueueItem>> = items.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());

    for i in 0..slots.len() {
        if matches!(&slots[i], Some(item) if activates(item)) {
            for j in (i + 1)..slots.len() {
                let movable = match &slots[j] {
                    Some(later) if later.activation() == Some(false) => {
                        !slots[i..j]
                            .iter()
                            .flatten()
                            .any(|earlier| earlier.targets(later.entity_type, &later.entity_id))
                    }
                    _ => false,
                };
                if movable {
                    if let Some(item) = slots[j].take() {
                        ordered.push(item);
                    }
                }
            }
        }
        if let Some(item) = slots[i].take() {
            ordered.push(item);
        }
    }
    ordered
}

fn activates(item: &QueueItem) -> bool {
    if item.activation() == Some(true) {
        return true;
    }
    let active_flag = match item.payload.get("isActive") {
        Some(value) => value.as_i64() == Some(1) || value.as_bool() == Some(true),
        None => false,
    };
    item.entity_type == EntityType::TaskList && item.action == QueueAction::Add && active_flag
}
