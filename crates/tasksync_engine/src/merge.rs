//! Pull path: fetches remote changes and merges them last-write-wins.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::presence::ConfirmedLists;
use crate::remote::{with_deadline, RemoteBackend};
use std::sync::Arc;
use serde_json::Value;
use tasksync_model::{
    translate, EntityRef, EntityType, QueueAction, QueueItem, QueuePatch, QueueStatus, Record,
    RemoteTask, RemoteTaskList, Task, TaskList,
};
use tasksync_store::{LocalStore, Scope, StoreResult, Transaction};

/// Outcome of one pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Remote lists that were absent locally.
    pub lists_inserted: usize,
    /// Local lists replaced by a newer remote version.
    pub lists_overwritten: usize,
    /// Remote tasks that were absent locally.
    pub tasks_inserted: usize,
    /// Local tasks replaced by a newer remote version.
    pub tasks_overwritten: usize,
    /// Remote versions ignored because local was as new or newer.
    pub kept_local: usize,
    /// Pending queue items dropped because the remote version won.
    pub invalidated_items: usize,
    /// Lists deactivated to keep a single active list.
    pub lists_deactivated: usize,
    /// Watermark stored after the pull.
    pub watermark: i64,
}

impl PullReport {
    /// Number of local entities written.
    pub fn applied(&self) -> usize {
        self.lists_inserted + self.lists_overwritten + self.tasks_inserted + self.tasks_overwritten
    }
}

/// What happened to one remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Inserted,
    Overwritten,
    KeptLocal,
}

/// Reconciles remote state into the local store.
///
/// Lists are applied before tasks. For an entity present on both sides the
/// version with the strictly greater normalized `updatedAt` wins; ties keep
/// local. When remote wins, the entity's pending queue items are dropped so
/// they are never replayed over the accepted state.
pub struct MergeEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteBackend>,
    config: SyncConfig,
    confirmed: ConfirmedLists,
}

impl MergeEngine {
    /// Creates a merge engine.
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
        }
    }

    /// Pulls everything changed for `owner` since the last pull.
    ///
    /// The batch is applied in one store transaction together with the new
    /// watermark, so a failure part-way leaves the watermark untouched.
    pub async fn pull(&self, owner: &str) -> SyncResult<PullReport> {
        let since = self.store.watermark(owner);
        let started = self.store.clock().now_millis();
        tracing::debug!(owner, since, "pull started");

        let deadline = self.config.remote_timeout;
        let lists =
            with_deadline(deadline, self.remote.fetch_task_lists_since(owner, since)).await?;
        let tasks = with_deadline(deadline, self.remote.fetch_tasks_since(owner, since)).await?;
        let fetched_list_ids: Vec<String> = lists.iter().map(|l| l.id.clone()).collect();

        let report = self.store.transaction(|txn| {
            let mut report = PullReport {
                watermark: started,
                ..Default::default()
            };
            apply_lists(txn, lists, &mut report);
            reconcile_active_lists(txn, owner, &fetched_list_ids, &mut report)?;
            apply_tasks(txn, tasks, &mut report);
            txn.set_watermark(owner, started);
            Ok(report)
        })?;

        self.confirmed.confirm_all(fetched_list_ids);

        tracing::info!(
            owner,
            lists_inserted = report.lists_inserted,
            lists_overwritten = report.lists_overwritten,
            tasks_inserted = report.tasks_inserted,
            tasks_overwritten = report.tasks_overwritten,
            kept_local = report.kept_local,
            invalidated_items = report.invalidated_items,
            watermark = report.watermark,
            "pull finished"
        );
        Ok(report)
    }
}

fn apply_lists(txn: &mut Transaction<'_>, lists: Vec<RemoteTaskList>, report: &mut PullReport) {
    for remote in lists {
        let incoming = translate::task_list_from_remote(remote);
        let local = txn.get_task_list(&incoming.id);
        match merge_one(txn, local, incoming, report) {
            Outcome::Inserted => report.lists_inserted += 1,
            Outcome::Overwritten => report.lists_overwritten += 1,
            Outcome::KeptLocal => report.kept_local += 1,
        }
    }
}

fn apply_tasks(txn: &mut Transaction<'_>, tasks: Vec<RemoteTask>, report: &mut PullReport) {
    for remote in tasks {
        let incoming = translate::task_from_remote(remote);
        let local = txn.get_task(&incoming.id);
        match merge_one(txn, local, incoming, report) {
            Outcome::Inserted => report.tasks_inserted += 1,
            Outcome::Overwritten => report.tasks_overwritten += 1,
            Outcome::KeptLocal => report.kept_local += 1,
        }
    }
}

/// Writes a remote record into a transaction without restamping.
trait Import: Record {
    fn import(txn: &mut Transaction<'_>, record: Self);
}

impl Import for Task {
    fn import(txn: &mut Transaction<'_>, record: Self) {
        txn.import_task(record);
    }
}

impl Import for TaskList {
    fn import(txn: &mut Transaction<'_>, record: Self) {
        txn.import_task_list(record);
    }
}

/// The last-write-wins decision for one entity.
fn merge_one<R: Import>(
    txn: &mut Transaction<'_>,
    local: Option<R>,
    incoming: R,
    report: &mut PullReport,
) -> Outcome {
    let Some(local) = local else {
        R::import(txn, incoming);
        return Outcome::Inserted;
    };

    if !remote_wins(local.updated_at(), incoming.updated_at()) {
        return Outcome::KeptLocal;
    }

    let entity = incoming.entity_ref();
    R::import(txn, incoming);
    let dropped = txn.delete_pending_for(&entity);
    report.invalidated_items += dropped.len();
    tracing::debug!(
        entity = %entity,
        invalidated = dropped.len(),
        "remote version wins"
    );
    Outcome::Overwritten
}

/// Remote wins only with a strictly greater normalized timestamp.
pub fn remote_wins(
    local_updated_at: &tasksync_model::Timestamp,
    remote_updated_at: &tasksync_model::Timestamp,
) -> bool {
    remote_updated_at.is_newer_than(local_updated_at)
}

/// Keeps at most one active list for the owner.
///
/// The newest active list stays active (ties: one fetched in this pull,
/// then the smallest id). The others are deactivated locally without a new
/// timestamp. Their pending activations are dropped and their pending adds
/// are rewritten to push the list inactive.
fn reconcile_active_lists(
    txn: &mut Transaction<'_>,
    owner: &str,
    fetched: &[String],
    report: &mut PullReport,
) -> StoreResult<()> {
    let active = txn
        .view()
        .active_task_lists(&Scope::Owner(owner.to_string()));
    if active.len() < 2 {
        return Ok(());
    }

    let winner = active
        .iter()
        .max_by(|a, b| {
            let key = |l: &TaskList| (l.updated_at.millis_or_zero(), fetched.contains(&l.id));
            key(*a).cmp(&key(*b)).then_with(|| b.id.cmp(&a.id))
        })
        .map(|l| l.id.clone());

    for mut loser in active.into_iter().filter(|l| Some(&l.id) != winner.as_ref()) {
        loser.is_active = false;
        let entity = EntityRef::new(EntityType::TaskList, loser.id.clone());
        txn.import_task_list(loser);

        let pending: Vec<QueueItem> = txn
            .view()
            .items_for_entity(&entity)
            .into_iter()
            .filter(|item| item.status == QueueStatus::Pending)
            .collect();

        let activations: Vec<u64> = pending
            .iter()
            .filter(|item| item.activation() == Some(true))
            .map(|item| item.id)
            .collect();
        report.invalidated_items += txn.delete_batch(&activations);

        for item in pending.into_iter().filter(|item| item.action == QueueAction::Add) {
            let mut payload = item.payload;
            payload.insert("isActive".into(), Value::from(0));
            txn.patch(
                item.id,
                QueuePatch {
                    payload: Some(payload),
                    ..Default::default()
                },
            )?;
        }

        report.lists_deactivated += 1;
        tracing::debug!(entity = %entity, "deactivated competing active list");
    }
    Ok(())
}
