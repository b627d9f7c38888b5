//! Connectivity and session lifecycle.
//!
//! Sequences the work that runs without a user asking for it:
//!
//! ```text
//! SessionStarted(owner) → claim ownerless data → pull → drain
//! NetworkRestored       → (pull, if one was missed) → drain
//!                          (a failed pull is logged; the drain still runs)
//! RetryDue              → drain
//! ```

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::{DrainReport, SyncExecutor};
use crate::merge::{MergeEngine, PullReport};
use crate::session::{LifecycleEvent, SessionProvider};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tasksync_model::{NewOperation, Payload};
use tasksync_store::LocalStore;
use tokio::sync::mpsc;

/// Entities claimed at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimReport {
    /// Claimed task lists.
    pub task_lists: usize,
    /// Claimed tasks.
    pub tasks: usize,
}

impl ClaimReport {
    /// Total claimed entities.
    pub fn total(&self) -> usize {
        self.task_lists + self.tasks
    }
}

/// What a session start did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStartReport {
    /// Claimed entities.
    pub claimed: ClaimReport,
    /// Pull outcome; `None` when offline or the pull failed.
    pub pull: Option<PullReport>,
    /// Drain outcome; `None` when offline.
    pub drain: Option<DrainReport>,
}

/// Drives claim, pull and drain from lifecycle events.
pub struct Coordinator {
    store: Arc<LocalStore>,
    executor: Arc<SyncExecutor>,
    merge: Arc<MergeEngine>,
    session: Arc<dyn SessionProvider>,
    config: SyncConfig,
    online: AtomicBool,
    started: AtomicBool,
    pull_missed: AtomicBool,
    retry_attempt: AtomicU32,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
}

impl Coordinator {
    /// Creates a coordinator. Nothing runs until [`Coordinator::start`].
    pub fn new(
        store: Arc<LocalStore>,
        executor: Arc<SyncExecutor>,
        merge: Arc<MergeEngine>,
        session: Arc<dyn SessionProvider>,
        config: SyncConfig,
    ) -> Self {
        let (events, inbox) = mpsc::unbounded_channel();
        Self {
            store,
            executor,
            merge,
            session,
            config,
            online: AtomicBool::new(true),
            started: AtomicBool::new(false),
            pull_missed: AtomicBool::new(false),
            retry_attempt: AtomicU32::new(0),
            events,
            inbox: Mutex::new(Some(inbox)),
        }
    }

    /// Spawns the event loop on the current tokio runtime.
    ///
    /// Returns `Ok(false)` if the loop was already started; a coordinator
    /// starts at most once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` when called outside a tokio runtime.
    pub fn start(self: &Arc<Self>) -> SyncResult<bool> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SyncError::InvalidOperation("no tokio runtime".into()))?;

        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("coordinator already started");
            return Ok(false);
        }
        let Some(mut inbox) = self.inbox.lock().take() else {
            return Ok(false);
        };

        // Weak: the coordinator owns the sender, so a strong handle would keep the channel open forever.
        let this = Arc::downgrade(self);
        runtime.spawn(async move {
            while let Some(event) = inbox.recv().await {
                let Some(this) = this.upgrade() else {
                    break;
                };
                if let Err(err) = this.handle(event.clone()).await {
                    tracing::warn!(?event, error = %err, "lifecycle event failed");
                }
            }
            tracing::debug!("coordinator loop stopped");
        });
        tracing::debug!("coordinator started");
        Ok(true)
    }

    /// Returns true once [`Coordinator::start`] has run.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Queues an event for the loop.
    pub fn notify(&self, event: LifecycleEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("lifecycle loop has stopped; event dropped");
        }
    }

    /// A sender for lifecycle events.
    pub fn sender(&self) -> mpsc::UnboundedSender<LifecycleEvent> {
        self.events.clone()
    }

    /// Returns the last known connectivity.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records connectivity without triggering anything.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Handles one event inline.
    pub async fn handle(&self, event: LifecycleEvent) -> SyncResult<()> {
        match event {
            LifecycleEvent::SessionStarted(owner) => {
                self.on_session_start(&owner).await?;
            }
            LifecycleEvent::SessionEnded => {
                self.executor.confirmed().clear();
                self.retry_attempt.store(0, Ordering::SeqCst);
                tracing::info!("session ended");
            }
            LifecycleEvent::NetworkRestored => {
                self.set_online(true);
                tracing::info!("network restored");
                if self.session.current_user().is_some() {
                    if self.pull_missed.load(Ordering::SeqCst) {
                        if let Err(err) = self.pull().await {
                            tracing::warn!(error = %err, "pull after network restore failed");
                        }
                    }
                    self.drain().await?;
                }
            }
            LifecycleEvent::NetworkLost => {
                self.set_online(false);
                tracing::info!("network lost");
            }
            LifecycleEvent::RetryDue => {
                if self.session.current_user().is_some() {
                    self.drain().await?;
                }
            }
        }
        Ok(())
    }

    /// Claims ownerless data for `owner`, then pulls and drains.
    ///
    /// A failed pull is logged and retried on the next network restore;
    /// the drain still runs since queued work is independent of it.
    pub async fn on_session_start(&self, owner: &str) -> SyncResult<SessionStartReport> {
        let claimed = self.claim(owner)?;
        let mut report = SessionStartReport {
            claimed,
            ..Default::default()
        };

        if !self.is_online() {
            self.pull_missed.store(true, Ordering::SeqCst);
            tracing::info!(owner, "offline at session start; pull and drain deferred");
            return Ok(report);
        }

        match self.pull_as(owner).await {
            Ok(pull) => report.pull = Some(pull),
            Err(err) => tracing::warn!(owner, error = %err, "pull at session start failed"),
        }
        report.drain = Some(self.drain_as(owner).await?);
        Ok(report)
    }

    /// Assigns `owner` to every entity that has none and queues their
    /// `add` operations, lists before tasks.
    ///
    /// Claimed lists are made inactive so they cannot collide with the
    /// owner's remote active list.
    pub fn claim(&self, owner: &str) -> SyncResult<ClaimReport> {
        let report = self.store.transaction(|txn| {
            let (lists, tasks) = txn.view().ownerless();

            let mut owner_fields = Payload::new();
            owner_fields.insert("ownerId".into(), Value::from(owner));
            let mut list_fields = owner_fields.clone();
            list_fields.insert("isActive".into(), Value::from(0));

            let mut operations = Vec::with_capacity(lists.len() + tasks.len());
            for list in &lists {
                let claimed = txn.update_task_list(&list.id, &list_fields)?;
                operations.push(NewOperation::add(&claimed)?);
            }
            for task in &tasks {
                let claimed = txn.update_task(&task.id, &owner_fields)?;
                operations.push(NewOperation::add(&claimed)?);
            }
            txn.enqueue_batch(operations)?;

            Ok(ClaimReport {
                task_lists: lists.len(),
                tasks: tasks.len(),
            })
        })?;

        if report.total() > 0 {
            tracing::info!(
                owner,
                task_lists = report.task_lists,
                tasks = report.tasks,
                "claimed local data"
            );
        }
        Ok(report)
    }

    /// Pulls for the signed-in user.
    pub async fn pull(&self) -> SyncResult<PullReport> {
        let owner = self.current_owner()?;
        self.pull_as(&owner).await
    }

    /// Drains for the signed-in user. Does nothing while offline.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        let owner = self.current_owner()?;
        if !self.is_online() {
            tracing::debug!(owner = %owner, "offline; drain deferred");
            return Ok(DrainReport::default());
        }
        self.drain_as(&owner).await
    }

    fn current_owner(&self) -> SyncResult<String> {
        self.session
            .current_user()
            .ok_or(SyncError::NotAuthenticated)
    }

    async fn pull_as(&self, owner: &str) -> SyncResult<PullReport> {
        match self.merge.pull(owner).await {
            Ok(report) => {
                self.pull_missed.store(false, Ordering::SeqCst);
                Ok(report)
            }
            Err(err) => {
                self.pull_missed.store(true, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    async fn drain_as(&self, owner: &str) -> SyncResult<DrainReport> {
        let report = self.executor.drain(owner).await?;
        if report.busy {
            return Ok(report);
        }
        if report.needs_retry() {
            self.schedule_retry();
        } else {
            self.retry_attempt.store(0, Ordering::SeqCst);
        }
        Ok(report)
    }

    /// Sends `RetryDue` to the loop after the backoff delay.
    fn schedule_retry(&self) {
        if !self.config.auto_retry || !self.is_started() {
            return;
        }
        let attempt = self.retry_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.config.retry.delay_for_attempt(attempt);
        let events = self.events.clone();
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "re-drain scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(LifecycleEvent::RetryDue).is_err() {
                tracing::warn!("lifecycle loop has stopped; re-drain dropped");
            }
        });
    }
}
