//! Test fixtures and store helpers.
//!
//! Provides stores over temporary directories and failing backends, a
//! fully wired engine over an in-memory remote, and entity builders.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasksync_engine::{MemoryRemote, RetryConfig, StaticSession, SyncConfig, TaskSync};
use tasksync_model::{
    format_iso, DeleteState, ManualClock, Quadrant, QueueItem, QueueStatus, RemoteTask,
    RemoteTaskList, ViewMode,
};
use tasksync_store::{
    InMemoryBackend, LocalStore, StorageBackend, StoreConfig, StoreError, StoreResult,
};
use tempfile::TempDir;

/// Start time of every manual clock handed out by this crate.
pub const TEST_EPOCH: i64 = 1_700_000_000_000;

/// A manual clock at [`TEST_EPOCH`].
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(TEST_EPOCH))
}

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: LocalStore,
    /// The clock the store stamps with.
    pub clock: Arc<ManualClock>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        let clock = test_clock();
        Self {
            store: LocalStore::in_memory(clock.clone()),
            clock,
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed test store.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = test_clock();
        let store = LocalStore::open_path(
            &temp_dir.path().join("store"),
            &StoreConfig::default(),
            clock.clone(),
        )
        .expect("Failed to open file store");
        Self {
            store,
            clock,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store"))
    }

    /// Closes the store and opens the same directory again.
    ///
    /// # Panics
    ///
    /// Panics for an in-memory store.
    pub fn reopen(self) -> Self {
        let path = self.path().expect("Only file stores can be reopened");
        let Self {
            store,
            clock,
            _temp_dir,
        } = self;
        drop(store);

        let store = LocalStore::open_path(&path, &StoreConfig::default(), clock.clone())
            .expect("Failed to reopen file store");
        Self {
            store,
            clock,
            _temp_dir,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Toggle shared with a [`FailingBackend`].
#[derive(Debug, Clone, Default)]
pub struct FailSwitch(Arc<AtomicBool>);

impl FailSwitch {
    /// Makes every following write fail.
    pub fn fail(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Lets writes through again.
    pub fn recover(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn is_failing(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An in-memory backend whose writes can be made to fail.
#[derive(Debug)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    switch: FailSwitch,
}

impl FailingBackend {
    /// Creates a backend and the switch controlling it.
    pub fn new() -> (Self, FailSwitch) {
        let switch = FailSwitch::default();
        let backend = Self {
            inner: InMemoryBackend::new(),
            switch: switch.clone(),
        };
        (backend, switch)
    }
}

impl StorageBackend for FailingBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        self.inner.load()
    }

    fn store(&mut self, snapshot: &[u8]) -> StoreResult<()> {
        if self.switch.is_failing() {
            return Err(StoreError::backend("injected write failure"));
        }
        self.inner.store(snapshot)
    }

    fn describe(&self) -> String {
        "failing-memory".to_string()
    }
}

/// A store over a [`FailingBackend`], with its switch.
pub fn failing_store() -> (LocalStore, FailSwitch, Arc<ManualClock>) {
    let (backend, switch) = FailingBackend::new();
    let clock = test_clock();
    let store = LocalStore::open(Box::new(backend), clock.clone())
        .expect("Failed to open failing store");
    (store, switch, clock)
}

/// Engine settings for deterministic tests.
///
/// No background retries, no throttle, and a short backoff.
pub fn test_config() -> SyncConfig {
    SyncConfig::new()
        .with_auto_retry(false)
        .with_drain_throttle(Duration::ZERO)
        .with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(5))
                .with_max_delay(Duration::from_millis(20))
                .with_jitter(false),
        )
}

/// A wired engine over a manual clock and an in-memory remote.
pub struct Harness {
    /// Clock shared by the store.
    pub clock: Arc<ManualClock>,
    /// Local store.
    pub store: Arc<LocalStore>,
    /// Remote backend.
    pub remote: Arc<MemoryRemote>,
    /// Session.
    pub session: Arc<StaticSession>,
    /// Facade under test.
    pub sync: TaskSync,
}

impl Harness {
    /// A signed-out harness with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// A harness signed in as `user` with [`test_config`].
    pub fn signed_in(user: &str) -> Self {
        let harness = Self::new();
        harness.session.sign_in(user);
        harness
    }

    /// A signed-out harness with the given settings.
    pub fn with_config(config: SyncConfig) -> Self {
        let clock = test_clock();
        let store = Arc::new(LocalStore::in_memory(clock.clone()));
        let remote = Arc::new(MemoryRemote::new());
        let session = Arc::new(StaticSession::new());
        let sync = TaskSync::new(store.clone(), remote.clone(), session.clone(), config);
        Self {
            clock,
            store,
            remote,
            session,
            sync,
        }
    }

    /// Advances the clock by `ms` milliseconds.
    pub fn tick(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    /// Queue items in one state.
    pub fn queue(&self, status: QueueStatus) -> Vec<QueueItem> {
        self.store.list_by_status(status)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// ISO text for a millisecond offset from [`TEST_EPOCH`].
pub fn iso_at(offset_ms: i64) -> String {
    format_iso(TEST_EPOCH + offset_ms).expect("Timestamp out of range")
}

/// A remote list row as another device would have written it.
pub fn remote_task_list(
    owner: &str,
    id: &str,
    name: &str,
    is_active: bool,
    updated_offset_ms: i64,
) -> RemoteTaskList {
    RemoteTaskList {
        id: id.to_string(),
        name: name.to_string(),
        is_active,
        deleted: DeleteState::Active,
        layout_view: ViewMode::Matrix,
        show_completed: true,
        user_id: Some(owner.to_string()),
        created_at: iso_at(0),
        updated_at: iso_at(updated_offset_ms),
    }
}

/// A remote task row as another device would have written it.
pub fn remote_task(
    owner: &str,
    id: &str,
    list_id: &str,
    text: &str,
    updated_offset_ms: i64,
) -> RemoteTask {
    RemoteTask {
        id: id.to_string(),
        text: text.to_string(),
        is_completed: false,
        deleted: DeleteState::Active,
        quadrant: Quadrant::UrgentImportant,
        list_id: list_id.to_string(),
        estimate_text: String::new(),
        sort_order: 0,
        user_id: Some(owner.to_string()),
        created_at: iso_at(0),
        updated_at: iso_at(updated_offset_ms),
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Returns true if `path` holds a committed snapshot.
pub fn has_snapshot(path: &Path) -> bool {
    path.join("store.cbor").exists()
}
