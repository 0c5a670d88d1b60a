//! Background indexing lifecycle.
//!
//! ```text
//! Idle --start--> Running --unit--> Running
//! Running --all units--> Publishing --ok--> Idle                 (Finished)
//! Running | Publishing --failure--> Failed --> Idle              (Error)
//! Running --cancel--> Cancelled --> Idle                         (Cancelled)
//! ```
//!
//! Every run under an index root writes to that root's single scratch slot,
//! so the run guard is shared process-wide by all sessions over the same
//! root: at most one run is active there regardless of which archive it
//! targets. The state is back to `Idle` before the terminal event is sent,
//! so a subscriber may call [`IndexingSession::start`] again as soon as it
//! sees it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use arcdex_core::error::{Error, Result};
use arcdex_core::traits::{ArchiveSource, IndexerEngine, IndexingHandle, SettingsStore};
use arcdex_core::types::ArchiveIdentity;
use arcdex_core::IndexStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Publishing,
    Failed,
    Cancelled,
}

/// Lifecycle notifications of one indexing run, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingEvent {
    StartedIndexing,
    /// Percent complete; never decreases within a run.
    Progress(u8),
    Finished { identity: ArchiveIdentity, index_path: PathBuf },
    Cancelled,
    Error { reason: String },
}

struct Slot {
    state: SessionState,
    cancel: Option<CancellationToken>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run guards of every index root in the process, keyed by canonical root.
static ROOT_SLOTS: OnceLock<Mutex<HashMap<PathBuf, Weak<Mutex<Slot>>>>> = OnceLock::new();

/// The guard shared by all live sessions over `root`.
fn slot_for_root(root: &Path) -> Arc<Mutex<Slot>> {
    let key = canonical_root(root);
    let mut slots = ROOT_SLOTS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(slot) = slots.get(&key).and_then(Weak::upgrade) {
        return slot;
    }
    slots.retain(|_, slot| slot.strong_count() > 0);
    let slot = Arc::new(Mutex::new(Slot { state: SessionState::Idle, cancel: None }));
    slots.insert(key, Arc::downgrade(&slot));
    slot
}

/// `root` may not exist yet; resolve through its parent so it keys the same before and after creation.
fn canonical_root(root: &Path) -> PathBuf {
    if let Ok(path) = fs::canonicalize(root) {
        return path;
    }
    match (root.parent(), root.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| root.to_path_buf()),
        _ => root.to_path_buf(),
    }
}

pub struct IndexingSession<E: IndexerEngine> {
    engine: Arc<E>,
    archives: Arc<dyn ArchiveSource>,
    settings: Arc<dyn SettingsStore>,
    store: IndexStore,
    slot: Arc<Mutex<Slot>>,
}

impl<E: IndexerEngine> IndexingSession<E> {
    /// The index root is read from `settings` once, here.
    pub fn new(engine: E, archives: Arc<dyn ArchiveSource>, settings: Arc<dyn SettingsStore>) -> Self {
        let root = settings.root_path();
        Self {
            engine: Arc::new(engine),
            archives,
            settings,
            slot: slot_for_root(&root),
            store: IndexStore::new(root),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.slot).state
    }

    pub fn is_indexing(&self) -> bool {
        self.state() != SessionState::Idle
    }

    /// Index the configured active archive.
    pub fn start(&self) -> Result<IndexingRun> {
        self.start_archive(self.settings.active_archive_path())
    }

    /// Index `archive` on the tokio blocking pool.
    ///
    /// Must be called from within a tokio runtime. Rejected with
    /// `AlreadyIndexing` while any session over the same root is busy, and
    /// with `NoActiveArchive` when `archive` is `None`.
    pub fn start_archive(&self, archive: Option<PathBuf>) -> Result<IndexingRun> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let (archive, cancel) = {
            let mut slot = lock(&self.slot);
            if slot.state != SessionState::Idle {
                return Err(Error::AlreadyIndexing);
            }
            let archive = archive.ok_or(Error::NoActiveArchive)?;
            let cancel = CancellationToken::new();
            slot.state = SessionState::Running;
            slot.cancel = Some(cancel.clone());
            (archive, cancel)
        };

        let (events, receiver) = mpsc::unbounded_channel();
        let _ = events.send(IndexingEvent::StartedIndexing);
        info!(archive = %archive.display(), "indexing started");

        let worker = Worker {
            engine: Arc::clone(&self.engine),
            archives: Arc::clone(&self.archives),
            store: self.store.clone(),
            archive,
            cancel,
            slot: Arc::clone(&self.slot),
            events,
            last_percent: 0,
            settled: false,
        };
        let task = runtime.spawn_blocking(move || worker.run());
        Ok(IndexingRun { events: receiver, task })
    }

    /// Ask the running build to stop after its current unit.
    pub fn cancel(&self) -> Result<()> {
        let slot = lock(&self.slot);
        match (slot.state, &slot.cancel) {
            (SessionState::Running, Some(token)) => {
                token.cancel();
                info!("indexing cancellation requested");
                Ok(())
            }
            _ => Err(Error::NotRunning),
        }
    }
}

/// Subscription to one run's events. Dropping it unsubscribes; the run continues.
pub struct IndexingRun {
    events: UnboundedReceiver<IndexingEvent>,
    task: JoinHandle<()>,
}

impl IndexingRun {
    pub async fn next_event(&mut self) -> Option<IndexingEvent> {
        self.events.recv().await
    }

    /// Wait for the run to end and return the events not yet received.
    pub async fn drain(mut self) -> Vec<IndexingEvent> {
        let mut remaining = Vec::new();
        while let Some(event) = self.events.recv().await {
            remaining.push(event);
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "indexing task did not complete cleanly");
        }
        remaining
    }
}

enum Outcome {
    Published { identity: ArchiveIdentity, index_path: PathBuf },
    Cancelled,
}

struct Worker<E: IndexerEngine> {
    engine: Arc<E>,
    archives: Arc<dyn ArchiveSource>,
    store: IndexStore,
    archive: PathBuf,
    cancel: CancellationToken,
    slot: Arc<Mutex<Slot>>,
    events: UnboundedSender<IndexingEvent>,
    last_percent: u8,
    settled: bool,
}

impl<E: IndexerEngine> Worker<E> {
    fn run(mut self) {
        match self.build() {
            Ok(Outcome::Published { identity, index_path }) => {
                info!(%identity, path = %index_path.display(), "indexing finished");
                self.emit_progress(100);
                self.settle(None, IndexingEvent::Finished { identity, index_path });
            }
            Ok(Outcome::Cancelled) => {
                info!(archive = %self.archive.display(), "indexing cancelled");
                self.settle(Some(SessionState::Cancelled), IndexingEvent::Cancelled);
            }
            Err(e) => {
                warn!(archive = %self.archive.display(), error = %e, "indexing failed");
                let reason = match e {
                    Error::Io(io) => format!("I/O error while indexing {}: {}", self.archive.display(), io),
                    other => other.to_string(),
                };
                self.settle(Some(SessionState::Failed), IndexingEvent::Error { reason });
            }
        }
    }

    fn build(&mut self) -> Result<Outcome> {
        let identity = self.archives.resolve_identity(&self.archive)?;
        if self.cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        self.store.clear_scratch()?;
        let scratch = self.store.begin_scratch()?;
        debug!(%identity, scratch = %scratch.display(), final_path = %self.store.final_path(&identity).display(), "scratch ready");

        let mut handle = self.engine.open(&self.archive)?;
        if self.cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        handle.begin(&scratch)?;
        self.emit_progress(0);
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }
            let more = handle.index_next_unit()?;
            self.emit_progress(handle.percent_done());
            if !more {
                break;
            }
        }

        if !self.enter_publishing() {
            return Ok(Outcome::Cancelled);
        }
        handle.finalize()?;
        let index_path = self.store.publish(&scratch, &identity)?;
        Ok(Outcome::Published { identity, index_path })
    }

    /// Running -> Publishing, unless a cancel got in first.
    fn enter_publishing(&self) -> bool {
        let mut slot = lock(&self.slot);
        if self.cancel.is_cancelled() {
            return false;
        }
        slot.state = SessionState::Publishing;
        true
    }

    fn emit_progress(&mut self, percent: u8) {
        let percent = percent.clamp(self.last_percent, 100);
        self.last_percent = percent;
        self.send(IndexingEvent::Progress(percent));
    }

    fn send(&self, event: IndexingEvent) {
        if self.events.send(event).is_err() {
            debug!("indexing event dropped, no subscriber");
        }
    }

    /// Pass through `through` (cleaning the scratch slot), return to `Idle`, then notify.
    fn settle(&mut self, through: Option<SessionState>, event: IndexingEvent) {
        if let Some(state) = through {
            lock(&self.slot).state = state;
            if let Err(e) = self.store.clear_scratch() {
                warn!(error = %e, "could not remove scratch index");
            }
        }
        {
            let mut slot = lock(&self.slot);
            slot.state = SessionState::Idle;
            slot.cancel = None;
        }
        self.settled = true;
        self.send(event);
    }
}

impl<E: IndexerEngine> Drop for Worker<E> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(
                Some(SessionState::Failed),
                IndexingEvent::Error { reason: "indexing task stopped unexpectedly".into() },
            );
        }
    }
}
