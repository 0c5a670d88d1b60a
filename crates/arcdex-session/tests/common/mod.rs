#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arcdex_core::error::{Error, Result};
use arcdex_core::traits::{ArchiveSource, DocumentStream, IndexerEngine, IndexingHandle};
use arcdex_core::types::ArchiveIdentity;
use arcdex_session::{IndexingEvent, IndexingRun};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(20);

/// Archive whose identity is derived from its path and which holds no documents.
#[derive(Default)]
pub struct FixedArchive {
    pub unreadable: bool,
    gate: Mutex<Option<Receiver<()>>>,
}

impl FixedArchive {
    pub fn unreadable() -> Self {
        Self { unreadable: true, ..Self::default() }
    }

    /// The next identity lookup waits until the sender is used or dropped.
    pub fn gated() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self { gate: Mutex::new(Some(rx)), ..Self::default() }, tx)
    }
}

impl ArchiveSource for FixedArchive {
    fn resolve_identity(&self, archive: &Path) -> Result<ArchiveIdentity> {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            let _ = gate.recv();
        }
        if self.unreadable {
            return Err(Error::ArchiveOpen { path: archive.to_path_buf(), reason: "truncated header".into() });
        }
        Ok(ArchiveIdentity::of(archive.to_string_lossy().as_bytes()))
    }

    fn document_count(&self, _archive: &Path) -> Result<usize> {
        Ok(0)
    }

    fn documents(&self, _archive: &Path) -> Result<DocumentStream> {
        Ok(Box::new(std::iter::empty()))
    }
}

/// Engine that writes one marker file per unit and can be paused, failed or sabotaged.
#[derive(Default)]
pub struct ScriptedEngine {
    pub units: usize,
    pub fail_at: Option<usize>,
    pub vanish_on_finalize: bool,
    gate: Mutex<Option<Receiver<()>>>,
    pub scratch_seen_at_begin: Arc<Mutex<Vec<Vec<String>>>>,
    pub opened: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new(units: usize) -> Self {
        Self { units, ..Self::default() }
    }

    pub fn failing_at(mut self, unit: usize) -> Self {
        self.fail_at = Some(unit);
        self
    }

    /// Each unit waits for a ticket; dropping the sender lets every unit run freely.
    pub fn gated(self) -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(rx);
        (self, tx)
    }
}

pub struct ScriptedHandle {
    units: usize,
    done: usize,
    fail_at: Option<usize>,
    vanish_on_finalize: bool,
    gate: Option<Receiver<()>>,
    scratch: Option<PathBuf>,
    scratch_seen_at_begin: Arc<Mutex<Vec<Vec<String>>>>,
}

impl IndexerEngine for ScriptedEngine {
    type Handle = ScriptedHandle;

    fn open(&self, _archive: &Path) -> Result<ScriptedHandle> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            units: self.units,
            done: 0,
            fail_at: self.fail_at,
            vanish_on_finalize: self.vanish_on_finalize,
            gate: self.gate.lock().unwrap().take(),
            scratch: None,
            scratch_seen_at_begin: Arc::clone(&self.scratch_seen_at_begin),
        })
    }
}

impl IndexingHandle for ScriptedHandle {
    fn begin(&mut self, scratch: &Path) -> Result<()> {
        let mut entries: Vec<String> = fs::read_dir(scratch)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        self.scratch_seen_at_begin.lock().unwrap().push(entries);
        fs::write(scratch.join("meta.json"), "{}")?;
        self.scratch = Some(scratch.to_path_buf());
        Ok(())
    }

    fn index_next_unit(&mut self) -> Result<bool> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.done += 1;
        if self.fail_at == Some(self.done) {
            return Err(Error::indexing(format!("disk full at unit {}", self.done)));
        }
        let scratch = self.scratch.as_ref().ok_or_else(|| Error::indexing("not begun"))?;
        fs::write(scratch.join(format!("unit-{:03}", self.done)), "")?;
        Ok(self.done < self.units)
    }

    fn percent_done(&self) -> u8 {
        if self.units == 0 {
            return 100;
        }
        u8::try_from(self.done * 100 / self.units).unwrap_or(100)
    }

    fn finalize(self) -> Result<()> {
        if self.vanish_on_finalize {
            if let Some(scratch) = &self.scratch {
                fs::remove_dir_all(scratch)?;
            }
        }
        Ok(())
    }
}

pub async fn next(run: &mut IndexingRun) -> IndexingEvent {
    tokio::time::timeout(EVENT_TIMEOUT, run.next_event())
        .await
        .expect("event within timeout")
        .expect("run still open")
}

pub async fn drain(run: IndexingRun) -> Vec<IndexingEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, run.drain()).await.expect("run ends within timeout")
}

pub fn progress_of(events: &[IndexingEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            IndexingEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}
