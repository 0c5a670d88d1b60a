use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{ArchiveIdentity, Document, SearchHit};

/// Lazily produced documents of one archive.
pub type DocumentStream = Box<dyn Iterator<Item = Result<Document>> + Send>;

/// Lazily produced, best-first hits of one query execution.
pub type HitStream<'a> = Box<dyn Iterator<Item = Result<SearchHit>> + 'a>;

/// Reader for a packaged document collection.
pub trait ArchiveSource: Send + Sync {
    fn resolve_identity(&self, archive: &Path) -> Result<ArchiveIdentity>;
    fn document_count(&self, archive: &Path) -> Result<usize>;
    fn documents(&self, archive: &Path) -> Result<DocumentStream>;

    /// Cheap token that changes whenever the archive's content may have
    /// changed. `None` means there is none and the identity must be
    /// resolved afresh every time.
    fn revision(&self, _archive: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Persistent host settings the core reads but never writes.
pub trait SettingsStore: Send + Sync {
    fn root_path(&self) -> PathBuf;
    fn active_archive_path(&self) -> Option<PathBuf>;
    fn max_results(&self) -> usize;
}

/// Builds scratch indexes from archives.
pub trait IndexerEngine: Send + Sync + 'static {
    type Handle: IndexingHandle;

    fn open(&self, archive: &Path) -> Result<Self::Handle>;
}

/// One in-flight build over one archive.
///
/// Call `begin` once, then `index_next_unit` until it returns `false`, then
/// `finalize`. On failure the scratch directory is left for the caller.
pub trait IndexingHandle: Send + 'static {
    fn begin(&mut self, scratch: &Path) -> Result<()>;

    /// Process one unit of work; `Ok(true)` while more units remain.
    fn index_next_unit(&mut self) -> Result<bool>;

    fn percent_done(&self) -> u8;

    fn finalize(self) -> Result<()>;
}

/// Opens published indexes for querying.
pub trait QueryEngine: Send + Sync {
    type Handle: QueryHandle;

    fn open_read_only(&self, index: &Path) -> Result<Self::Handle>;
}

/// A read-only index handle; released on drop.
pub trait QueryHandle {
    fn search(&self, query: &str, max_results: usize) -> Result<HitStream<'_>>;

    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}
