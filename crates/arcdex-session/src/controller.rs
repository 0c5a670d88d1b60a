use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use arcdex_core::error::{Error, Result};
use arcdex_core::traits::{ArchiveSource, QueryEngine, QueryHandle, SettingsStore};
use arcdex_core::types::{ArchiveIdentity, SearchHit, SearchOutcome};
use arcdex_core::IndexStore;

struct CachedIdentity {
    archive: PathBuf,
    revision: String,
    identity: ArchiveIdentity,
}

/// Validates user queries and runs them against the active archive's index.
pub struct SearchController<Q: QueryEngine> {
    engine: Q,
    archives: Arc<dyn ArchiveSource>,
    settings: Arc<dyn SettingsStore>,
    identity_cache: Mutex<Option<CachedIdentity>>,
}

impl<Q: QueryEngine> SearchController<Q> {
    pub fn new(engine: Q, archives: Arc<dyn ArchiveSource>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { engine, archives, settings, identity_cache: Mutex::new(None) }
    }

    /// Trim and case-fold raw input; blank input is rejected.
    pub fn normalize(raw: &str) -> Result<String> {
        let query = raw.trim().to_lowercase();
        if query.is_empty() { Err(Error::EmptyQuery) } else { Ok(query) }
    }

    /// Published index location of the active archive, whether or not it exists yet.
    pub fn index_path(&self) -> Result<PathBuf> {
        let archive = self.settings.active_archive_path().ok_or(Error::NoActiveArchive)?;
        let identity = self.identity_of(&archive)?;
        Ok(IndexStore::new(self.settings.root_path()).final_path(&identity))
    }

    /// True when the active archive has a published index.
    pub fn is_searchable(&self) -> bool {
        self.index_path().is_ok_and(|p| p.is_dir())
    }

    pub fn search(&self, raw: &str) -> Result<SearchOutcome> {
        let query = Self::normalize(raw)?;
        let index = self.index_path()?;
        let handle = self.engine.open_read_only(&index)?;
        let mut all = handle
            .search(&query, self.settings.max_results())?
            .collect::<Result<Vec<SearchHit>>>()?;
        handle.close();

        // Stable, so equal scores keep the engine's order.
        all.sort_by(|a, b| b.score.total_cmp(&a.score));
        info!(query = %query, hits = all.len(), "search complete");
        Ok(match all.first().cloned() {
            None => SearchOutcome::NoResults,
            Some(best) => SearchOutcome::Results { best, all },
        })
    }

    /// Identity of `archive`, reused while its revision token is unchanged.
    fn identity_of(&self, archive: &Path) -> Result<ArchiveIdentity> {
        let Some(revision) = self.archives.revision(archive)? else {
            return self.archives.resolve_identity(archive);
        };
        let mut cache = self.identity_cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            if cached.archive == archive && cached.revision == revision {
                return Ok(cached.identity.clone());
            }
        }
        let identity = self.archives.resolve_identity(archive)?;
        debug!(archive = %archive.display(), %identity, "cached archive identity");
        *cache = Some(CachedIdentity { archive: archive.to_path_buf(), revision, identity: identity.clone() });
        Ok(identity)
    }
}
