//! On-disk layout of published and in-progress indexes.
//!
//! ```text
//! <root>/<identity>.index/   finished index, never written in place
//! <root>/tmpindex/           the single scratch slot
//! ```
//!
//! A finished index only ever appears through a directory rename, so a reader
//! either sees no index, the previous one, or the complete new one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{ArchiveIdentity, IndexLocation};

pub const SCRATCH_DIR_NAME: &str = "tmpindex";
const RETIRED_SUFFIX: &str = "retired";

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn scratch_path(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR_NAME)
    }

    pub fn final_path(&self, identity: &ArchiveIdentity) -> PathBuf {
        self.root.join(identity.index_dir_name())
    }

    pub fn location_for(&self, identity: &ArchiveIdentity) -> IndexLocation {
        IndexLocation { final_path: self.final_path(identity), scratch_path: self.scratch_path() }
    }

    /// True only when the published path is a directory; a stray file does not count.
    pub fn exists(&self, identity: &ArchiveIdentity) -> bool {
        self.final_path(identity).is_dir()
    }

    /// Remove whatever occupies the scratch slot. Missing is fine.
    pub fn clear_scratch(&self) -> Result<()> {
        let scratch = self.scratch_path();
        remove_any(&scratch)
            .map_err(|e| Error::Scratch { path: scratch.clone(), reason: format!("cannot remove: {}", e) })?;
        debug!(path = %scratch.display(), "cleared scratch slot");
        Ok(())
    }

    /// Create an empty scratch directory. Fails with `Conflict` if one is already there.
    pub fn begin_scratch(&self) -> Result<PathBuf> {
        let scratch = self.scratch_path();
        if let Err(e) = fs::create_dir_all(&self.root) {
            let reason = format!("cannot create index root {}: {}", self.root.display(), e);
            return Err(Error::Scratch { path: scratch, reason });
        }
        match fs::create_dir(&scratch) {
            Ok(()) => Ok(scratch),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::Conflict(scratch)),
            Err(e) => Err(Error::Scratch { path: scratch, reason: e.to_string() }),
        }
    }

    /// Atomically make `scratch` the published index of `identity`.
    ///
    /// An existing index is moved aside first and put back if the rename fails.
    /// Between the two renames `final_path` is briefly absent, so a reader
    /// opening it right then sees no index rather than a partial one. A stray
    /// file at `final_path` is not an index and is simply removed.
    /// On failure the scratch directory is left untouched.
    pub fn publish(&self, scratch: &Path, identity: &ArchiveIdentity) -> Result<PathBuf> {
        let final_path = self.final_path(identity);
        let publish_err = |e: std::io::Error| Error::Publish { path: final_path.clone(), reason: e.to_string() };

        let retired = match fs::symlink_metadata(&final_path) {
            Ok(meta) if meta.is_dir() => {
                let retired = self.root.join(format!("{}.{}", identity.index_dir_name(), RETIRED_SUFFIX));
                remove_any(&retired).map_err(publish_err)?;
                fs::rename(&final_path, &retired).map_err(publish_err)?;
                Some(retired)
            }
            Ok(_) => {
                warn!(path = %final_path.display(), "removing stray file in place of index");
                fs::remove_file(&final_path).map_err(publish_err)?;
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(publish_err(e)),
        };

        if let Err(e) = fs::rename(scratch, &final_path) {
            if let Some(retired) = &retired {
                if let Err(restore) = fs::rename(retired, &final_path) {
                    warn!(path = %final_path.display(), error = %restore, "could not restore previous index");
                }
            }
            return Err(publish_err(e));
        }

        if let Some(retired) = retired {
            if let Err(e) = remove_any(&retired) {
                warn!(path = %retired.display(), error = %e, "could not remove replaced index");
            }
        }
        info!(identity = %identity, path = %final_path.display(), "published index");
        Ok(final_path)
    }
}

/// Remove a file or directory tree at `path`; missing is fine.
fn remove_any(path: &Path) -> std::io::Result<()> {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match removed {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
