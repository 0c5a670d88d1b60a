//! Domain types shared by the indexing and query engines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Content-derived identity of an archive.
///
/// Rendered as a lowercase hex digest. Two archives with identical content
/// resolve to the same identity, so it is the only key used to name a
/// published index directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveIdentity(String);

impl ArchiveIdentity {
    /// Derive an identity from an archive's internal id bytes.
    pub fn of(internal_id: &[u8]) -> Self {
        Self::from_hash(blake3::hash(internal_id))
    }

    pub fn from_hash(hash: blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name of the published index for this identity.
    pub fn index_dir_name(&self) -> String {
        format!("{}.index", self.0)
    }
}

impl fmt::Display for ArchiveIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the finished index for one archive lives, and the shared scratch slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocation {
    pub final_path: PathBuf,
    pub scratch_path: PathBuf,
}

/// One article read out of an archive.
///
/// - `url`: archive-relative address, always `/`-separated
/// - `title`: display title
/// - `body`: full text payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub body: String,
}

/// A ranked query result.
///
/// `score` is engine-specific; higher is better and it is only meaningful
/// for ordering hits of the same index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_url: String,
    pub title: String,
    pub score: f32,
}

impl SearchHit {
    pub const URI_SCHEME: &'static str = "archive";

    /// Address a host uses to load the hit's document from the archive.
    pub fn archive_uri(&self) -> String {
        format!("{}://{}", Self::URI_SCHEME, self.document_url)
    }
}

/// Result of a validated search request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query ran but matched nothing.
    NoResults,
    /// `best` is always `all[0]`.
    Results { best: SearchHit, all: Vec<SearchHit> },
}
