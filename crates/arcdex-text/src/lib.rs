//! arcdex-text
//!
//! Tantivy-backed implementations of the indexing and query engines. See
//! `index` for scratch builds and `search` for read-only querying.

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::{TantivyIndexerEngine, TantivyIndexing};
pub use search::{TantivyQueryEngine, TantivyQueryHandle};
