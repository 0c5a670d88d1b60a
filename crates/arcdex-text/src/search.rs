use std::path::{Path, PathBuf};

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{DocAddress, Index, ReloadPolicy, Score, Searcher, TantivyDocument};
use tracing::{debug, warn};

use arcdex_core::error::{Error, Result};
use arcdex_core::traits::{HitStream, QueryEngine, QueryHandle};
use arcdex_core::types::SearchHit;

use crate::tantivy_utils::{register_tokenizer, ArchiveFields};

/// Opens published archive indexes read-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TantivyQueryEngine;

impl TantivyQueryEngine {
	pub fn new() -> Self {
		Self
	}
}

impl QueryEngine for TantivyQueryEngine {
	type Handle = TantivyQueryHandle;

	fn open_read_only(&self, index_dir: &Path) -> Result<TantivyQueryHandle> {
		if !index_dir.is_dir() {
			return Err(Error::IndexNotFound(index_dir.to_path_buf()));
		}
		let not_found = |e: tantivy::TantivyError| {
			debug!(path = %index_dir.display(), error = %e, "not a recognised index");
			Error::IndexNotFound(index_dir.to_path_buf())
		};
		let index = Index::open_in_dir(index_dir).map_err(not_found)?;
		let fields = ArchiveFields::from_schema(&index.schema()).map_err(not_found)?;
		register_tokenizer(&index);
		let reader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.map_err(not_found)?;
		Ok(TantivyQueryHandle { path: index_dir.to_path_buf(), index, searcher: reader.searcher(), fields })
	}
}

/// A read-only view of one published index. Dropping it releases the index.
pub struct TantivyQueryHandle {
	path: PathBuf,
	index: Index,
	searcher: Searcher,
	fields: ArchiveFields,
}

impl TantivyQueryHandle {
	pub fn num_docs(&self) -> u64 {
		self.searcher.num_docs()
	}
}

impl QueryHandle for TantivyQueryHandle {
	fn search(&self, query: &str, max_results: usize) -> Result<HitStream<'_>> {
		if max_results == 0 {
			return Ok(Box::new(std::iter::empty()));
		}
		let parser = QueryParser::for_index(&self.index, vec![self.fields.title, self.fields.body]);
		let (parsed, errors) = parser.parse_query_lenient(query);
		if !errors.is_empty() {
			warn!(query, errors = errors.len(), "query parsed leniently");
		}
		let top_docs = self
			.searcher
			.search(&parsed, &TopDocs::with_limit(max_results))
			.map_err(|e| Error::indexing(format!("search in {} failed: {}", self.path.display(), e)))?;
		debug!(query, hits = top_docs.len(), "executed query");
		Ok(Box::new(Hits { searcher: &self.searcher, fields: self.fields, top_docs: top_docs.into_iter() }))
	}
}

/// Best-first hits; stored fields are loaded as the iterator advances.
struct Hits<'a> {
	searcher: &'a Searcher,
	fields: ArchiveFields,
	top_docs: std::vec::IntoIter<(Score, DocAddress)>,
}

impl Iterator for Hits<'_> {
	type Item = Result<SearchHit>;

	fn next(&mut self) -> Option<Self::Item> {
		let (score, address) = self.top_docs.next()?;
		Some(self.load(score, address))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.top_docs.size_hint()
	}
}

impl Hits<'_> {
	fn load(&self, score: Score, address: DocAddress) -> Result<SearchHit> {
		let doc: TantivyDocument = self.searcher.doc(address).map_err(Error::indexing)?;
		let text = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		Ok(SearchHit { document_url: text(self.fields.url), title: text(self.fields.title), score })
	}
}
