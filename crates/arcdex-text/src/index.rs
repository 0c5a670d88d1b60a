use std::path::{Path, PathBuf};
use std::sync::Arc;

use tantivy::{doc, Index, IndexWriter};
use tracing::{debug, info};

use arcdex_core::config::DEFAULT_WRITER_MEMORY_BYTES;
use arcdex_core::error::{Error, Result};
use arcdex_core::traits::{ArchiveSource, DocumentStream, IndexerEngine, IndexingHandle};

use crate::tantivy_utils::{build_schema, register_tokenizer, ArchiveFields};

/// Number of units a full archive is split into; one unit is one percent.
const UNITS_PER_ARCHIVE: usize = 100;

pub struct TantivyIndexerEngine {
	archives: Arc<dyn ArchiveSource>,
	writer_memory_bytes: usize,
}

impl TantivyIndexerEngine {
	pub fn new(archives: Arc<dyn ArchiveSource>) -> Self {
		Self { archives, writer_memory_bytes: DEFAULT_WRITER_MEMORY_BYTES }
	}

	pub fn with_writer_memory(mut self, bytes: usize) -> Self {
		self.writer_memory_bytes = bytes;
		self
	}
}

impl IndexerEngine for TantivyIndexerEngine {
	type Handle = TantivyIndexing;

	fn open(&self, archive: &Path) -> Result<TantivyIndexing> {
		let open_err = |e: Error| match e {
			Error::ArchiveOpen { .. } => e,
			other => Error::ArchiveOpen { path: archive.to_path_buf(), reason: other.to_string() },
		};
		let total = self.archives.document_count(archive).map_err(open_err)?;
		let documents = self.archives.documents(archive).map_err(open_err)?;
		let per_unit = total.div_ceil(UNITS_PER_ARCHIVE).max(1);
		debug!(archive = %archive.display(), total, per_unit, "opened archive for indexing");
		Ok(TantivyIndexing {
			archive: archive.to_path_buf(),
			documents,
			total,
			indexed: 0,
			per_unit,
			exhausted: total == 0,
			writer_memory_bytes: self.writer_memory_bytes,
			writer: None,
		})
	}
}

struct ScratchWriter {
	writer: IndexWriter,
	fields: ArchiveFields,
}

/// A scratch build of one archive, advanced one percent of its documents at a time.
pub struct TantivyIndexing {
	archive: PathBuf,
	documents: DocumentStream,
	total: usize,
	indexed: usize,
	per_unit: usize,
	exhausted: bool,
	writer_memory_bytes: usize,
	writer: Option<ScratchWriter>,
}

impl IndexingHandle for TantivyIndexing {
	fn begin(&mut self, scratch: &Path) -> Result<()> {
		let init_err = |reason: String| Error::IndexInit { path: scratch.to_path_buf(), reason };
		if self.writer.is_some() {
			return Err(init_err("indexing already started".into()));
		}
		let schema = build_schema();
		let index = Index::create_in_dir(scratch, schema.clone()).map_err(|e| init_err(e.to_string()))?;
		register_tokenizer(&index);
		let fields = ArchiveFields::from_schema(&schema).map_err(|e| init_err(e.to_string()))?;
		let writer = index.writer(self.writer_memory_bytes).map_err(|e| init_err(e.to_string()))?;
		info!(archive = %self.archive.display(), scratch = %scratch.display(), documents = self.total, "started scratch index");
		self.writer = Some(ScratchWriter { writer, fields });
		Ok(())
	}

	fn index_next_unit(&mut self) -> Result<bool> {
		let Some(scratch) = self.writer.as_mut() else {
			return Err(Error::indexing("index_next_unit called before begin"));
		};
		let mut added = 0;
		while added < self.per_unit && !self.exhausted {
			match self.documents.next() {
				Some(document) => {
					let document = document?;
					let fields = scratch.fields;
					scratch
						.writer
						.add_document(doc!(
							fields.url => document.url,
							fields.title => document.title,
							fields.body => document.body,
						))
						.map_err(Error::indexing)?;
					self.indexed += 1;
					added += 1;
				}
				None => self.exhausted = true,
			}
			if self.indexed >= self.total {
				self.exhausted = true;
			}
		}
		Ok(!self.exhausted)
	}

	fn percent_done(&self) -> u8 {
		if self.exhausted || self.total == 0 {
			return 100;
		}
		let percent = (self.indexed * 100 / self.total).min(100);
		u8::try_from(percent).unwrap_or(100)
	}

	fn finalize(self) -> Result<()> {
		let Some(ScratchWriter { mut writer, .. }) = self.writer else {
			return Err(Error::indexing("finalize called before begin"));
		};
		writer.commit().map_err(Error::indexing)?;
		writer.wait_merging_threads().map_err(Error::indexing)?;
		info!(archive = %self.archive.display(), documents = self.indexed, "committed scratch index");
		Ok(())
	}
}
