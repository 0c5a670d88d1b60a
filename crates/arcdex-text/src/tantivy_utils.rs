use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "archive_text";

pub const URL_FIELD: &str = "url";
pub const TITLE_FIELD: &str = "title";
pub const BODY_FIELD: &str = "body";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Field handles of an archive index.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveFields {
	pub url: Field,
	pub title: Field,
	pub body: Field,
}

impl ArchiveFields {
	/// Resolve the handles, failing if `schema` was not built by [`build_schema`].
	pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			url: schema.get_field(URL_FIELD)?,
			title: schema.get_field(TITLE_FIELD)?,
			body: schema.get_field(BODY_FIELD)?,
		})
	}
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(URL_FIELD, STRING | STORED);
	let indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	schema_builder.add_text_field(TITLE_FIELD, TextOptions::default().set_indexing_options(indexing.clone()).set_stored());
	schema_builder.add_text_field(BODY_FIELD, TextOptions::default().set_indexing_options(indexing));
	schema_builder.build()
}

/// Case-folding analyzer shared by indexing and querying.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}
