use tantivy::schema::{
    Field, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, STORED, STRING,
};
use tantivy::tokenizer::{LowerCaser, NgramTokenizer, TextAnalyzer};
use tantivy::Index;

/// Character bigrams: Japanese text has no word boundaries for a
/// whitespace tokenizer to split on.
pub const BIGRAM_TOKENIZER: &str = "kb_bigram";

#[derive(Clone, Copy, Debug)]
pub struct ChunkFields {
    pub chunk_id: Field,
    pub page_id: Field,
    pub chunk_index: Field,
    pub title: Field,
    pub content: Field,
    pub labels: Field,
    pub url: Field,
}

impl ChunkFields {
    pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
        Ok(Self {
            chunk_id: schema.get_field("chunk_id")?,
            page_id: schema.get_field("page_id")?,
            chunk_index: schema.get_field("chunk_index")?,
            title: schema.get_field("title")?,
            content: schema.get_field("content")?,
            labels: schema.get_field("labels")?,
            url: schema.get_field("url")?,
        })
    }
}

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("chunk_id", STRING | STORED);
    schema_builder.add_i64_field("page_id", NumericOptions::default().set_stored().set_indexed());
    schema_builder.add_u64_field("chunk_index", NumericOptions::default().set_stored());
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(BIGRAM_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
    schema_builder.add_text_field("title", text_options.clone());
    schema_builder.add_text_field("content", text_options);
    schema_builder.add_text_field("labels", STRING | STORED);
    schema_builder.add_text_field("url", STORED);
    schema_builder.build()
}

/// Register the bigram analyzer; must run every time an index is opened.
pub fn register_tokenizer(index: &Index) -> tantivy::Result<()> {
    let tokenizer = TextAnalyzer::builder(NgramTokenizer::new(2, 2, false)?)
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(BIGRAM_TOKENIZER, tokenizer);
    Ok(())
}
