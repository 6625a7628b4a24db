use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use kbsearch_core::traits::{ChunkStore, LexicalField, LexicalIndex, LexicalMatch};
use kbsearch_core::types::DocumentChunk;

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields, BIGRAM_TOKENIZER};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// Inverted index over chunk titles and contents, scored with tantivy's BM25.
///
/// Also serves as the chunk store: every field needed to rebuild a
/// `DocumentChunk` (except the vector) is stored.
pub struct TantivyIndex {
    index: Index,
    reader: IndexReader,
    fields: ChunkFields,
}

impl TantivyIndex {
    /// Create a fresh on-disk index, removing whatever was at `index_dir`.
    pub fn create_in_dir(index_dir: &Path) -> Result<Self> {
        if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
        std::fs::create_dir_all(index_dir)?;
        let index = Index::create_in_dir(index_dir, build_schema())?;
        Self::from_index(index)
    }

    pub fn open_in_dir(index_dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(index_dir)
            .map_err(|e| anyhow!("Failed to open tantivy index at {}: {}", index_dir.display(), e))?;
        Self::from_index(index)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizer(&index)?;
        let fields = ChunkFields::from_schema(&index.schema())?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        Ok(Self { index, reader, fields })
    }

    /// Upsert chunks keyed by `chunk_id` and make them visible to searches.
    pub fn index_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let mut index_writer = self.index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        for c in chunks {
            index_writer.delete_term(Term::from_field_text(self.fields.chunk_id, &c.chunk_id));
            let mut doc = doc!(
                self.fields.chunk_id => c.chunk_id.clone(),
                self.fields.page_id => c.page_id,
                self.fields.chunk_index => c.chunk_index as u64,
                self.fields.title => c.title.clone(),
                self.fields.content => c.content.clone(),
                self.fields.url => c.url.clone(),
            );
            for label in &c.labels {
                doc.add_text(self.fields.labels, label);
            }
            index_writer.add_document(doc)?;
        }
        index_writer.commit()?;
        self.reader.reload()?;
        info!(chunks = chunks.len(), "tantivy index committed");
        Ok(chunks.len())
    }

    pub fn num_chunks(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Run `text` through the index analyzer, deduplicating tokens.
    fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer = self
            .index
            .tokenizers()
            .get(BIGRAM_TOKENIZER)
            .ok_or_else(|| anyhow!("tokenizer '{}' not registered", BIGRAM_TOKENIZER))?;
        let mut stream = analyzer.token_stream(text);
        let mut seen = BTreeSet::new();
        let mut tokens = Vec::new();
        while stream.advance() {
            let t = stream.token().text.clone();
            if seen.insert(t.clone()) { tokens.push(t); }
        }
        Ok(tokens)
    }

    /// One clause per term; a term matches when all of its bigrams occur.
    fn build_query(&self, terms: &[String], field: tantivy::schema::Field) -> Result<Option<BooleanQuery>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for term in terms {
            let grams = self.analyze(term)?;
            let mut per_gram: Vec<(Occur, Box<dyn Query>)> = grams
                .iter()
                .map(|g| {
                    let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(field, g), IndexRecordOption::WithFreqs));
                    (Occur::Must, q)
                })
                .collect();
            match per_gram.len() {
                0 => continue,
                1 => clauses.push((Occur::Should, per_gram.remove(0).1)),
                _ => clauses.push((Occur::Should, Box::new(BooleanQuery::new(per_gram)))),
            }
        }
        if clauses.is_empty() { return Ok(None); }
        Ok(Some(BooleanQuery::new(clauses)))
    }

    fn doc_to_chunk(&self, doc: &TantivyDocument) -> Result<DocumentChunk> {
        let f = &self.fields;
        let text = |field: tantivy::schema::Field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
        let chunk_id = doc
            .get_first(f.chunk_id)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("stored document has no chunk_id"))?
            .to_string();
        let page_id = doc
            .get_first(f.page_id)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| anyhow!("chunk {} has no page_id", chunk_id))?;
        let chunk_index = doc.get_first(f.chunk_index).and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let labels = doc.get_all(f.labels).filter_map(|v| v.as_str()).map(str::to_string).collect();
        Ok(DocumentChunk {
            chunk_id,
            page_id,
            title: text(f.title),
            content: text(f.content),
            labels,
            url: text(f.url),
            chunk_index,
            vector: Vec::new(),
        })
    }
}

impl LexicalIndex for TantivyIndex {
    fn query(&self, terms: &[String], field: LexicalField, k: usize) -> Result<Vec<LexicalMatch>> {
        let target = match field {
            LexicalField::Content => self.fields.content,
            LexicalField::Title => self.fields.title,
        };
        let Some(query) = self.build_query(terms, target)? else {
            debug!(?field, "no indexable grams in terms; skipping lexical query");
            return Ok(Vec::new());
        };
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(k.max(1)))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let chunk_id = doc.get_first(self.fields.chunk_id).and_then(|v| v.as_str()).unwrap_or("").to_string();
            if chunk_id.is_empty() { continue; }
            hits.push(LexicalMatch { chunk_id, relevance: score });
        }
        Ok(hits)
    }
}

impl ChunkStore for TantivyIndex {
    fn get_chunk(&self, chunk_id: &str) -> Result<Option<DocumentChunk>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(Term::from_field_text(self.fields.chunk_id, chunk_id), IndexRecordOption::Basic);
        let Some((_, addr)) = searcher.search(&query, &TopDocs::with_limit(1))?.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(addr)?;
        self.doc_to_chunk(&doc).map(Some)
    }
}
