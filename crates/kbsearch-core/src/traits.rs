//! Narrow interfaces to the external collaborators the pipeline consumes.
//!
//! CPU-bound collaborators (`Embedder`, `LexicalIndex`, `ChunkStore`) are
//! synchronous and are driven from blocking tasks; the similarity index is
//! reached over an async connection.

use async_trait::async_trait;

use crate::types::{ChunkId, DocumentChunk};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// A chunk reference with its distance to the query vector (lower is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub chunk_id: ChunkId,
    pub distance: f32,
}

/// A chunk reference with its lexical relevance (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalMatch {
    pub chunk_id: ChunkId,
    pub relevance: f32,
}

/// Which stored field a lexical query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalField {
    Content,
    Title,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<VectorMatch>>;
}

pub trait LexicalIndex: Send + Sync {
    /// Ranked disjunctive query over `terms`, best first.
    fn query(&self, terms: &[String], field: LexicalField, k: usize) -> anyhow::Result<Vec<LexicalMatch>>;
}

pub trait ChunkStore: Send + Sync {
    fn get_chunk(&self, chunk_id: &str) -> anyhow::Result<Option<DocumentChunk>>;

    fn get_chunks(&self, chunk_ids: &[ChunkId]) -> anyhow::Result<Vec<DocumentChunk>> {
        let mut out = Vec::with_capacity(chunk_ids.len());
        for id in chunk_ids {
            if let Some(chunk) = self.get_chunk(id)? {
                out.push(chunk);
            }
        }
        Ok(out)
    }
}
