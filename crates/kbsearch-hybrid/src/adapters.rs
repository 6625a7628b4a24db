//! Retrieval adapters: wrap the external indexes, resolve chunk references
//! and attach normalized scores.
//!
//! Everything a backend reports (errors, timeouts, panics in blocking tasks)
//! leaves this module as `SearchError::Backend` tagged with its path.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use kbsearch_core::traits::{ChunkStore, LexicalField, LexicalIndex, LexicalMatch, VectorIndex};
use kbsearch_core::types::{ChunkId, DocumentChunk, RetrievalPath, ScoredCandidate, SourceKind};
use kbsearch_core::{Result, SearchError};

const DEFAULT_OVERFETCH: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Map an L2 distance to `(0, 1]`, closer is higher.
pub fn distance_to_score(distance: f32) -> f32 {
    if distance.is_nan() || distance == f32::INFINITY {
        return 0.0;
    }
    1.0 / (1.0 + distance.max(0.0))
}

/// Min-max scale into `[0, 1]`. A set whose scores are all equal maps to 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let finite = scores.iter().copied().filter(|s| s.is_finite());
    let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    let range = max - min;
    scores
        .iter()
        .map(|&s| {
            if !s.is_finite() {
                0.0
            } else if range <= f32::EPSILON {
                1.0
            } else {
                ((s - min) / range).clamp(0.0, 1.0)
            }
        })
        .collect()
}

fn fetch_size(k: usize, overfetch: usize) -> usize {
    k.saturating_mul(overfetch.max(1)).max(k).max(1)
}

fn resolve_chunks(store: &dyn ChunkStore, ids: &[ChunkId]) -> anyhow::Result<HashMap<ChunkId, Arc<DocumentChunk>>> {
    Ok(store.get_chunks(ids)?.into_iter().map(|c| (c.chunk_id.clone(), Arc::new(c))).collect())
}

async fn bounded<T>(path: RetrievalPath, timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::backend(path, format!("timed out after {}ms", timeout.as_millis()))),
    }
}

/// Similarity search over the query embedding.
pub struct VectorRetriever {
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ChunkStore>,
    overfetch: usize,
    timeout: Duration,
}

impl VectorRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, store: Arc<dyn ChunkStore>) -> Self {
        Self { index, store, overfetch: DEFAULT_OVERFETCH, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_overfetch(mut self, factor: usize) -> Self {
        self.overfetch = factor.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredCandidate>> {
        bounded(RetrievalPath::Vector, self.timeout, self.search_unbounded(query_vector, k)).await
    }

    async fn search_unbounded(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredCandidate>> {
        let path = RetrievalPath::Vector;
        let matches = self
            .index
            .search(query_vector, fetch_size(k, self.overfetch))
            .await
            .map_err(|e| SearchError::backend(path, e))?;
        let ids: Vec<ChunkId> = matches.iter().map(|m| m.chunk_id.clone()).collect();
        let store = self.store.clone();
        let chunks = tokio::task::spawn_blocking(move || resolve_chunks(store.as_ref(), &ids))
            .await
            .map_err(|e| SearchError::backend(path, e))?
            .map_err(|e| SearchError::backend(path, e))?;

        let candidates: Vec<ScoredCandidate> = matches
            .into_iter()
            .filter_map(|m| {
                let chunk = chunks.get(&m.chunk_id)?.clone();
                Some(ScoredCandidate {
                    chunk,
                    source: SourceKind::Vector,
                    score_raw: m.distance,
                    score_normalized: distance_to_score(m.distance),
                })
            })
            .collect();
        debug!(k, candidates = candidates.len(), "vector retrieval");
        Ok(candidates)
    }
}

/// BM25 search over chunk contents, plus a separate title query.
pub struct LexicalRetriever {
    index: Arc<dyn LexicalIndex>,
    store: Arc<dyn ChunkStore>,
    overfetch: usize,
    timeout: Duration,
    title_search: bool,
}

impl LexicalRetriever {
    pub fn new(index: Arc<dyn LexicalIndex>, store: Arc<dyn ChunkStore>) -> Self {
        Self { index, store, overfetch: DEFAULT_OVERFETCH, timeout: DEFAULT_TIMEOUT, title_search: true }
    }

    pub fn with_overfetch(mut self, factor: usize) -> Self {
        self.overfetch = factor.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_title_search(mut self, enabled: bool) -> Self {
        self.title_search = enabled;
        self
    }

    /// Bm25 candidates first, then title candidates; each kind normalized
    /// over its own result set.
    pub async fn search(&self, terms: &[String], k: usize) -> Result<Vec<ScoredCandidate>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        bounded(RetrievalPath::Lexical, self.timeout, self.search_unbounded(terms.to_vec(), k)).await
    }

    async fn search_unbounded(&self, terms: Vec<String>, k: usize) -> Result<Vec<ScoredCandidate>> {
        let path = RetrievalPath::Lexical;
        let index = self.index.clone();
        let store = self.store.clone();
        let limit = fetch_size(k, self.overfetch);
        let title_search = self.title_search;

        let candidates = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ScoredCandidate>> {
            let mut runs: Vec<(SourceKind, Vec<LexicalMatch>)> =
                vec![(SourceKind::Bm25, index.query(&terms, LexicalField::Content, limit)?)];
            if title_search {
                runs.push((SourceKind::Title, index.query(&terms, LexicalField::Title, limit)?));
            }
            let ids: Vec<ChunkId> = runs.iter().flat_map(|(_, ms)| ms.iter().map(|m| m.chunk_id.clone())).collect();
            let chunks = resolve_chunks(store.as_ref(), &ids)?;

            let mut out = Vec::new();
            for (source, matches) in runs {
                let found: Vec<(Arc<DocumentChunk>, f32)> = matches
                    .into_iter()
                    .filter_map(|m| chunks.get(&m.chunk_id).map(|c| (c.clone(), m.relevance)))
                    .collect();
                let raw: Vec<f32> = found.iter().map(|(_, s)| *s).collect();
                let normalized = min_max_normalize(&raw);
                out.extend(found.into_iter().zip(normalized).map(|((chunk, score_raw), score_normalized)| {
                    ScoredCandidate { chunk, source, score_raw, score_normalized }
                }));
            }
            Ok(out)
        })
        .await
        .map_err(|e| SearchError::backend(path, e))?
        .map_err(|e| SearchError::backend(path, e))?;

        let title = candidates.iter().filter(|c| c.source == SourceKind::Title).count();
        debug!(k, bm25 = candidates.len() - title, title, "lexical retrieval");
        Ok(candidates)
    }
}
