//! Request orchestration: validate, extract and embed, retrieve, filter,
//! fuse, cache.
//!
//! The pipeline is the only place that turns backend failures into either a
//! degraded response or a caller-visible error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use kbsearch_core::config::{SearchSettings, Settings};
use kbsearch_core::normalize::normalize_query;
use kbsearch_core::traits::{ChunkStore, Embedder, LexicalIndex, VectorIndex};
use kbsearch_core::types::{KeywordSet, LabelFilterSpec, RetrievalPath, SearchRequest, SearchResponse};
use kbsearch_core::{Result, SearchError};
use kbsearch_text::KeywordExtractor;

use crate::adapters::{LexicalRetriever, VectorRetriever};
use crate::cache::{cache_key, CacheStats, ResultCache};
use crate::filter::LabelFilter;
use crate::fusion::FusionEngine;

/// One searchable corpus: both retrieval paths over the same chunks.
pub struct Corpus {
    vector: VectorRetriever,
    lexical: LexicalRetriever,
}

impl Corpus {
    /// Wire both retrievers with the overfetch factor and timeouts from
    /// `settings`.
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        store: Arc<dyn ChunkStore>,
        settings: &SearchSettings,
    ) -> Self {
        let vector = VectorRetriever::new(vector, store.clone())
            .with_overfetch(settings.overfetch_factor)
            .with_timeout(Duration::from_millis(settings.vector_timeout_ms));
        let lexical = LexicalRetriever::new(lexical, store)
            .with_overfetch(settings.overfetch_factor)
            .with_timeout(Duration::from_millis(settings.lexical_timeout_ms));
        Self { vector, lexical }
    }
}

/// A validated request, ready to execute.
#[derive(Clone)]
struct QueryPlan {
    query: String,
    top_k: usize,
    filters: Option<LabelFilterSpec>,
    table: String,
    corpus: Arc<Corpus>,
    key: String,
}

struct PipelineInner {
    settings: SearchSettings,
    extractor: Arc<KeywordExtractor>,
    embedder: Arc<dyn Embedder>,
    corpora: HashMap<String, Arc<Corpus>>,
    filter: LabelFilter,
    fusion: FusionEngine,
}

pub struct PipelineBuilder {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    corpora: HashMap<String, Arc<Corpus>>,
    cache: Option<ResultCache>,
}

impl PipelineBuilder {
    pub fn corpus(mut self, table_name: impl Into<String>, corpus: Corpus) -> Self {
        self.corpora.insert(table_name.into(), Arc::new(corpus));
        self
    }

    /// Replace the cache built from settings, e.g. to share one cache
    /// between pipelines.
    pub fn cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<SearchPipeline> {
        self.settings.validate()?;
        let cache = if self.settings.cache.enabled {
            Some(self.cache.unwrap_or_else(|| ResultCache::from_settings(&self.settings.cache)))
        } else {
            None
        };
        info!(
            corpora = self.corpora.len(),
            cache = cache.is_some(),
            default_table = %self.settings.search.default_table,
            "search pipeline ready"
        );
        Ok(SearchPipeline {
            inner: Arc::new(PipelineInner {
                extractor: Arc::new(KeywordExtractor::new(&self.settings.keywords)),
                filter: LabelFilter::from_settings(&self.settings.filter),
                fusion: FusionEngine::from_settings(&self.settings.fusion),
                settings: self.settings.search,
                embedder: self.embedder,
                corpora: self.corpora,
            }),
            cache,
        })
    }
}

#[derive(Clone)]
pub struct SearchPipeline {
    inner: Arc<PipelineInner>,
    cache: Option<ResultCache>,
}

impl SearchPipeline {
    pub fn builder(settings: Settings, embedder: Arc<dyn Embedder>) -> PipelineBuilder {
        PipelineBuilder { settings, embedder, corpora: HashMap::new(), cache: None }
    }

    #[instrument(skip_all, fields(table = request.table_name.as_deref(), top_k = request.top_k))]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let plan = self.inner.validate(request)?;
        let Some(cache) = &self.cache else {
            return self.inner.clone().execute(plan).await;
        };

        let inner = self.inner.clone();
        let compute_plan = plan.clone();
        match cache.get_or_compute(&plan.key, move || inner.execute(compute_plan)).await {
            Ok((mut response, outcome)) => {
                response.from_cache = outcome.is_hit();
                Ok(response)
            }
            Err(SearchError::Cache(reason)) => {
                warn!(%reason, "result cache unavailable; computing directly");
                self.inner.clone().execute(plan).await
            }
            Err(e) => Err(e),
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear() {
                warn!(error = %e, "failed to clear result cache");
            }
        }
    }

    /// All zeros when the cache is disabled.
    pub fn cache_stats(&self) -> CacheStats {
        let Some(cache) = &self.cache else { return CacheStats::default() };
        cache.stats().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read cache stats");
            CacheStats::default()
        })
    }
}

impl PipelineInner {
    fn validate(&self, request: SearchRequest) -> Result<QueryPlan> {
        let query = normalize_query(&request.query);
        if query.is_empty() {
            return Err(SearchError::InvalidInput("query must not be empty".to_string()));
        }
        let top_k = match request.top_k {
            None => self.settings.default_top_k,
            Some(k) if k <= 0 => {
                return Err(SearchError::InvalidInput(format!("topK must be a positive integer (got {k})")));
            }
            Some(k) => {
                let k = usize::try_from(k).unwrap_or(usize::MAX);
                if k > self.settings.max_top_k {
                    debug!(requested = k, max = self.settings.max_top_k, "clamping topK");
                }
                k.min(self.settings.max_top_k)
            }
        };
        let table = request.table_name.unwrap_or_else(|| self.settings.default_table.clone());
        let corpus = self
            .corpora
            .get(&table)
            .cloned()
            .ok_or_else(|| SearchError::InvalidInput(format!("unknown table '{table}'")))?;
        let filters = request.label_filters;
        let key = cache_key(&query, filters.as_ref(), top_k, &table);
        Ok(QueryPlan { query, top_k, filters, table, corpus, key })
    }

    async fn execute(self: Arc<Self>, plan: QueryPlan) -> Result<SearchResponse> {
        let (keywords, embedding) = self.extract_and_embed(&plan.query).await?;
        debug!(table = %plan.table, keywords = ?keywords.keywords, fallback = keywords.is_empty(), "keywords extracted");

        let corpus = &plan.corpus;
        let vector_search = async {
            match embedding {
                Ok(v) => corpus.vector.search(&v, plan.top_k).await,
                Err(e) => Err(e),
            }
        };
        let lexical_search = corpus.lexical.search(keywords.query_terms(), plan.top_k);
        let (vector, lexical) = tokio::join!(vector_search, lexical_search);

        let mut degraded = Vec::new();
        let (vector, lexical) = match (vector, lexical) {
            (Ok(v), Ok(l)) => (v, l),
            (Ok(v), Err(e)) => {
                warn!(error = %e, "lexical retrieval failed; continuing with vector results only");
                degraded.push(RetrievalPath::Lexical);
                (v, Vec::new())
            }
            (Err(e), Ok(l)) => {
                warn!(error = %e, "vector retrieval failed; continuing with lexical results only");
                degraded.push(RetrievalPath::Vector);
                (Vec::new(), l)
            }
            (Err(ve), Err(le)) => {
                warn!(vector = %ve, lexical = %le, "both retrieval paths failed");
                return Err(SearchError::FusionUnavailable { vector: ve.to_string(), lexical: le.to_string() });
            }
        };
        debug!(vector = vector.len(), lexical = lexical.len(), "candidates retrieved");

        let spec = plan.filters.as_ref();
        let vector = self.filter.apply(RetrievalPath::Vector, vector, spec);
        let lexical = self.filter.apply(RetrievalPath::Lexical, lexical, spec);
        let relaxations: Vec<_> = vector.relaxation.into_iter().chain(lexical.relaxation).collect();

        let results = self.fusion.fuse(&vector.candidates, &lexical.candidates, plan.top_k);
        debug!(results = results.len(), degraded = ?degraded, "fused");
        Ok(SearchResponse { results, keywords: keywords.keywords, degraded, relaxations, from_cache: false })
    }

    /// Keyword extraction and query embedding run side by side. An embedding
    /// failure is a vector-path failure, not a request failure.
    async fn extract_and_embed(&self, query: &str) -> Result<(KeywordSet, Result<Vec<f32>>)> {
        let extractor = self.extractor.clone();
        let embedder = self.embedder.clone();
        let (q1, q2) = (query.to_string(), query.to_string());
        let (keywords, embedding) = tokio::join!(
            tokio::task::spawn_blocking(move || extractor.extract(&q1)),
            tokio::task::spawn_blocking(move || embedder.embed(&q2)),
        );
        let keywords = keywords.map_err(|e| SearchError::Internal(format!("keyword extraction failed: {e}")))?;
        let dim = self.embedder.dim();
        let embedding = match embedding {
            Ok(Ok(v)) if v.len() == dim => Ok(v),
            Ok(Ok(v)) => Err(SearchError::backend(
                RetrievalPath::Vector,
                format!("query embedding has {} dimensions, index expects {dim}", v.len()),
            )),
            Ok(Err(e)) => Err(SearchError::backend(RetrievalPath::Vector, format!("embedding failed: {e}"))),
            Err(e) => Err(SearchError::backend(RetrievalPath::Vector, format!("embedding task failed: {e}"))),
        };
        Ok((keywords, embedding))
    }
}
