//! Domain types shared by the retrieval backends and the hybrid pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub type ChunkId = String;
pub type PageId = i64;

/// A chunk of a source page that is independently indexed.
///
/// - `chunk_id`: globally unique chunk identifier
/// - `page_id`: identity of the source page; many chunks share one page
/// - `labels`: page labels copied onto every chunk (e.g. `meeting-notes`)
/// - `chunk_index`: position within the parent page, starting at 0
/// - `vector`: dense embedding; empty when the chunk was read back from a
///   store that does not keep vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub chunk_id: ChunkId,
    pub page_id: PageId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub vector: Vec<f32>,
}

impl DocumentChunk {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Indicates which retrieval path produced a candidate or result.
///
/// The declaration order is the tie-break priority used by fusion:
/// `Hybrid` outranks `Vector`, which outranks `Bm25`, which outranks `Title`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hybrid,
    Vector,
    Bm25,
    Title,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Hybrid => "hybrid",
            SourceKind::Vector => "vector",
            SourceKind::Bm25 => "bm25",
            SourceKind::Title => "title",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two independent retrieval paths; used to tag backend failures,
/// degradation and filter relaxation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPath {
    Vector,
    Lexical,
}

impl fmt::Display for RetrievalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalPath::Vector => f.write_str("vector"),
            RetrievalPath::Lexical => f.write_str("lexical"),
        }
    }
}

/// A candidate produced by one retrieval adapter.
///
/// `score_raw` is whatever the backend reported (a distance for the vector
/// path, an unbounded BM25 score for the lexical path). `score_normalized`
/// is in `[0, 1]` and higher is always better.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: Arc<DocumentChunk>,
    pub source: SourceKind,
    pub score_raw: f32,
    pub score_normalized: f32,
}

impl ScoredCandidate {
    pub fn page_id(&self) -> PageId {
        self.chunk.page_id
    }
}

/// One entry of the final ranking. At most one per `page_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub page_id: PageId,
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
    pub url: String,
    pub source: SourceKind,
    pub score_kind: SourceKind,
    pub score_raw: f32,
    pub score: f32,
    pub score_text: String,
}

/// Label predicates carried by a request.
///
/// `include_meeting_notes = false` removes chunks carrying any of the
/// configured meeting-note labels. `include_labels` keeps only chunks that
/// carry at least one of the listed labels; `exclude_labels` drops chunks
/// carrying any of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFilterSpec {
    #[serde(default = "default_true")]
    pub include_meeting_notes: bool,
    #[serde(default)]
    pub include_labels: BTreeSet<String>,
    #[serde(default)]
    pub exclude_labels: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}

impl Default for LabelFilterSpec {
    fn default() -> Self {
        Self { include_meeting_notes: true, include_labels: BTreeSet::new(), exclude_labels: BTreeSet::new() }
    }
}

impl LabelFilterSpec {
    pub fn excluding_meeting_notes() -> Self {
        Self { include_meeting_notes: false, ..Self::default() }
    }

    /// True when the spec cannot remove anything.
    pub fn is_pass_through(&self) -> bool {
        self.include_meeting_notes && self.include_labels.is_empty() && self.exclude_labels.is_empty()
    }
}

/// A search request as received from a caller, before validation.
///
/// Optional fields fall back to configured defaults in the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub label_filters: Option<LabelFilterSpec>,
    #[serde(default)]
    pub table_name: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_label_filters(mut self, filters: LabelFilterSpec) -> Self {
        self.label_filters = Some(filters);
        self
    }

    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }
}

/// Recorded when a label filter would have emptied a retrieval path and was
/// relaxed to pass-through for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRelaxation {
    pub path: RetrievalPath,
    pub candidates: usize,
}

/// Priority tier assigned to an extracted keyword. Declaration order is
/// priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum KeywordTier {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordStats {
    pub dictionary_hits: usize,
    pub pattern_hits: usize,
    pub generic_hits: usize,
    pub dropped: usize,
    pub truncated: usize,
}

/// Keywords extracted from one query, in priority order.
///
/// `fallback_terms` holds the raw normalized query tokens and is what the
/// lexical path uses when `keywords` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSet {
    pub keywords: Vec<String>,
    pub tiers: Vec<(String, KeywordTier)>,
    pub fallback_terms: Vec<String>,
    pub stats: KeywordStats,
}

impl KeywordSet {
    pub fn tier_of(&self, keyword: &str) -> Option<KeywordTier> {
        self.tiers.iter().find(|(k, _)| k == keyword).map(|(_, t)| *t)
    }

    /// Terms handed to the lexical index.
    pub fn query_terms(&self) -> &[String] {
        if self.keywords.is_empty() { &self.fallback_terms } else { &self.keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Final output of one pipeline pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub keywords: Vec<String>,
    pub degraded: Vec<RetrievalPath>,
    pub relaxations: Vec<FilterRelaxation>,
    #[serde(default)]
    pub from_cache: bool,
}

impl SearchResponse {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
