//! Merge the two candidate sets into one ranking with one entry per page.
//!
//! Fusion is a pure function of its inputs: the same candidates, in any
//! order, always produce the same ranking and the same scores.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use kbsearch_core::config::FusionSettings;
use kbsearch_core::types::{PageId, RankedResult, ScoredCandidate, SourceKind};

/// Page-keyed view of the candidate sets: the best candidate of each source
/// kind for every page.
#[derive(Debug, Default)]
struct PageIndex<'a> {
    pages: BTreeMap<PageId, PageHits<'a>>,
}

#[derive(Debug, Default)]
struct PageHits<'a> {
    vector: Option<&'a ScoredCandidate>,
    bm25: Option<&'a ScoredCandidate>,
    title: Option<&'a ScoredCandidate>,
}

/// Higher normalized score wins, then the earlier chunk, then chunk id.
fn better<'a>(current: Option<&'a ScoredCandidate>, challenger: &'a ScoredCandidate) -> &'a ScoredCandidate {
    let Some(current) = current else { return challenger };
    let order = challenger
        .score_normalized
        .total_cmp(&current.score_normalized)
        .then_with(|| current.chunk.chunk_index.cmp(&challenger.chunk.chunk_index))
        .then_with(|| current.chunk.chunk_id.cmp(&challenger.chunk.chunk_id));
    if order == Ordering::Greater { challenger } else { current }
}

impl<'a> PageIndex<'a> {
    fn build(vector: &'a [ScoredCandidate], lexical: &'a [ScoredCandidate]) -> Self {
        let mut index = Self::default();
        for c in vector.iter().chain(lexical) {
            let hits = index.pages.entry(c.page_id()).or_default();
            let slot = match c.source {
                SourceKind::Vector | SourceKind::Hybrid => &mut hits.vector,
                SourceKind::Bm25 => &mut hits.bm25,
                SourceKind::Title => &mut hits.title,
            };
            *slot = Some(better(*slot, c));
        }
        index
    }
}

impl<'a> PageHits<'a> {
    /// Bm25 beats title on equal scores.
    fn lexical(&self) -> Option<&'a ScoredCandidate> {
        match (self.bm25, self.title) {
            (Some(b), Some(t)) if t.score_normalized > b.score_normalized => Some(t),
            (Some(b), _) => Some(b),
            (None, t) => t,
        }
    }
}

#[derive(Debug)]
struct Fused<'a> {
    page_id: PageId,
    source: SourceKind,
    score: f32,
    score_raw: f32,
    chunk: &'a ScoredCandidate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionEngine {
    vector_weight: f32,
    lexical_weight: f32,
    precision: usize,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::from_settings(&FusionSettings::default())
    }
}

impl FusionEngine {
    /// Weights are assumed validated (non-negative, not both zero).
    pub fn new(vector_weight: f32, lexical_weight: f32, precision: usize) -> Self {
        Self { vector_weight, lexical_weight, precision }
    }

    pub fn from_settings(settings: &FusionSettings) -> Self {
        Self::new(settings.vector_weight, settings.lexical_weight, settings.score_precision)
    }

    fn combine(&self, vector: f32, lexical: f32) -> f32 {
        let total = self.vector_weight + self.lexical_weight;
        if total <= 0.0 {
            return (vector + lexical) / 2.0;
        }
        (self.vector_weight * vector + self.lexical_weight * lexical) / total
    }

    pub fn fuse(&self, vector: &[ScoredCandidate], lexical: &[ScoredCandidate], top_k: usize) -> Vec<RankedResult> {
        let index = PageIndex::build(vector, lexical);
        let mut fused: Vec<Fused<'_>> = index
            .pages
            .iter()
            .filter_map(|(&page_id, hits)| match (hits.vector, hits.lexical()) {
                (Some(v), Some(l)) => Some(Fused {
                    page_id,
                    source: SourceKind::Hybrid,
                    score: self.combine(v.score_normalized, l.score_normalized),
                    score_raw: v.score_raw,
                    chunk: better(Some(v), l),
                }),
                (Some(c), None) | (None, Some(c)) => Some(Fused {
                    page_id,
                    source: c.source,
                    score: c.score_normalized,
                    score_raw: c.score_raw,
                    chunk: c,
                }),
                (None, None) => None,
            })
            .collect();

        fused.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.page_id.cmp(&b.page_id))
        });
        fused.truncate(top_k);
        fused.into_iter().map(|f| self.render(f)).collect()
    }

    fn render(&self, f: Fused<'_>) -> RankedResult {
        let chunk = &f.chunk.chunk;
        RankedResult {
            page_id: f.page_id,
            title: chunk.title.clone(),
            content: chunk.content.clone(),
            labels: chunk.labels.iter().cloned().collect(),
            url: chunk.url.clone(),
            source: f.source,
            score_kind: f.source,
            score_raw: f.score_raw,
            score: f.score,
            score_text: format!("{:.*}", self.precision, f.score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbsearch_core::types::DocumentChunk;
    use std::sync::Arc;

    fn cand(page_id: i64, chunk_index: usize, source: SourceKind, norm: f32) -> ScoredCandidate {
        ScoredCandidate {
            chunk: Arc::new(DocumentChunk {
                chunk_id: format!("{page_id}-{chunk_index}"),
                page_id,
                title: format!("page {page_id}"),
                content: format!("chunk {chunk_index} of page {page_id}"),
                labels: Default::default(),
                url: format!("https://kb.example/{page_id}"),
                chunk_index,
                vector: Vec::new(),
            }),
            source,
            score_raw: norm * 10.0,
            score_normalized: norm,
        }
    }

    fn ids(results: &[RankedResult]) -> Vec<i64> {
        results.iter().map(|r| r.page_id).collect()
    }

    #[test]
    fn page_in_both_sets_is_hybrid_and_wins_ties() {
        let vector = vec![cand(1, 0, SourceKind::Vector, 1.0), cand(2, 0, SourceKind::Vector, 1.0), cand(3, 0, SourceKind::Vector, 1.0)];
        let lexical = vec![cand(2, 0, SourceKind::Bm25, 1.0), cand(4, 0, SourceKind::Bm25, 1.0)];
        let out = FusionEngine::default().fuse(&vector, &lexical, 3);
        assert_eq!(ids(&out), [2, 1, 3]);
        assert_eq!(out[0].source, SourceKind::Hybrid);
        assert_eq!(out[1].source, SourceKind::Vector);
    }

    #[test]
    fn hybrid_score_is_weighted_mean() {
        let vector = vec![cand(1, 0, SourceKind::Vector, 0.8)];
        let lexical = vec![cand(1, 0, SourceKind::Bm25, 0.2)];
        let out = FusionEngine::new(3.0, 1.0, 4).fuse(&vector, &lexical, 10);
        assert!((out[0].score - 0.65).abs() < 1e-6);
        assert_eq!(out[0].score_text, "0.6500");
        assert!((out[0].score_raw - 8.0).abs() < 1e-6, "hybrid reports the vector raw score");
    }

    #[test]
    fn single_source_pages_keep_their_normalized_score() {
        let lexical = vec![cand(7, 0, SourceKind::Bm25, 0.25), cand(8, 0, SourceKind::Title, 0.5)];
        let out = FusionEngine::default().fuse(&[], &lexical, 10);
        assert_eq!(ids(&out), [8, 7]);
        assert_eq!(out[0].source, SourceKind::Title);
        assert_eq!(out[1].score_text, "0.2500");
    }

    #[test]
    fn best_chunk_per_page_with_earlier_chunk_on_ties() {
        let vector = vec![
            cand(1, 3, SourceKind::Vector, 0.9),
            cand(1, 1, SourceKind::Vector, 0.9),
            cand(1, 0, SourceKind::Vector, 0.4),
        ];
        let out = FusionEngine::default().fuse(&vector, &[], 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "chunk 1 of page 1");
    }

    #[test]
    fn lexical_side_uses_best_of_bm25_and_title() {
        let vector = vec![cand(1, 0, SourceKind::Vector, 0.5)];
        let lexical = vec![cand(1, 2, SourceKind::Bm25, 0.1), cand(1, 4, SourceKind::Title, 0.9)];
        let out = FusionEngine::default().fuse(&vector, &lexical, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, SourceKind::Hybrid);
        assert!((out[0].score - 0.7).abs() < 1e-6);
        assert_eq!(out[0].content, "chunk 4 of page 1", "representative chunk is the best-scoring one");
    }

    #[test]
    fn equal_scores_order_by_source_then_page() {
        let vector = vec![cand(9, 0, SourceKind::Vector, 0.5)];
        let lexical = vec![cand(3, 0, SourceKind::Title, 0.5), cand(5, 0, SourceKind::Bm25, 0.5), cand(4, 0, SourceKind::Bm25, 0.5)];
        let out = FusionEngine::default().fuse(&vector, &lexical, 10);
        assert_eq!(ids(&out), [9, 4, 5, 3]);
    }

    #[test]
    fn output_is_independent_of_input_order_and_truncated() {
        let mut vector: Vec<ScoredCandidate> = (0..20).map(|i| cand(i % 7, (i / 7) as usize, SourceKind::Vector, (i % 5) as f32 / 4.0)).collect();
        let mut lexical: Vec<ScoredCandidate> = (0..10).map(|i| cand(i % 4 + 5, 0, SourceKind::Bm25, (i % 3) as f32 / 2.0)).collect();
        let engine = FusionEngine::default();
        let first = engine.fuse(&vector, &lexical, 5);
        vector.reverse();
        lexical.reverse();
        assert_eq!(engine.fuse(&vector, &lexical, 5), first);
        assert_eq!(first.len(), 5);
        let mut pages = ids(&first);
        pages.sort_unstable();
        pages.dedup();
        assert_eq!(pages.len(), 5, "no duplicate pages");
    }

    #[test]
    fn zero_top_k_yields_nothing() {
        let vector = vec![cand(1, 0, SourceKind::Vector, 1.0)];
        assert!(FusionEngine::default().fuse(&vector, &[], 0).is_empty());
    }
}
