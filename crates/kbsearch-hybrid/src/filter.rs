//! Label predicates applied to each retrieval path before fusion.
//!
//! Filtering never silently empties a path: when the filters would remove every
//! candidate the path falls back to its unfiltered candidates and a
//! `FilterRelaxation` is reported on the response.

use std::collections::BTreeSet;

use tracing::warn;

use kbsearch_core::config::FilterSettings;
use kbsearch_core::types::{DocumentChunk, FilterRelaxation, LabelFilterSpec, RetrievalPath, ScoredCandidate};

/// Result of filtering one retrieval path.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub candidates: Vec<ScoredCandidate>,
    pub relaxation: Option<FilterRelaxation>,
}

/// Label predicates over chunk metadata.
///
/// A filter that would remove every candidate of a path is relaxed to
/// pass-through for that path, and the relaxation is reported.
#[derive(Debug, Clone)]
pub struct LabelFilter {
    meeting_note_labels: BTreeSet<String>,
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self::from_settings(&FilterSettings::default())
    }
}

impl LabelFilter {
    pub fn new<I, S>(meeting_note_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { meeting_note_labels: meeting_note_labels.into_iter().map(Into::into).collect() }
    }

    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self::new(settings.meeting_note_labels.iter().cloned())
    }

    pub fn is_meeting_note(&self, chunk: &DocumentChunk) -> bool {
        chunk.labels.iter().any(|l| self.meeting_note_labels.contains(l))
    }

    pub fn admits(&self, chunk: &DocumentChunk, spec: &LabelFilterSpec) -> bool {
        if !spec.include_meeting_notes && self.is_meeting_note(chunk) {
            return false;
        }
        if !spec.include_labels.is_empty() && !spec.include_labels.iter().any(|l| chunk.has_label(l)) {
            return false;
        }
        !spec.exclude_labels.iter().any(|l| chunk.has_label(l))
    }

    pub fn apply(&self, path: RetrievalPath, candidates: Vec<ScoredCandidate>, spec: Option<&LabelFilterSpec>) -> FilterOutcome {
        let Some(spec) = spec.filter(|s| !s.is_pass_through()) else {
            return FilterOutcome { candidates, relaxation: None };
        };
        if candidates.is_empty() {
            return FilterOutcome { candidates, relaxation: None };
        }
        let total = candidates.len();
        let kept: Vec<ScoredCandidate> = candidates.iter().filter(|c| self.admits(&c.chunk, spec)).cloned().collect();
        if kept.is_empty() {
            warn!(%path, candidates = total, "label filter would empty the path; relaxing to pass-through");
            return FilterOutcome { candidates, relaxation: Some(FilterRelaxation { path, candidates: total }) };
        }
        FilterOutcome { candidates: kept, relaxation: None }
    }
}
