//! Query-time keyword extraction.
//!
//! A query is scanned three ways, strongest signal first:
//!
//! 1. **Dictionary**: surfaces from [`dictionary::DOMAIN_TERMS`], reported
//!    under their canonical form.
//! 2. **Patterns**: structural patterns such as `<noun>する` and
//!    `<noun>機能` that surface operations missing from the dictionary.
//! 3. **Generic runs**: contiguous kanji or katakana runs.
//!
//! Stopwords and too-short terms are dropped before tiering. Extraction is a
//! pure function of the query and the static tables.

pub mod dictionary;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use kbsearch_core::config::KeywordSettings;
use kbsearch_core::normalize::{normalize_query, raw_tokens};
use kbsearch_core::types::{KeywordSet, KeywordStats, KeywordTier};

use dictionary::{DOMAIN_TERMS, STOPWORDS};

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"([\p{Han}\p{Katakana}ー]{2,})(?:する|して|した|したい|される|させる|できる|でき)",
        r"([\p{Han}\p{Katakana}ー]{2,})機能",
        r"([\p{Han}\p{Katakana}ー]{2,})(?:方法|手順|画面|一覧)",
        r"([a-z][a-z0-9_\-]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static GENERIC_RUNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\p{Han}{2,}", r"[\p{Katakana}ー]{2,}"].iter().filter_map(|p| Regex::new(p).ok()).collect()
});

/// Where a candidate was found. Declaration order is strength order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    Dictionary,
    Pattern,
    Generic,
}

#[derive(Debug)]
struct Candidate {
    origin: Origin,
    first_pos: usize,
    freq: usize,
}

pub struct KeywordExtractor {
    max_keywords: usize,
    min_term_chars: usize,
    dictionary: Vec<(String, String)>,
    surface_to_canonical: HashMap<String, String>,
    stopwords: HashSet<String>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(&KeywordSettings::default())
    }
}

impl KeywordExtractor {
    pub fn new(settings: &KeywordSettings) -> Self {
        let dictionary: Vec<(String, String)> =
            DOMAIN_TERMS.iter().map(|(s, c)| (s.to_ascii_lowercase(), (*c).to_string())).collect();
        let surface_to_canonical = dictionary.iter().cloned().collect();
        Self {
            max_keywords: settings.max_keywords.max(1),
            min_term_chars: settings.min_term_chars,
            dictionary,
            surface_to_canonical,
            stopwords: STOPWORDS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub fn extract(&self, raw_query: &str) -> KeywordSet {
        let normalized = normalize_query(raw_query).to_ascii_lowercase();
        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        for (surface, canonical) in &self.dictionary {
            let positions: Vec<usize> = normalized.match_indices(surface.as_str()).map(|(i, _)| i).collect();
            if let Some(&first) = positions.first() {
                Self::record(&mut candidates, canonical, Origin::Dictionary, first, positions.len());
            }
        }
        for re in PATTERNS.iter() {
            self.scan(&mut candidates, re, &normalized, Origin::Pattern);
        }
        for re in GENERIC_RUNS.iter() {
            self.scan(&mut candidates, re, &normalized, Origin::Generic);
        }

        let mut stats = KeywordStats::default();
        let mut ranked: Vec<(KeywordTier, usize, String)> = Vec::new();
        for (term, cand) in candidates {
            if !self.is_informative(&term) {
                stats.dropped += 1;
                continue;
            }
            match cand.origin {
                Origin::Dictionary => stats.dictionary_hits += 1,
                Origin::Pattern => stats.pattern_hits += 1,
                Origin::Generic => stats.generic_hits += 1,
            }
            ranked.push((Self::tier(&term, &cand), cand.first_pos, term));
        }
        // Longer terms first at equal position, then text, for a total order.
        ranked.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(b.2.chars().count().cmp(&a.2.chars().count()))
                .then(a.2.cmp(&b.2))
        });
        if ranked.len() > self.max_keywords {
            stats.truncated = ranked.len() - self.max_keywords;
            ranked.truncate(self.max_keywords);
        }

        let keywords: Vec<String> = ranked.iter().map(|(_, _, t)| t.clone()).collect();
        let tiers = ranked.into_iter().map(|(tier, _, t)| (t, tier)).collect();
        let fallback_terms = if keywords.is_empty() { raw_tokens(&normalized) } else { Vec::new() };
        KeywordSet { keywords, tiers, fallback_terms, stats }
    }

    fn scan(&self, candidates: &mut HashMap<String, Candidate>, re: &Regex, text: &str, origin: Origin) {
        let mut seen: HashMap<String, (usize, usize)> = HashMap::new();
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else { continue };
            let term = self.canonicalize(m.as_str());
            let entry = seen.entry(term).or_insert((m.start(), 0));
            entry.1 += 1;
        }
        for (term, (first, freq)) in seen {
            let origin = if self.surface_to_canonical.values().any(|c| *c == term) { Origin::Dictionary } else { origin };
            Self::record(candidates, &term, origin, first, freq);
        }
    }

    fn canonicalize(&self, term: &str) -> String {
        self.surface_to_canonical.get(term).cloned().unwrap_or_else(|| term.to_string())
    }

    fn record(candidates: &mut HashMap<String, Candidate>, term: &str, origin: Origin, pos: usize, freq: usize) {
        let entry = candidates.entry(term.to_string()).or_insert(Candidate { origin, first_pos: pos, freq: 0 });
        entry.origin = entry.origin.min(origin);
        entry.first_pos = entry.first_pos.min(pos);
        entry.freq = entry.freq.max(freq);
    }

    fn is_informative(&self, term: &str) -> bool {
        let chars = term.chars().count();
        chars >= self.min_term_chars
            && !self.stopwords.contains(term)
            && !term.chars().all(|c| c.is_ascii_digit())
    }

    fn tier(term: &str, cand: &Candidate) -> KeywordTier {
        let specific = term.chars().count() >= 3;
        let repeated = cand.freq >= 2;
        match cand.origin {
            Origin::Dictionary if specific || repeated => KeywordTier::Critical,
            Origin::Dictionary => KeywordTier::High,
            Origin::Pattern if term.chars().count() >= 4 || repeated => KeywordTier::High,
            Origin::Pattern => KeywordTier::Medium,
            Origin::Generic if repeated => KeywordTier::Medium,
            Origin::Generic => KeywordTier::Low,
        }
    }
}
