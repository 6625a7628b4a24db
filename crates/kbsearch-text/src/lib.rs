//! kbsearch-text
//!
//! Query-time keyword extraction and the tantivy-backed inverted index that
//! serves the lexical retrieval path and chunk lookups.

pub mod index;
pub mod keywords;
pub mod tantivy_utils;

pub use index::TantivyIndex;
pub use keywords::KeywordExtractor;
