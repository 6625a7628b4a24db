//! Hybrid retrieval: two independently scored retrieval paths reconciled into
//! one ranked, page-deduplicated list.
//!
//! ```text
//! SearchRequest ─ validate ─┬─ KeywordExtractor ─ LexicalRetriever ─┐
//!                           └─ Embedder ───────── VectorRetriever ──┴─ LabelFilter ─ FusionEngine ─ ResultCache
//! ```

pub mod adapters;
pub mod cache;
pub mod filter;
pub mod fusion;
pub mod pipeline;

pub use adapters::{LexicalRetriever, VectorRetriever};
pub use cache::{CacheOutcome, CacheStats, ResultCache};
pub use filter::LabelFilter;
pub use fusion::FusionEngine;
pub use pipeline::{Corpus, PipelineBuilder, SearchPipeline};
