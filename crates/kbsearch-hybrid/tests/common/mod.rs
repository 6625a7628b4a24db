#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use kbsearch_core::config::Settings;
use kbsearch_core::traits::{ChunkStore, Embedder, LexicalField, LexicalIndex, LexicalMatch, VectorIndex, VectorMatch};
use kbsearch_core::types::DocumentChunk;
use kbsearch_hybrid::{Corpus, SearchPipeline};

pub fn chunk(page_id: i64, chunk_index: usize, title: &str, content: &str, labels: &[&str]) -> DocumentChunk {
    DocumentChunk {
        chunk_id: format!("{page_id}-{chunk_index}"),
        page_id,
        title: title.to_string(),
        content: content.to_string(),
        labels: labels.iter().map(|s| s.to_string()).collect(),
        url: format!("https://kb.example/pages/{page_id}"),
        chunk_index,
        vector: Vec::new(),
    }
}

/// Chunk store over a fixed set of chunks.
pub struct MemoryStore {
    chunks: HashMap<String, DocumentChunk>,
}

impl MemoryStore {
    pub fn new(chunks: impl IntoIterator<Item = DocumentChunk>) -> Self {
        Self { chunks: chunks.into_iter().map(|c| (c.chunk_id.clone(), c)).collect() }
    }
}

impl ChunkStore for MemoryStore {
    fn get_chunk(&self, chunk_id: &str) -> Result<Option<DocumentChunk>> {
        Ok(self.chunks.get(chunk_id).cloned())
    }
}

/// Switches and counters shared by the scripted doubles.
#[derive(Default)]
pub struct Probe {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn hit(&self) -> (bool, Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.failing.load(Ordering::SeqCst), Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)))
    }
}

/// Returns the same matches for every query vector.
pub struct ScriptedVectorIndex {
    matches: Vec<VectorMatch>,
    pub probe: Probe,
}

impl ScriptedVectorIndex {
    pub fn new(matches: &[(&str, f32)]) -> Self {
        let matches = matches.iter().map(|(id, d)| VectorMatch { chunk_id: id.to_string(), distance: *d }).collect();
        Self { matches, probe: Probe::default() }
    }
}

#[async_trait]
impl VectorIndex for ScriptedVectorIndex {
    async fn search(&self, _vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let (failing, delay) = self.probe.hit();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if failing {
            bail!("vector backend unreachable");
        }
        Ok(self.matches.iter().take(k).cloned().collect())
    }
}

/// Exact L2 search over stored vectors.
pub struct BruteForceVectorIndex {
    vectors: Vec<(String, Vec<f32>)>,
}

impl BruteForceVectorIndex {
    pub fn new(chunks: &[DocumentChunk]) -> Self {
        Self { vectors: chunks.iter().map(|c| (c.chunk_id.clone(), c.vector.clone())).collect() }
    }
}

#[async_trait]
impl VectorIndex for BruteForceVectorIndex {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let mut hits: Vec<VectorMatch> = self
            .vectors
            .iter()
            .map(|(id, v)| {
                let distance = v.iter().zip(vector).map(|(a, b)| (a - b) * (a - b)).sum::<f32>().sqrt();
                VectorMatch { chunk_id: id.clone(), distance }
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Returns fixed content and title matches for any non-empty term list.
pub struct ScriptedLexicalIndex {
    content: Vec<LexicalMatch>,
    title: Vec<LexicalMatch>,
    pub probe: Probe,
}

impl ScriptedLexicalIndex {
    pub fn new(content: &[(&str, f32)], title: &[(&str, f32)]) -> Self {
        let to_matches = |m: &[(&str, f32)]| -> Vec<LexicalMatch> {
            m.iter().map(|(id, r)| LexicalMatch { chunk_id: id.to_string(), relevance: *r }).collect()
        };
        Self { content: to_matches(content), title: to_matches(title), probe: Probe::default() }
    }
}

impl LexicalIndex for ScriptedLexicalIndex {
    fn query(&self, terms: &[String], field: LexicalField, k: usize) -> Result<Vec<LexicalMatch>> {
        let (failing, delay) = self.probe.hit();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if failing {
            bail!("lexical index unavailable");
        }
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let source = match field {
            LexicalField::Content => &self.content,
            LexicalField::Title => &self.title,
        };
        Ok(source.iter().take(k).cloned().collect())
    }
}

/// Constant unit vector; counts calls.
pub struct FixedEmbedder {
    dim: usize,
    pub probe: Probe,
}

impl FixedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, probe: Probe::default() }
    }
}

impl Embedder for FixedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        512
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (failing, _) = self.probe.hit();
        if failing {
            bail!("embedding model not loaded");
        }
        let mut v = vec![0.0; self.dim];
        if let Some(first) = v.first_mut() {
            *first = 1.0;
        }
        Ok(texts.iter().map(|_| v.clone()).collect())
    }
}

/// Four pages, one chunk each: `1-0` .. `4-0`. Page 3 is a meeting note.
pub fn abcd_chunks() -> Vec<DocumentChunk> {
    vec![
        chunk(1, 0, "教室の作成", "新しい教室を作成します。", &["faq"]),
        chunk(2, 0, "教室コピー機能", "教室コピーで設定を複製します。", &["faq"]),
        chunk(3, 0, "定例会 議事録", "教室運用について議論した。", &["meeting-notes"]),
        chunk(4, 0, "コピーできない項目", "生徒情報はコピーされません。", &["faq"]),
    ]
}

/// Doubles wired into a pipeline, with handles kept for assertions.
pub struct Harness {
    pub pipeline: SearchPipeline,
    pub vector: Arc<ScriptedVectorIndex>,
    pub lexical: Arc<ScriptedLexicalIndex>,
    pub embedder: Arc<FixedEmbedder>,
}

impl Harness {
    /// Vector path returns pages A, B, C (1, 2, 3); lexical returns B, D (2, 4).
    pub fn abc_bd() -> Self {
        Self::with(Settings::default(), &[("1-0", 0.0), ("2-0", 0.0), ("3-0", 0.0)], &[("2-0", 2.0), ("4-0", 2.0)], &[])
    }

    pub fn with(settings: Settings, vector: &[(&str, f32)], content: &[(&str, f32)], title: &[(&str, f32)]) -> Self {
        Self::with_chunks(settings, abcd_chunks(), vector, content, title)
    }

    pub fn with_chunks(
        settings: Settings,
        chunks: Vec<DocumentChunk>,
        vector: &[(&str, f32)],
        content: &[(&str, f32)],
        title: &[(&str, f32)],
    ) -> Self {
        let vector = Arc::new(ScriptedVectorIndex::new(vector));
        let lexical = Arc::new(ScriptedLexicalIndex::new(content, title));
        let embedder = Arc::new(FixedEmbedder::new(4));
        let store = Arc::new(MemoryStore::new(chunks));
        let corpus = Corpus::new(vector.clone(), lexical.clone(), store, &settings.search);
        let pipeline = SearchPipeline::builder(settings, embedder.clone())
            .corpus("documents", corpus)
            .build()
            .expect("pipeline");
        Self { pipeline, vector, lexical, embedder }
    }

    pub fn backend_calls(&self) -> (usize, usize, usize) {
        (self.embedder.probe.calls(), self.vector.probe.calls(), self.lexical.probe.calls())
    }
}
