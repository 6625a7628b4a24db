//! JSON-lines chunk files and embedding backfill for ingest.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use kbsearch_core::traits::Embedder;
use kbsearch_core::types::DocumentChunk;

/// One `DocumentChunk` per line (camelCase keys). Blank lines are skipped;
/// a repeated `chunkId` keeps the first occurrence.
pub fn load_chunks(path: &Path) -> Result<Vec<DocumentChunk>> {
    let file = File::open(path).with_context(|| format!("Failed to open chunk file {}", path.display()))?;
    let mut seen = HashSet::new();
    let mut chunks = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: DocumentChunk = serde_json::from_str(&line)
            .map_err(|e| anyhow!("{}:{}: invalid chunk: {}", path.display(), n + 1, e))?;
        if !seen.insert(chunk.chunk_id.clone()) {
            warn!(chunk_id = %chunk.chunk_id, line = n + 1, "duplicate chunk id skipped");
            continue;
        }
        chunks.push(chunk);
    }
    info!(chunks = chunks.len(), file = %path.display(), "chunks loaded");
    Ok(chunks)
}

/// Embed `title + content` for every chunk that arrived without a vector and
/// check that the ones that did match the embedder's dimensionality.
pub fn embed_missing(embedder: &dyn Embedder, chunks: &mut [DocumentChunk], batch_size: usize) -> Result<usize> {
    let dim = embedder.dim();
    if let Some(bad) = chunks.iter().find(|c| !c.vector.is_empty() && c.vector.len() != dim) {
        return Err(anyhow!("chunk {} carries a {}-dim vector, embedder produces {}", bad.chunk_id, bad.vector.len(), dim));
    }
    let missing: Vec<usize> = chunks.iter().enumerate().filter(|(_, c)| c.vector.is_empty()).map(|(i, _)| i).collect();
    if missing.is_empty() {
        return Ok(0);
    }
    let pb = ProgressBar::new(missing.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embeddings ({percent}%)")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    for batch in missing.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|&i| format!("{}\n{}", chunks[i].title, chunks[i].content)).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != batch.len() {
            return Err(anyhow!("embedder returned {} vectors for {} texts", vectors.len(), batch.len()));
        }
        for (&i, v) in batch.iter().zip(vectors) {
            chunks[i].vector = v;
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    Ok(missing.len())
}
