use anyhow::{anyhow, Result};
use arrow_array::{FixedSizeListArray, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use tracing::info;

use kbsearch_core::types::DocumentChunk;

use crate::schema::build_chunk_schema;
use crate::table::table_exists;

const BATCH_SIZE: usize = 1000;

/// Writes chunk vectors into a LanceDB table, upserting on `chunk_id`.
pub struct LanceChunkWriter {
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceChunkWriter {
    pub fn new(db: Connection, table_name: &str, dim: usize) -> Self {
        Self { db, table_name: table_name.to_string(), dim }
    }

    /// Every chunk must carry a vector of the writer's dimensionality.
    pub async fn write(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = chunks.iter().find(|c| c.vector.len() != self.dim) {
            return Err(anyhow!(
                "chunk {} has a {}-dim vector, table '{}' expects {}",
                bad.chunk_id, bad.vector.len(), self.table_name, self.dim
            ));
        }
        info!(chunks = chunks.len(), table = %self.table_name, "writing vectors to LanceDB");
        let pb = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        let mut written = 0usize;
        for batch in chunks.chunks(BATCH_SIZE) {
            self.upsert_batch(batch).await?;
            written += batch.len();
            pb.set_position(written as u64);
        }
        pb.finish_with_message("LanceDB write completed");
        Ok(written)
    }

    async fn upsert_batch(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let record_batch = self.to_record_batch(chunks)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if table_exists(&self.db, &self.table_name).await? {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let mut mi = table.merge_insert(&["chunk_id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            mi.execute(reader).await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    fn to_record_batch(&self, chunks: &[DocumentChunk]) -> Result<RecordBatch> {
        let dim = i32::try_from(self.dim)?;
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        let page_ids: Vec<i64> = chunks.iter().map(|c| c.page_id).collect();
        let chunk_indices = chunks.iter().map(|c| i32::try_from(c.chunk_index)).collect::<Result<Vec<i32>, _>>()?;
        let vectors = chunks.iter().map(|c| Some(c.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
        Ok(RecordBatch::try_new(
            build_chunk_schema(dim),
            vec![
                std::sync::Arc::new(StringArray::from(ids)),
                std::sync::Arc::new(Int64Array::from(page_ids)),
                std::sync::Arc::new(Int32Array::from(chunk_indices)),
                std::sync::Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
            ],
        )?)
    }
}
