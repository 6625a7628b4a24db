use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use tracing::debug;

use kbsearch_core::traits::{VectorIndex, VectorMatch};

use crate::schema::{CHUNK_ID, DISTANCE};

/// L2 nearest-neighbour search over a LanceDB chunk table.
pub struct LanceVectorIndex {
    table: Table,
}

impl LanceVectorIndex {
    pub async fn open(db: &Connection, table_name: &str) -> Result<Self> {
        let table = db
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| anyhow!("Failed to open LanceDB table '{}': {}", table_name, e))?;
        Ok(Self { table })
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let mut stream = self
            .table
            .vector_search(vector.to_vec())?
            .distance_type(DistanceType::L2)
            .select(Select::columns(&[CHUNK_ID]))
            .limit(k.max(1))
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = batch
                .column_by_name(CHUNK_ID)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("search result has no {} column", CHUNK_ID))?;
            let distances = batch
                .column_by_name(DISTANCE)
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("search result has no {} column", DISTANCE))?;
            for i in 0..batch.num_rows() {
                if ids.is_null(i) || distances.is_null(i) {
                    continue;
                }
                hits.push(VectorMatch { chunk_id: ids.value(i).to_string(), distance: distances.value(i) });
            }
        }
        debug!(k, hits = hits.len(), "lance vector search");
        Ok(hits)
    }
}
