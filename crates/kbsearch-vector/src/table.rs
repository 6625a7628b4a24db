//! LanceDB connection and housekeeping helpers.
use anyhow::Result;
use arrow_array::{Array, FixedSizeListArray};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection};

use crate::schema::VECTOR;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStatus {
    pub rows: usize,
    pub with_vector: usize,
}

/// Count rows and rows carrying a non-null vector.
pub async fn table_status(conn: &Connection, name: &str) -> Result<TableStatus> {
    if !table_exists(conn, name).await? {
        return Ok(TableStatus::default());
    }
    let table = conn.open_table(name).execute().await?;
    let mut status = TableStatus::default();
    let mut stream = table.query().select(Select::columns(&[VECTOR])).execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        status.rows += batch.num_rows();
        if let Some(fsl) = batch.column_by_name(VECTOR).and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()) {
            status.with_vector += (0..batch.num_rows()).filter(|&i| fsl.is_valid(i)).count();
        }
    }
    Ok(status)
}
