use kbsearch_core::traits::VectorIndex;
use kbsearch_core::types::DocumentChunk;
use kbsearch_vector::table::{open_db, table_status};
use kbsearch_vector::{LanceChunkWriter, LanceVectorIndex};
use tempfile::TempDir;

fn chunk(id: &str, page_id: i64, vector: [f32; 4]) -> DocumentChunk {
    DocumentChunk {
        chunk_id: id.to_string(),
        page_id,
        title: String::new(),
        content: String::new(),
        labels: Default::default(),
        url: String::new(),
        chunk_index: 0,
        vector: vector.to_vec(),
    }
}

#[tokio::test]
async fn write_then_search_orders_by_distance() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let conn = open_db(&tmp.path().to_string_lossy()).await?;
    let writer = LanceChunkWriter::new(conn.clone(), "documents", 4);
    let chunks = vec![
        chunk("a", 1, [1.0, 0.0, 0.0, 0.0]),
        chunk("b", 2, [0.0, 1.0, 0.0, 0.0]),
        chunk("c", 3, [0.9, 0.1, 0.0, 0.0]),
    ];
    assert_eq!(writer.write(&chunks).await?, 3);

    let index = LanceVectorIndex::open(&conn, "documents").await?;
    let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk_id, "a");
    assert_eq!(hits[1].chunk_id, "c");
    assert!(hits[0].distance <= hits[1].distance);
    assert!(hits[0].distance.abs() < 1e-6);
    Ok(())
}

#[tokio::test]
async fn rewriting_a_chunk_upserts_instead_of_duplicating() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let conn = open_db(&tmp.path().to_string_lossy()).await?;
    let writer = LanceChunkWriter::new(conn.clone(), "documents", 4);
    writer.write(&[chunk("a", 1, [1.0, 0.0, 0.0, 0.0]), chunk("b", 2, [0.0, 1.0, 0.0, 0.0])]).await?;
    writer.write(&[chunk("a", 1, [0.0, 0.0, 1.0, 0.0])]).await?;

    let status = table_status(&conn, "documents").await?;
    assert_eq!(status.rows, 2);
    assert_eq!(status.with_vector, 2);

    let index = LanceVectorIndex::open(&conn, "documents").await?;
    let hits = index.search(&[0.0, 0.0, 1.0, 0.0], 1).await?;
    assert_eq!(hits[0].chunk_id, "a");
    Ok(())
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let conn = open_db(&tmp.path().to_string_lossy()).await?;
    let writer = LanceChunkWriter::new(conn, "documents", 8);
    let err = writer.write(&[chunk("a", 1, [1.0, 0.0, 0.0, 0.0])]).await.unwrap_err();
    assert!(err.to_string().contains("expects 8"), "{err}");
    Ok(())
}

#[tokio::test]
async fn missing_table_fails_to_open_and_reports_empty_status() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let conn = open_db(&tmp.path().to_string_lossy()).await?;
    assert!(LanceVectorIndex::open(&conn, "nope").await.is_err());
    assert_eq!(table_status(&conn, "nope").await?.rows, 0);
    Ok(())
}
