use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ws_root = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
    let db_path = ws_root.join("dev_data/indexes/lancedb");
    let table = std::env::args().nth(1).unwrap_or_else(|| "documents".to_string());
    let conn = kbsearch_vector::table::open_db(&db_path.to_string_lossy()).await?;
    let status = kbsearch_vector::table::table_status(&conn, &table).await?;
    println!("{}: rows={} with_vector={}", table, status.rows, status.with_vector);
    Ok(())
}
