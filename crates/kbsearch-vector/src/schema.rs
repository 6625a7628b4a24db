use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const CHUNK_ID: &str = "chunk_id";
pub const PAGE_ID: &str = "page_id";
pub const CHUNK_INDEX: &str = "chunk_index";
pub const VECTOR: &str = "vector";
/// Column LanceDB appends to vector search results.
pub const DISTANCE: &str = "_distance";

/// The similarity table only carries what retrieval needs; chunk text and
/// labels are read back from the chunk store.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(CHUNK_ID, DataType::Utf8, false),
        Field::new(PAGE_ID, DataType::Int64, false),
        Field::new(CHUNK_INDEX, DataType::Int32, false),
        Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}
