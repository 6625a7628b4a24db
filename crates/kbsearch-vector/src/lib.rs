//! LanceDB-backed similarity index.
//!
//! [`LanceChunkWriter`] stores `(chunk_id, page_id, chunk_index, vector)`
//! rows; [`LanceVectorIndex`] answers nearest-neighbour queries with the raw
//! L2 distance for each hit.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::LanceVectorIndex;
pub use writer::LanceChunkWriter;
