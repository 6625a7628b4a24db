//! On-disk layout of the lexical indexes: one tantivy directory per table.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use kbsearch_text::TantivyIndex;

/// Directory holding `table`'s tantivy index under `root`.
///
/// Table names are used as directory names, so only ASCII letters, digits,
/// `_` and `-` are accepted.
pub fn tantivy_dir_for(root: &Path, table: &str) -> Result<PathBuf> {
    let valid = !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(anyhow!("invalid table name '{}': use ASCII letters, digits, '_' or '-'", table));
    }
    Ok(root.join(table))
}

/// Open the index in `dir`, creating it when absent or when `rebuild` is set.
pub fn open_or_create_index(dir: &Path, rebuild: bool) -> Result<TantivyIndex> {
    if !rebuild && dir.join("meta.json").exists() {
        return TantivyIndex::open_in_dir(dir);
    }
    TantivyIndex::create_in_dir(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbsearch_core::traits::{ChunkStore, LexicalField, LexicalIndex};
    use kbsearch_core::types::DocumentChunk;

    fn chunk(page_id: i64, title: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: format!("{page_id}-0"),
            page_id,
            title: title.to_string(),
            content: format!("{title}の説明"),
            labels: Default::default(),
            url: String::new(),
            chunk_index: 0,
            vector: Vec::new(),
        }
    }

    #[test]
    fn tables_get_separate_lexical_indexes() {
        let root = tempfile::TempDir::new().unwrap();
        let docs_dir = tantivy_dir_for(root.path(), "documents").unwrap();
        let archive_dir = tantivy_dir_for(root.path(), "archive").unwrap();
        assert_ne!(docs_dir, archive_dir);

        open_or_create_index(&docs_dir, false).unwrap().index_chunks(&[chunk(1, "教室コピー")]).unwrap();
        open_or_create_index(&archive_dir, false).unwrap().index_chunks(&[chunk(2, "教室コピー旧版")]).unwrap();

        let docs = open_or_create_index(&docs_dir, false).unwrap();
        assert_eq!(docs.num_chunks(), 1);
        let terms = vec!["教室".to_string()];
        let hits = docs.query(&terms, LexicalField::Content, 10).unwrap();
        assert_eq!(hits.iter().map(|h| h.chunk_id.as_str()).collect::<Vec<_>>(), ["1-0"]);
        let titles = docs.query(&terms, LexicalField::Title, 10).unwrap();
        assert!(titles.iter().all(|h| h.chunk_id == "1-0"));
        assert!(docs.get_chunk("2-0").unwrap().is_none());
    }

    #[test]
    fn reopening_keeps_documents_unless_rebuilding() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = tantivy_dir_for(root.path(), "documents").unwrap();
        open_or_create_index(&dir, false).unwrap().index_chunks(&[chunk(1, "請求書")]).unwrap();
        assert_eq!(open_or_create_index(&dir, false).unwrap().num_chunks(), 1);
        assert_eq!(open_or_create_index(&dir, true).unwrap().num_chunks(), 0);
    }

    #[test]
    fn table_names_must_be_plain_directory_names() {
        let root = Path::new("/indexes");
        assert_eq!(tantivy_dir_for(root, "kb_2024-v1").unwrap(), root.join("kb_2024-v1"));
        for bad in ["", "..", "a/b", "../etc", "教室"] {
            assert!(tantivy_dir_for(root, bad).is_err(), "{bad}");
        }
    }
}
