use std::env;
use std::path::{Path, PathBuf};

use kbsearch_core::traits::{ChunkStore, LexicalField, LexicalIndex};
use kbsearch_text::{KeywordExtractor, TantivyIndex};

// Extract keywords from a query and run them against an existing Tantivy index.
// Usage:
//   cargo run -p kbsearch-text --example search -- "教室コピーの方法" \
//     [--index ../dev_data/indexes/tantivy] [--limit 10] [--title]

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: cargo run -p kbsearch-text --example search -- <query> [--index DIR] [--limit N] [--title]");
        std::process::exit(1);
    }
    let mut query = String::new();
    let mut index_dir: Option<PathBuf> = None;
    let mut limit: usize = 10;
    let mut field = LexicalField::Content;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index" => {
                if i + 1 >= args.len() { eprintln!("--index requires a path"); std::process::exit(2); }
                index_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2; continue;
            }
            "--limit" => {
                if i + 1 >= args.len() { eprintln!("--limit requires a number"); std::process::exit(2); }
                limit = args[i + 1].parse().unwrap_or(limit);
                i += 2; continue;
            }
            "--title" => { field = LexicalField::Title; i += 1; continue; }
            s if s.starts_with('-') => {
                eprintln!("Unknown flag: {}", s); std::process::exit(2);
            }
            s => {
                if query.is_empty() { query = s.to_string(); }
                i += 1; continue;
            }
        }
    }

    // flag > TEXT_INDEX_DIR > workspace-relative fallback
    let index_dir = if let Some(id) = index_dir {
        id
    } else if let Ok(env_path) = env::var("TEXT_INDEX_DIR") {
        PathBuf::from(env_path)
    } else {
        let base = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
        base.join("dev_data/indexes/tantivy")
    };

    let keywords = KeywordExtractor::default().extract(&query);
    println!("Tantivy search\n==============");
    println!("Index   : {}", index_dir.display());
    println!("Query   : {} (limit {})", query, limit);
    println!("Keywords: {:?}", keywords.tiers);
    if keywords.is_empty() {
        println!("Fallback: {:?}", keywords.fallback_terms);
    }
    println!();

    let index = TantivyIndex::open_in_dir(&index_dir)?;
    let hits = index.query(keywords.query_terms(), field, limit)?;
    for (i, h) in hits.iter().enumerate() {
        match index.get_chunk(&h.chunk_id)? {
            Some(c) => println!(
                "{:>2}. score={:.3} page={} chunk={} title={}\n    labels: {:?}",
                i + 1, h.relevance, c.page_id, c.chunk_index, c.title, c.labels
            ),
            None => println!("{:>2}. score={:.3} chunk={} (missing)", i + 1, h.relevance, h.chunk_id),
        }
    }
    Ok(())
}
