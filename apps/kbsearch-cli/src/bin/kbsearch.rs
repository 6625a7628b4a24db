use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kbsearch_cli::chunks::{embed_missing, load_chunks};
use kbsearch_cli::layout::{open_or_create_index, tantivy_dir_for};
use kbsearch_core::config::{resolve_with_base, Config, Settings};
use kbsearch_core::traits::{Embedder, LexicalIndex, VectorIndex};
use kbsearch_core::types::{LabelFilterSpec, SearchRequest};
use kbsearch_embed::get_default_embedder;
use kbsearch_hybrid::{Corpus, SearchPipeline};
use kbsearch_text::{KeywordExtractor, TantivyIndex};
use kbsearch_vector::table::{open_db, table_status};
use kbsearch_vector::{LanceChunkWriter, LanceVectorIndex};

const EMBED_BATCH: usize = 32;

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  kbsearch ingest [chunks.jsonl] [--table T] [--rebuild]");
    eprintln!("  kbsearch query <query> [--top-k N] [--table T] [--no-meeting-notes]");
    eprintln!("                 [--label L]... [--exclude-label L]... [--repeat N]");
    eprintln!("  kbsearch keywords <query>");
    eprintln!("  kbsearch stats [--table T]");
    std::process::exit(2);
}

struct Paths {
    chunks_file: PathBuf,
    tantivy_root: PathBuf,
    lancedb_dir: PathBuf,
}

impl Paths {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let base = std::env::current_dir()?;
        Ok(Self {
            chunks_file: resolve_with_base(&base, &settings.data.chunks_file),
            tantivy_root: resolve_with_base(&base, &settings.data.tantivy_index_dir),
            lancedb_dir: resolve_with_base(&base, &settings.data.lancedb_dir),
        })
    }

    /// Each table owns its lexical index, next to its LanceDB table.
    fn tantivy_dir(&self, table: &str) -> Result<PathBuf> {
        tantivy_dir_for(&self.tantivy_root, table)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let paths = Paths::from_settings(&settings)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else { usage() };
    match command.as_str() {
        "ingest" => ingest(&settings, &paths, rest).await,
        "query" => query(settings, &paths, rest).await,
        "keywords" => keywords(&settings, rest),
        "stats" => stats(&settings, &paths, rest).await,
        "-h" | "--help" => usage(),
        other => {
            eprintln!("Unknown command: {}", other);
            usage()
        }
    }
}

fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i).map(String::as_str).ok_or_else(|| anyhow!("{} requires a value", flag))
}

async fn ingest(settings: &Settings, paths: &Paths, args: &[String]) -> Result<()> {
    let mut file = paths.chunks_file.clone();
    let mut table = settings.search.default_table.clone();
    let mut rebuild = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--table" => table = flag_value(args, &mut i, "--table")?.to_string(),
            "--rebuild" => rebuild = true,
            other if !other.starts_with("--") => file = PathBuf::from(other),
            other => return Err(anyhow!("unknown ingest flag {}", other)),
        }
        i += 1;
    }

    let mut chunks = load_chunks(&file)?;
    if chunks.is_empty() {
        warn!(file = %file.display(), "no chunks to ingest");
        return Ok(());
    }
    let embedder = get_default_embedder()?;
    let embedded = embed_missing(embedder.as_ref(), &mut chunks, EMBED_BATCH)?;
    info!(embedded, total = chunks.len(), "embeddings ready");

    let conn = open_db(&paths.lancedb_dir.to_string_lossy()).await?;
    let written = LanceChunkWriter::new(conn, &table, embedder.dim()).write(&chunks).await?;

    let index = open_or_create_index(&paths.tantivy_dir(&table)?, rebuild)?;
    let indexed = index.index_chunks(&chunks)?;
    println!(
        "Ingested {} chunks into table '{}' ({} vectors written, {} lexical docs, {} newly embedded)",
        chunks.len(),
        table,
        written,
        indexed,
        embedded
    );
    Ok(())
}

async fn query(settings: Settings, paths: &Paths, args: &[String]) -> Result<()> {
    let mut text: Option<String> = None;
    let mut top_k: Option<i64> = None;
    let mut table: Option<String> = None;
    let mut filters = LabelFilterSpec::default();
    let mut repeat = 1usize;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" => top_k = Some(flag_value(args, &mut i, "--top-k")?.parse()?),
            "--table" => table = Some(flag_value(args, &mut i, "--table")?.to_string()),
            "--no-meeting-notes" => filters.include_meeting_notes = false,
            "--label" => {
                filters.include_labels.insert(flag_value(args, &mut i, "--label")?.to_string());
            }
            "--exclude-label" => {
                filters.exclude_labels.insert(flag_value(args, &mut i, "--exclude-label")?.to_string());
            }
            "--repeat" => repeat = flag_value(args, &mut i, "--repeat")?.parse::<usize>()?.max(1),
            other if !other.starts_with("--") && text.is_none() => text = Some(other.to_string()),
            other => return Err(anyhow!("unexpected query argument {}", other)),
        }
        i += 1;
    }
    let Some(text) = text else { usage() };

    let table_name = table.clone().unwrap_or_else(|| settings.search.default_table.clone());
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder()?);
    let conn = open_db(&paths.lancedb_dir.to_string_lossy()).await?;
    let vector: Arc<dyn VectorIndex> = Arc::new(LanceVectorIndex::open(&conn, &table_name).await?);
    let index = Arc::new(TantivyIndex::open_in_dir(&paths.tantivy_dir(&table_name)?)?);
    let lexical: Arc<dyn LexicalIndex> = index.clone();
    let corpus = Corpus::new(vector, lexical, index, &settings.search);
    let pipeline = SearchPipeline::builder(settings, embedder).corpus(table_name, corpus).build()?;

    let mut request = SearchRequest::new(text);
    if let Some(k) = top_k {
        request = request.with_top_k(k);
    }
    if let Some(t) = table {
        request = request.with_table(t);
    }
    if !filters.is_pass_through() {
        request = request.with_label_filters(filters);
    }

    for _ in 0..repeat {
        let response = pipeline.search(request.clone()).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    let stats = pipeline.cache_stats();
    info!(hits = stats.hit_count, misses = stats.miss_count, entries = stats.size, "cache");
    Ok(())
}

fn keywords(settings: &Settings, args: &[String]) -> Result<()> {
    let Some(text) = args.first() else { usage() };
    let set = KeywordExtractor::new(&settings.keywords).extract(text);
    println!("{}", serde_json::to_string_pretty(&set)?);
    Ok(())
}

async fn stats(settings: &Settings, paths: &Paths, args: &[String]) -> Result<()> {
    let mut table = settings.search.default_table.clone();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--table" => table = flag_value(args, &mut i, "--table")?.to_string(),
            other => return Err(anyhow!("unknown stats flag {}", other)),
        }
        i += 1;
    }
    let conn = open_db(&paths.lancedb_dir.to_string_lossy()).await?;
    let status = table_status(&conn, &table).await?;
    let tantivy_dir = paths.tantivy_dir(&table)?;
    let lexical_docs = match TantivyIndex::open_in_dir(&tantivy_dir) {
        Ok(index) => index.num_chunks(),
        Err(e) => {
            warn!(error = %e, "tantivy index unavailable");
            0
        }
    };
    let report = serde_json::json!({
        "table": table,
        "vectorRows": status.rows,
        "rowsWithVector": status.with_vector,
        "lexicalDocs": lexical_docs,
        "lancedbDir": paths.lancedb_dir.display().to_string(),
        "tantivyDir": tantivy_dir.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
