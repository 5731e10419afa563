use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docrag_core::config::{Config, Settings};
use docrag_core::extract::{load_documents, PlainTextExtractor};
use docrag_core::segmenter::Segmenter;
use docrag_core::traits::Embedder;
use docrag_core::types::{Metadata, SearchResult};
use docrag_decision::QueryParser;
use docrag_embed::default_embedder;
use docrag_retrieval::RetrievalService;
use docrag_vector::{snapshot, FlatIndex};

const INGEST_BATCH: usize = 16;
const PREVIEW_CHARS: usize = 240;

const USAGE: &str = "Usage: docrag <command> [args...]

Commands:
  ingest [DIR] [--limit N] [--fresh]   Index new .txt/.md files (default: data.raw_txt_dir)
  query \"<text>\" [-k N] [--structured] Retrieve the most similar segments
  status                               Show what the index holds";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn usage_exit(msg: &str) -> ! {
    eprintln!("Error: {msg}\n\n{USAGE}");
    process::exit(2);
}

fn parse_count(flag: &str, value: Option<&String>) -> usize {
    match value.map(|v| v.parse::<usize>()) {
        Some(Ok(n)) => n,
        _ => usage_exit(&format!("{flag} requires a number")),
    }
}

struct Runtime {
    settings: Settings,
    index_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    segmenter: Segmenter,
}

impl Runtime {
    fn new(config: &Config) -> anyhow::Result<Self> {
        let settings = config.settings()?;
        let index_dir = settings.index_dir(config.base_dir());
        let embedder = default_embedder(settings.embedding.dimension, settings.embedding.cache_capacity)?;
        let segmenter = Segmenter::new(settings.segmenter)?;
        Ok(Self { settings, index_dir, embedder, segmenter })
    }

    fn has_snapshot(&self) -> bool {
        snapshot::snapshot_path(&self.index_dir).is_file()
    }

    fn fresh_service(&self) -> anyhow::Result<RetrievalService> {
        let index = FlatIndex::new(self.embedder.dim())?;
        Ok(RetrievalService::new(index, Arc::clone(&self.embedder), self.segmenter.clone())?)
    }

    fn open_service(&self) -> anyhow::Result<RetrievalService> {
        if !self.has_snapshot() {
            bail!("no index at {}; run `docrag ingest` first", self.index_dir.display());
        }
        RetrievalService::open(&self.index_dir, Arc::clone(&self.embedder), self.segmenter.clone())
            .with_context(|| format!("failed to open index at {}", self.index_dir.display()))
    }
}

fn ingest(rt: &Runtime, base_dir: &Path, args: &[String]) -> anyhow::Result<()> {
    let mut data_dir = None;
    let mut limit = None;
    let mut fresh = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                limit = Some(parse_count("--limit", args.get(i + 1)));
                i += 1;
            }
            "--fresh" => fresh = true,
            other if !other.starts_with('-') => data_dir = Some(PathBuf::from(other)),
            other => usage_exit(&format!("unknown flag {other}")),
        }
        i += 1;
    }
    let data_dir = data_dir.unwrap_or_else(|| rt.settings.raw_txt_dir(base_dir));

    println!("docrag ingest\n=============");
    println!("Data directory: {}", data_dir.display());
    println!("Index directory: {}", rt.index_dir.display());

    let service = if fresh || !rt.has_snapshot() { rt.fresh_service()? } else { rt.open_service()? };
    let before = service.len();

    let mut docs = load_documents(&data_dir, &PlainTextExtractor, limit)
        .with_context(|| format!("failed to read documents from {}", data_dir.display()))?;
    if docs.is_empty() {
        println!("No .txt or .md files found.");
        return Ok(());
    }
    if before > 0 {
        let indexed = service.document_ids();
        let found = docs.len();
        docs.retain(|d| !indexed.contains(&d.id));
        let skipped = found - docs.len();
        if skipped > 0 {
            println!("Skipping {skipped} already indexed documents (use --fresh to rebuild)");
        }
        if docs.is_empty() {
            println!("Nothing new to ingest.");
            return Ok(());
        }
    }

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut segments = 0;
    for batch in docs.chunks(INGEST_BATCH) {
        segments += service.ingest_many(batch, &Metadata::new())?;
        pb.inc(batch.len() as u64);
        pb.set_message(format!("{segments} segments"));
    }
    pb.finish_with_message(format!("{segments} segments"));

    service.persist(&rt.index_dir)?;
    info!(documents = docs.len(), segments, "ingest finished");
    println!("\n✅ Ingested {} documents ({} segments, {} entries total)", docs.len(), segments, before + segments);
    Ok(())
}

fn query(rt: &Runtime, args: &[String]) -> anyhow::Result<()> {
    let mut text = None;
    let mut k = rt.settings.retrieval.top_k;
    let mut structured = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-k" | "--top-k" => {
                k = parse_count("-k", args.get(i + 1));
                i += 1;
            }
            "--structured" => structured = true,
            other if !other.starts_with('-') && text.is_none() => text = Some(other.to_string()),
            other => usage_exit(&format!("unexpected argument {other}")),
        }
        i += 1;
    }
    let Some(text) = text else { usage_exit("query text is required") };

    let service = rt.open_service()?;
    let results = if structured {
        let parsed = QueryParser::new().parse(&text, None);
        if parsed.is_empty() {
            println!("No structured fields found; searching the raw text.");
            service.retrieve(&text, k)?
        } else {
            println!("Parsed query: {}", parsed.to_search_text());
            service.retrieve_structured(&parsed, k)?
        }
    } else {
        service.retrieve(&text, k)?
    };

    println!("\n🔍 {} results for \"{}\"", results.len(), text);
    for (i, r) in results.iter().enumerate() {
        print_result(i + 1, r);
    }
    Ok(())
}

fn print_result(rank: usize, r: &SearchResult) {
    let doc = r.metadata.get("doc_id").and_then(|v| v.as_str()).unwrap_or("-");
    let chunk = r.metadata.get("chunk_index").map(ToString::to_string).unwrap_or_else(|| "-".to_string());
    println!("\n  {rank}. score={:.4}  doc={doc}  chunk={chunk}", r.score);
    let preview: String = r.content.chars().take(PREVIEW_CHARS).collect();
    let ellipsis = if r.content.chars().count() > PREVIEW_CHARS { "…" } else { "" };
    println!("     {}{ellipsis}", preview.replace('\n', " "));
}

fn status(rt: &Runtime) -> anyhow::Result<()> {
    if !rt.has_snapshot() {
        println!("No index at {}", rt.index_dir.display());
        return Ok(());
    }
    let status = rt.open_service()?.status();
    println!("Index directory: {}", rt.index_dir.display());
    println!("Entries:         {}", status.entries);
    println!("Dimension:       {}", status.dimension);
    println!("Embedder:        {}", status.embedder_id);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage_exit("missing command");
    }
    let cmd = args.remove(0);
    if matches!(cmd.as_str(), "-h" | "--help" | "help") {
        println!("{USAGE}");
        return Ok(());
    }

    let config = Config::load().context("failed to load configuration")?;
    let rt = Runtime::new(&config)?;
    match cmd.as_str() {
        "ingest" => ingest(&rt, config.base_dir(), &args),
        "query" => query(&rt, &args),
        "status" => status(&rt),
        other => usage_exit(&format!("unknown command {other}")),
    }
}
