//! `ctxopt` CLI.
//!
//! A thin demonstration harness around `ctxopt-core`: loads a
//! caller-supplied JSON corpus of code chunks, embeds it with a toy
//! deterministic `EmbeddingProvider`, and runs a query through
//! `Orchestrator::reconstruct_prompt`.

mod config;
mod demo_embedder;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ctxopt_core::collaborators::{CancellationToken, SystemClock};
use ctxopt_core::config::PipelineConfig;
use ctxopt_core::metrics::MetricsRecorder;
use ctxopt_core::orchestrator::Orchestrator;
use ctxopt_core::types::{CodeChunk, ScoringContext};
use ctxopt_core::vector_index::VectorIndex;
use ctxopt_core::{Clock, Corpus, EmbeddingProvider};
use serde::Deserialize;

use demo_embedder::HashEmbeddingProvider;

/// ctxopt - retrieval and token-optimization pipeline for AI coding agents
#[derive(Parser, Debug)]
#[command(name = "ctxopt", version, about = "Retrieval and token-optimization pipeline demo")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Log level (overrides the resolved config's log level).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a query through the pipeline against a JSON corpus file.
    Optimize {
        /// Path to a JSON file containing an array of chunk objects.
        corpus: PathBuf,

        /// Natural-language query.
        query: String,

        /// Token budget (overrides the resolved config's default).
        #[arg(long)]
        budget: Option<u32>,

        /// File the user currently has open, for proximity scoring.
        #[arg(long)]
        current_file: Option<String>,
    },

    /// Manage configuration.
    Config {
        /// Show current effective configuration.
        #[arg(long)]
        show: bool,

        /// Initialize a `.ctxopt/config.toml` in the current directory.
        #[arg(long)]
        init: bool,
    },
}

/// One entry in the caller-supplied JSON corpus file. Missing an
/// embedding deliberately: this demo calls the `EmbeddingProvider`
/// itself rather than accepting precomputed vectors.
#[derive(Debug, Deserialize)]
struct DemoChunkInput {
    id: String,
    file_path: String,
    name: String,
    #[serde(default = "DemoChunkInput::default_kind")]
    kind: String,
    #[serde(default)]
    language: String,
    #[serde(default = "DemoChunkInput::default_line")]
    start_line: u32,
    #[serde(default = "DemoChunkInput::default_line")]
    end_line: u32,
    content: String,
}

impl DemoChunkInput {
    fn default_kind() -> String {
        "function".to_string()
    }

    fn default_line() -> u32 {
        1
    }
}

fn parse_chunk_kind(raw: &str) -> ctxopt_core::types::ChunkKind {
    use ctxopt_core::types::ChunkKind;
    match raw {
        "class" => ChunkKind::Class,
        "method" => ChunkKind::Method,
        "statement" => ChunkKind::Statement,
        "file" => ChunkKind::File,
        _ => ChunkKind::Function,
    }
}

fn load_corpus(path: &PathBuf, embedder: &HashEmbeddingProvider, now: i64) -> Result<Vec<CodeChunk>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading corpus file {}", path.display()))?;
    let inputs: Vec<DemoChunkInput> =
        serde_json::from_str(&raw).with_context(|| format!("parsing corpus JSON in {}", path.display()))?;
    if inputs.is_empty() {
        anyhow::bail!("corpus file {} contains no chunks", path.display());
    }

    let texts: Vec<String> = inputs.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder
        .embed(&texts)
        .map_err(|e| anyhow::anyhow!("embedding corpus: {e}"))?;

    Ok(inputs
        .into_iter()
        .zip(embeddings)
        .map(|(input, embedding)| CodeChunk {
            id: input.id,
            file_path: input.file_path,
            name: input.name,
            kind: parse_chunk_kind(&input.kind),
            language: input.language,
            start_line: input.start_line,
            end_line: input.end_line,
            checksum: demo_embedder::content_checksum(&input.content),
            content: input.content,
            embedding,
            created_at: now,
            symbols: Default::default(),
        })
        .collect())
}

fn run_optimize(corpus: PathBuf, query: String, budget: Option<u32>, current_file: Option<String>, config: &config::CliConfig) -> Result<()> {
    let clock = SystemClock;
    let now = clock.now_millis();
    let embedder = HashEmbeddingProvider::new(config.embedding_dimension);

    let chunks = load_corpus(&corpus, &embedder, now)?;
    tracing::info!(chunk_count = chunks.len(), "loaded corpus");

    let index = VectorIndex::new(config.embedding_dimension);
    index.insert_batch(chunks, now).context("inserting corpus into index")?;

    let metrics = MetricsRecorder::new();
    let orchestrator = Orchestrator::new(PipelineConfig::default(), &embedder, &clock, &metrics, true);
    let context = ScoringContext { current_file, now, ..Default::default() };
    let budget = budget.unwrap_or(config.default_budget);

    let started = Instant::now();
    let result = orchestrator
        .reconstruct_prompt(&query, Corpus::Index(&index), budget, context, &CancellationToken::new())
        .context("running reconstruct_prompt")?;
    let elapsed = started.elapsed();

    println!("{}", result.prompt);
    println!("\n---");
    println!(
        "tokens_used={} model={} chunks={} savings={:.1}% elapsed={:?}",
        result.tokens_used,
        result.model,
        result.chunks.len(),
        result.savings.percentage,
        elapsed
    );
    println!("{}", metrics.summary().render());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = config::CliConfig::load(&project_dir)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    tracing_subscriber::fmt().with_env_filter(&config.log_level).init();

    match cli.command {
        Commands::Optimize { corpus, query, budget, current_file } => {
            run_optimize(corpus, query, budget, current_file, &config)?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = config::write_default_config(&project_dir)?;
                println!("Initialized {}", path.display());
            }
            if show {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            if !show && !init {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
