use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faqmatch::persist::{load_index, load_index_checked, save_index, IndexPaths};
use faqmatch::{load_corpus, FaqIndex, IdfWeighting, MatchOutcome, MatcherConfig, DEFAULT_THRESHOLD};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query TF-IDF indexes over FAQ corpora", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a corpus file or directory and write it to disk
    Build {
        /// Corpus path (.json, .jsonl or a directory of them)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Use IDF = ln(N/df) instead of the smoothed ln((1+N)/(1+df)) + 1
        #[arg(long, default_value_t = false)]
        plain_idf: bool,
        /// Use 1 + ln(tf) for term frequencies
        #[arg(long, default_value_t = false)]
        sublinear_tf: bool,
        /// Stem terms with the English Snowball stemmer
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Relevance threshold stored with the index
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
    },
    /// Match one question and print the outcome as JSON
    Query {
        /// Persisted index directory
        #[arg(long)]
        index: Option<PathBuf>,
        /// Corpus to build from, or to check a persisted index against
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Question text
        #[arg(long)]
        q: String,
        /// Override the index's relevance threshold
        #[arg(long)]
        threshold: Option<f32>,
    },
}

#[derive(Serialize)]
struct QueryReport<'a> {
    query: &'a str,
    threshold: f32,
    outcome: MatchOutcome<'a>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, plain_idf, sublinear_tf, stem, threshold } => {
            let idf = if plain_idf { IdfWeighting::Plain } else { IdfWeighting::Smooth };
            build(&input, &output, MatcherConfig { threshold, idf, sublinear_tf, stem })
        }
        Commands::Query { index, corpus, q, threshold } => {
            let index = open_index(index.as_deref(), corpus.as_deref())?;
            let threshold = threshold.unwrap_or(index.config().threshold);
            let outcome = index.find_best_above(&q, threshold).context("invalid --threshold")?;
            let report = QueryReport { query: &q, threshold, outcome };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn build(input: &Path, output: &Path, config: MatcherConfig) -> Result<()> {
    let entries = load_corpus(input).with_context(|| format!("load corpus {}", input.display()))?;
    tracing::info!(num_entries = entries.len(), input = %input.display(), "loaded corpus");
    let index = FaqIndex::build_with(entries, config).context("build index")?;
    save_index(&IndexPaths::new(output), &index).context("save index")?;
    tracing::info!(output = %output.display(), num_terms = index.num_terms(), "index build complete");
    Ok(())
}

fn open_index(index: Option<&Path>, corpus: Option<&Path>) -> Result<FaqIndex> {
    match (index, corpus) {
        (Some(dir), Some(corpus)) => {
            let entries = load_corpus(corpus).with_context(|| format!("load corpus {}", corpus.display()))?;
            Ok(load_index_checked(&IndexPaths::new(dir), &entries)?)
        }
        (Some(dir), None) => Ok(load_index(&IndexPaths::new(dir))?),
        (None, Some(corpus)) => {
            let entries = load_corpus(corpus).with_context(|| format!("load corpus {}", corpus.display()))?;
            Ok(FaqIndex::build(entries)?)
        }
        (None, None) => bail!("either --index or --corpus is required"),
    }
}
