use anyhow::Result;
use axum::Router;
use clap::Parser;
use faqmatch::{IdfWeighting, MatcherConfig, DEFAULT_THRESHOLD};
use server::{build_app, AppSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// FAQ corpus (.json, .jsonl or a directory of them)
    #[arg(long, default_value = "./data/ecommerce_faq.json")]
    corpus: PathBuf,
    /// Persisted index directory built by `indexer build`
    #[arg(long)]
    index: Option<PathBuf>,
    /// Stem terms when building the index from the corpus
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Relevance threshold for accepting a match
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let matcher = MatcherConfig { threshold: args.threshold, idf: IdfWeighting::Smooth, sublinear_tf: false, stem: args.stem };
    let settings = AppSettings::from_env(args.corpus, args.index, matcher)?;
    let app: Router = build_app(settings)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
