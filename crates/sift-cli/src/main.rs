mod config;
mod wiring;

use clap::{Parser, Subcommand};
use config::SiftConfig;
use sift_cache::InMemoryCacheStore;
use sift_gateway::GatewayServer;
use sift_ingest::IngestionScheduler;
use sift_memory::CorpusSearcher;
use sift_query::QueryOrchestrator;
use sift_security::FixedWindowLimiter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sift", about = "Sift semantic search service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "sift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start ingestion and the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a single ingestion cycle and print its report
    Ingest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        SiftConfig::load(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
        SiftConfig::default()
    };

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Ingest => ingest_once(config).await,
    }
}

async fn serve(config: SiftConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let embedder = wiring::build_embedder(&config.embedding)?;
    let corpus = wiring::build_corpus(&config).await?;
    let source = wiring::build_source(&config.ingest.sources)?;

    let cache = Arc::new(InMemoryCacheStore::with_system_clock(config.cache_settings())?);
    let limiter = Arc::new(FixedWindowLimiter::with_system_clock());
    let searcher = Arc::new(CorpusSearcher::new(
        embedder.clone(),
        corpus.clone(),
        config.query.excerpt_chars,
    ));
    let orchestrator = Arc::new(QueryOrchestrator::new(
        limiter.clone(),
        cache.clone(),
        searcher,
        config.query_settings(),
    ));

    let scheduler = Arc::new(IngestionScheduler::new(
        source,
        embedder,
        corpus.clone(),
        config.scheduler_settings(),
    ));
    let ingestion = scheduler.spawn();

    let (stop_tx, stop_rx) = watch::channel(false);
    let maintenance = wiring::spawn_maintenance(
        cache,
        limiter,
        Duration::from_secs(config.maintenance.interval_secs),
        stop_rx,
    );

    let app = GatewayServer::build(orchestrator, corpus);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Sift listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        })
        .await?;

    let _ = stop_tx.send(true);
    ingestion.stop().await;
    let _ = maintenance.await;
    info!("Sift stopped");
    Ok(())
}

async fn ingest_once(config: SiftConfig) -> anyhow::Result<()> {
    let embedder = wiring::build_embedder(&config.embedding)?;
    let corpus = wiring::build_corpus(&config).await?;
    let source = wiring::build_source(&config.ingest.sources)?;

    let scheduler = IngestionScheduler::new(source, embedder, corpus, config.scheduler_settings());
    let report = scheduler.run_cycle().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
