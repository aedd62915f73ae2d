//! Atomgraph Server Entry Point
//!
//! Serves the retrieval and impact-analysis engine as newline-delimited
//! JSON-RPC 2.0 over stdio. Logging goes to stderr so stdout stays a
//! clean protocol channel.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atomgraph_engine::FusionConfig;
use atomgraph_server::{Backend, Server};

#[derive(Parser)]
#[command(name = "atomgraph-server")]
#[command(about = "Graph-aware retrieval and impact analysis for documentation atoms")]
#[command(version)]
struct Args {
    /// Snapshot document to load at startup (JSON atoms/edges)
    #[arg(long, short)]
    snapshot: Option<PathBuf>,

    /// Embedding provider endpoint; omit to run graph-only
    #[arg(long)]
    embedder_url: Option<String>,

    /// Timeout for embedding and vector-index calls, in milliseconds
    #[arg(long, default_value_t = 2000)]
    vector_timeout_ms: u64,

    /// Retrieval response cache capacity
    #[arg(long, default_value_t = 100)]
    cache_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atomgraph_server=info,atomgraph_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Atomgraph server");

    let vector_timeout = Duration::from_millis(args.vector_timeout_ms);
    let fusion_config = FusionConfig {
        vector_timeout,
        ..FusionConfig::default()
    };

    let backend = Backend::new(
        args.embedder_url,
        vector_timeout,
        fusion_config,
        args.cache_capacity,
    );

    if let Some(path) = &args.snapshot {
        let path = path.to_string_lossy();
        let engines = backend.load_snapshot_file(&path).await?;
        tracing::info!(
            atoms = engines.snapshot.atom_count(),
            edges = engines.snapshot.edge_count(),
            orphans = engines.snapshot.orphan_warnings().len(),
            "snapshot loaded"
        );
    }

    Server::new(backend).run().await?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
