//! Explorer server: node RPC proxy plus JSON API over the retrieval core.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use tx_explorer::config::{load_config, ExplorerConfig};
use tx_explorer::lifecycle::Shutdown;
use tx_explorer::observability::{init_logging, metrics};
use tx_explorer::proxy::ExplorerServer;
use tx_explorer::retrieval::RetrievalOrchestrator;

#[derive(Parser)]
#[command(name = "tx-explorer")]
#[command(about = "Transaction explorer core: node RPC proxy and retrieval API", long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ExplorerConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tx-explorer starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        timeout_secs = config.retrieval.timeout_secs,
        max_blocks_to_scan = config.retrieval.max_blocks_to_scan,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = Arc::new(RetrievalOrchestrator::from_config(&config)?);
    let server = ExplorerServer::new(&config, Arc::clone(&orchestrator))?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The node tier usually points back at this server, so probe only
    // once the listener is bound.
    let probe = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        probe.probe_tiers().await;
    });

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    shutdown.trigger_on_signal();
    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
