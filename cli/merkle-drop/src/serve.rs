use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use merkle_drop::api;
use merkle_drop::config::{ServerConfig, DEFAULT_BIND_ADDRESS, DEFAULT_DATA_DIR};
use merkle_drop::FileStore;

#[derive(Args, Debug)]
pub struct Cli {
    /// Address the HTTP service listens on
    #[arg(short, long, env = "MERKLE_DROP_BIND", default_value = DEFAULT_BIND_ADDRESS)]
    bind: SocketAddr,

    /// Directory merkle tree documents are stored under
    #[arg(short, long, env = "MERKLE_DROP_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            bind_address: cli.bind,
            data_dir: cli.data_dir,
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = ServerConfig::from(cli);
    let store = FileStore::open(&config.data_dir).context("Failed to open tree store")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(config, Arc::new(store)))
}

async fn serve(config: ServerConfig, store: Arc<FileStore>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    info!(
        "Serving merkle trees from {:?} on http://{}",
        config.data_dir,
        listener.local_addr()?
    );

    axum::serve(listener, api::router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
