//! Gatehouse daemon - HTTP authorization server

use anyhow::{Context, Result};
use clap::Parser;
use gatehouse::config::ServerArgs;
use gatehouse::server::{GatehouseServer, GatehouseServerConfig};
use gatehouse::storage::{MemoryStore, PostgresStore, Store};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gatehoused")]
#[command(about = "Gatehouse namespace authorization daemon")]
#[command(version)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "GATEHOUSE_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    run_server(args).await
}

async fn run_server(args: Args) -> Result<()> {
    let bind_addr = args.server.bind_addr()?;
    let auth = args
        .server
        .auth
        .to_auth_config()
        .context("Invalid auth configuration")?;

    if auth.admin_key.is_none() && auth.admin_group.is_none() {
        warn!("No admin key or admin group configured, namespaces can only be created via the CLI");
    }

    let store: Arc<dyn Store> = match args.server.database.postgres_config()? {
        Some(db_config) => Arc::new(PostgresStore::new(db_config).await?),
        None => {
            warn!("DATABASE_URL not set, using in-memory store; state is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let server = GatehouseServer::new(GatehouseServerConfig { bind_addr, auth }, store);

    info!(addr = %bind_addr, "Gatehouse daemon starting");

    server.run(shutdown_signal()).await?;

    info!("Gatehouse daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
