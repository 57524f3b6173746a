//! cogd: Cloud Optimized GeoTIFF validator host.
//!
//! # Usage
//!
//! ```text
//! cogd serve --port 8080 --config cog.toml
//! cogd lambda --config cog.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cog_validator::{CogConfig, CogService};
use cogd::lambda::{self, LambdaHandler};
use cogd::trigger::{HttpTrigger, gateway_handler};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,cogd=debug,cog_gateway=debug,cog_validator=debug";

#[derive(Parser)]
#[command(name = "cogd", about = "Cloud Optimized GeoTIFF validator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve HTTP directly.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Path to a TOML settings file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run inside the serverless runtime.
    Lambda {
        /// Path to a TOML settings file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, config } => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            let config = CogConfig::load(config.as_deref())?;
            run_serve(port, config).await
        }
        Command::Lambda { config } => {
            // The runtime captures stdout; one JSON object per line.
            tracing_subscriber::fmt()
                .json()
                .with_ansi(false)
                .with_env_filter(env_filter())
                .init();
            let config = CogConfig::load(config.as_deref())?;
            run_lambda(config).await
        }
    }
}

async fn run_serve(port: u16, config: CogConfig) -> anyhow::Result<()> {
    let gateway = Arc::new(cogd::gateway_for(&config));
    let max_body = config.max_content_length;
    let service = Arc::new(CogService::from_config(config));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "COG validator starting");

    let trigger = HttpTrigger::new(addr, gateway_handler(gateway, service, max_body));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl-C handler");
                // Keep the sender alive so the server runs until killed.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    trigger.serve(shutdown_rx).await?;

    info!("COG validator stopped");
    Ok(())
}

async fn run_lambda(config: CogConfig) -> anyhow::Result<()> {
    let gateway = cogd::gateway_for(&config);
    let server_name = config.server_name.clone();
    let service = Arc::new(CogService::from_config(config));

    info!(server_name = ?server_name, "COG validator starting in serverless runtime");

    lambda::run(LambdaHandler::new(gateway, service, server_name))
        .await
        .map_err(|e| anyhow::anyhow!("serverless runtime failed: {e}"))
}
