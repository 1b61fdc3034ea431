use std::path::PathBuf;

use clap::Parser;
use revp_provider::{Config, Server};
use tokio::{
    select,
    signal::unix::{signal, SignalKind},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "revp-provider", about = "Docker-fleet route discovery provider")]
struct Args {
    /// Path to the provider's YAML configuration file.
    #[arg(default_value = "config.yaml")]
    config: PathBuf,
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run() -> Result<(), String> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .map_err(|e| format!("Failed to read configuration from {}: {e}", args.config.display()))?;

    init_logging(&config.log_level, config.log_json);
    tracing::info!(config = %args.config.display(), "Starting revp-provider");

    let server = Server::new(config)
        .await
        .map_err(|e| format!("Failed to start server: {e}"))?;

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| format!("Failed to register signal handler: {e}"))?;

    select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C");
        }
    }

    server.shutdown().await;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
