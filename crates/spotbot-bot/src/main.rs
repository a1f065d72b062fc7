//! Spot trading bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

/// RSI/moving-average spot trading bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SPOTBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    spotbot_ws::init_crypto();

    let args = Args::parse();

    // A missing .env file is fine; the variables may come from the environment.
    let dotenv = dotenvy::dotenv();

    let config = spotbot_bot::AppConfig::load(args.config.as_deref())?;
    spotbot_telemetry::init_logging(&config.log_level)?;

    info!("Starting spotbot v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }
    info!(
        symbol = %config.symbol,
        testnet = config.testnet,
        rest_url = %config.rest_url(),
        ws_url = %config.ws_url(),
        "Configuration loaded"
    );

    let credentials = spotbot_bot::credentials_from_env()?;
    let app = spotbot_bot::Application::new(config, credentials).await?;

    let shutdown = app.shutdown_handle();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.shutdown();
    });

    app.run().await?;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    }
}
