//! # Sentinel Gate - sender verification for a protected mailbox
//!
//! Unknown senders get an arithmetic challenge by email. Answering it
//! through the verification link whitelists them and releases the
//! original message to the protected mailbox.
//!
//! ## Architecture
//! ```text
//! MTA --deliver--> Gate --challenge--> Sender
//!                   |                    |
//!                 Redis <---/verify------+
//!                   |
//!                   +--forward--> Protected mailbox
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod challenge;
mod config;
mod mail;
mod routes;
mod state;
mod store;
mod telemetry;

use challenge::InboundOutcome;
use config::AppConfig;
use mail::InboundMail;
use state::AppState;

/// Exit status understood by MTAs as "try again later"
const EX_TEMPFAIL: i32 = 75;

/// Sentinel Gate - challenge/response sender verification
#[derive(Parser, Debug)]
#[command(name = "sentinel-gate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/sentinel.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Address the gate sends from (overrides config)
    #[arg(long, env = "RELAY_ADDRESS")]
    relay_address: Option<String>,

    /// Protected mailbox (overrides config)
    #[arg(long, env = "TARGET_ADDRESS")]
    target_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the verification HTTP endpoint
    Serve {
        /// Listen address (overrides config)
        #[arg(short, long, env = "LISTEN_ADDR")]
        listen: Option<String>,
    },
    /// Accept one message on stdin from the MTA
    Deliver {
        /// Envelope sender
        #[arg(long)]
        sender: String,
        /// Envelope recipient
        #[arg(long)]
        recipient: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    // Load configuration
    let mut config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    match args.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            serve(config).await
        }
        Command::Deliver { sender, recipient } => deliver(config, sender, recipient).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("🛡️ Starting Sentinel Gate v{}", env!("CARGO_PKG_VERSION"));

    // Initialize application state
    let state = AppState::connect(&config).await?;
    info!("✅ Redis connected: {}", config.redis_url);

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Sentinel Gate listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("🛑 Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 Sentinel Gate shutdown complete");
    Ok(())
}

async fn deliver(config: AppConfig, sender: String, recipient: String) -> Result<()> {
    let mut raw = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut raw)
        .await
        .context("Failed to read message from stdin")?;

    let state = AppState::connect(&config).await?;
    let inbound = InboundMail::new(&sender, &recipient, raw);

    match state.gate.on_inbound(&inbound).await {
        Ok(InboundOutcome::Forwarded) => {
            info!(%sender, subject = ?inbound.subject, "Delivered message from whitelisted sender");
            Ok(())
        }
        Ok(InboundOutcome::Challenged { token }) => {
            info!(%sender, %token, subject = ?inbound.subject, "Challenged unknown sender");
            Ok(())
        }
        Ok(InboundOutcome::Skipped) => {
            info!(%recipient, subject = ?inbound.subject, "Dropped message without a return path");
            Ok(())
        }
        Err(err) if err.is_retryable() => {
            error!(%sender, error = %err, "Delivery deferred");
            std::process::exit(EX_TEMPFAIL);
        }
        Err(err) => Err(err).context("Failed to process inbound message"),
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to the MTA pipe in deliver mode
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
