use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use alert_relay::{config::Config, server::Server, sinks::TelegramSink};

#[derive(Parser)]
#[command(author, version, about = "Relay Grafana alert webhooks to Telegram chats", long_about = None)]
struct Cli {
    /// Address to listen on, overrides SERVER_ADDR
    #[arg(short, long)]
    addr: Option<String>,

    /// Read configuration from this dotenv file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = match &cli.env_file {
        Some(path) => Config::load_with_env_file(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }
    info!("Loaded configuration: {:?}", config);

    let sink = TelegramSink::new(&config.telegram).context("failed to build Telegram client")?;
    let server = Server::new(&config, Arc::new(sink));

    info!(
        "Relaying webhooks on {}{} to {} chat(s)",
        config.server.addr,
        config.server.path,
        config.telegram.chat_ids.len()
    );
    server
        .start(&config.server.addr)
        .await
        .context("server failed")?;

    Ok(())
}
