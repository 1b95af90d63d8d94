mod cli;
mod client;
mod clipboard;
mod config;
mod daemon;
mod history;
mod ipc;
mod storage;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.command.history_config();
    match cli.command {
        Command::Daemon { .. } => {
            let config = config.unwrap_or_default();
            if let Err(e) = daemon::run(config).await {
                tracing::error!(error = %e, "daemon failed");
                eprintln!("cliprecall daemon: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { action } => {
            if let Err(e) = client::run(action).await {
                tracing::debug!(error = %e, "client failed");
                eprintln!("cliprecall client: {e}");
                std::process::exit(1);
            }
        }
    }
}
