mod cli;
mod config;
mod feed;
mod logging;
mod poller;
mod processor;
mod store;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::feed::telegram::TelegramFeed;
use crate::poller::PollingLoop;
use crate::processor::UpdateProcessor;
use crate::store::SqliteStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Critical error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    }
    .with_offset(cli.offset)
    .context("Invalid --offset")?;

    info!("Opening database…");
    let store = Arc::new(SqliteStore::open(&cli.database)?);
    info!("  Stored messages: {}", store.count().await?);

    let feed = Arc::new(TelegramFeed::new(&cli.token, config.polling.timeout())?);
    let processor = UpdateProcessor::new(store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    info!("Running…");
    let mut poller = PollingLoop::new(feed, processor, &config.polling, shutdown_rx);
    poller.run().await;

    info!("Stopped; next offset would be {}", poller.cursor());
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
