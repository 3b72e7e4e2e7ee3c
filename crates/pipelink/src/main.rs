//! pipelink - attach to a local named pipe and stay attached
//!
//! Prints every message the peer sends, forwards stdin lines back to it,
//! and reconnects whenever the peer goes away. Exits when the peer sends
//! the exit sentinel or on Ctrl+C / SIGTERM.

mod attach;
mod cli;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use libpipelink::{Handlers, PipeClient};
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use attach::ExitReason;
use cli::Cli;
use error::Result;
use output::Printer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for messages
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.client_config()?;
    let printer = Printer::new(cli.json);
    let exit_requested = Arc::new(Notify::new());

    let handlers = {
        let exit_requested = exit_requested.clone();
        Handlers::new()
            .on_status(move |status, count| printer.status(status, count))
            .on_message(move |text| printer.message(text))
            .on_terminate(move || {
                printer.terminate();
                exit_requested.notify_one();
            })
    };

    let client = PipeClient::new(config, handlers)?;
    info!(client_id = %client.client_id(), endpoint = %cli.endpoint, "pipelink starting");
    client.start(&cli.endpoint).await?;

    let lines = if cli.no_stdin {
        None
    } else {
        Some(attach::spawn_line_reader(std::io::BufReader::new(
            std::io::stdin(),
        ))?)
    };

    match attach::run_until_exit(&client, &exit_requested, lines, shutdown_signal()).await {
        ExitReason::PeerExit => info!("Peer requested exit"),
        ExitReason::Signal => info!("Received shutdown signal"),
    }
    client.stop().await;

    info!("pipelink stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
