// crates/worker/src/main.rs
//! `odoo-inspector` binary.
//!
//! `serve` (the default) runs the background worker. `get` and `set` talk to
//! a running worker over the protocol, the same way the popup does.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use odoo_inspector_core::ProtocolClient;
use odoo_inspector_types::{DebugMode, PageSessionId, ProtocolResponse};
use odoo_inspector_worker::{app, HttpProtocolClient, WorkerConfig, WorkerState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,odoo_inspector_worker=info,odoo_inspector_core=info";

#[derive(Debug, Parser)]
#[command(name = "odoo-inspector", version, about = "Debug-mode state worker")]
struct Cli {
    /// Config file (default: $ODOO_INSPECTOR_CONFIG, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the background worker.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a page's debug state.
    Get {
        page_session_id: u64,
        /// Worker base URL (default: the configured listen address).
        #[arg(long)]
        url: Option<String>,
    },
    /// Switch debug on (or off with --off) for a page.
    Set {
        page_session_id: u64,
        #[arg(long)]
        off: bool,
        #[arg(long, conflicts_with = "off")]
        assets: bool,
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = WorkerConfig::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    });

    match command {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Get {
            page_session_id,
            url,
        } => {
            let client = client_for(&config, url);
            let record = client.get_state(PageSessionId(page_session_id)).await?;
            println!("{}", serde_json::to_string(&ProtocolResponse::state(record))?);
            Ok(())
        }
        Command::Set {
            page_session_id,
            off,
            assets,
            url,
        } => {
            let client = client_for(&config, url);
            let mode = if assets {
                DebugMode::Assets
            } else {
                DebugMode::Normal
            };
            client
                .set_state(PageSessionId(page_session_id), !off, mode)
                .await?;
            println!("{}", serde_json::to_string(&ProtocolResponse::ack())?);
            Ok(())
        }
    }
}

fn client_for(config: &WorkerConfig, url: Option<String>) -> HttpProtocolClient {
    let base = url.unwrap_or_else(|| format!("http://{}:{}", config.server.host, config.server.port));
    HttpProtocolClient::new(&base)
}

async fn serve(mut config: WorkerConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.host_bridge.token.is_none() {
        warn!("no bridge token configured, host shim connections will be refused");
    }
    let state = WorkerState::new(&config);
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("bind {}:{}", config.server.host, config.server.port))?;
    info!(addr = %listener.local_addr()?, "odoo-inspector worker listening");

    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("worker server")?;
    info!("odoo-inspector worker stopped");
    Ok(())
}

async fn shutdown_signal(state: WorkerState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    state.shutdown().await;
}
