//! HTTP server command
//!
//! Runs the bookshelf HTTP server. Database settings come from the
//! environment (`DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`).

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use bookshelf_server::{run_server, AppConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides PORT)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Address to bind to (overrides BIND_HOST and PORT)
    #[arg(long, short = 'b', conflicts_with = "port")]
    pub bind: Option<SocketAddr>,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = AppConfig::from_env().context("Invalid configuration")?;

    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    } else if let Some(port) = args.port {
        config.server.bind_addr.set_port(port);
    }

    tracing::info!(
        environment = %config.server.environment,
        "Starting bookshelf server on {}",
        config.server.bind_addr
    );

    // Run server (blocks until shutdown)
    run_server(config).await.context("Server error")?;

    Ok(())
}
