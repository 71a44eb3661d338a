//! bookshelf CLI - run the catalogue server or probe a running one
//!
//! - `serve`: HTTP server for books and authors with health probes
//! - `healthcheck`: probe `/ready`, `/health` and `/health/db`, exit 0/1

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use commands::healthcheck::HealthcheckArgs;
use commands::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(
    name = "bookshelf",
    author,
    version,
    about = "Book and author catalogue server with database health probes"
)]
struct Cli {
    /// Enable debug logging (unless RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Probe a running server's health endpoints
    Healthcheck(HealthcheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();

    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await,
        Commands::Healthcheck(args) => {
            let code = commands::run_healthcheck(args).await;
            tracing_setup::shutdown();
            std::process::exit(code.unwrap_or_else(|e| {
                eprintln!("Health check runner error: {:#}", e);
                1
            }));
        }
    };

    tracing_setup::shutdown();
    result
}
