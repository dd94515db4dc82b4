//! Service entrypoint: parse flags, load configuration, start the gateway.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use userhub::config::Config;
use userhub::gateway;

#[derive(Parser, Debug)]
#[command(name = "userhub", version, about = "User account and device registry gateway")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "userhub.toml")]
    config: PathBuf,

    /// Listen host, overriding the configuration file.
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overriding the configuration file.
    #[arg(long)]
    port: Option<u16>,
}

/// Set up logging with an environment-based filter.
/// Use the RUST_LOG env var to control the level (e.g. RUST_LOG=debug).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    gateway::serve(config).await
}
