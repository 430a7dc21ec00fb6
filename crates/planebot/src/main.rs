mod startup_dispatch;

use anyhow::Result;
use clap::Parser;
use planebot_cli::Cli;
use tracing_subscriber::EnvFilter;

use crate::startup_dispatch::run_cli;

const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// `RUST_LOG` replaces the default filter entirely.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run_cli(Cli::parse()).await
}
