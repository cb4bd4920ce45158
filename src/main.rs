//! Holograph CLI entry point

use clap::Parser;
use holograph::cli::{Cli, Commands};
use holograph::core::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("HOLOGRAPH_LOG"))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => holograph::cli::serve::run(args).await,
        Commands::Graph(args) => holograph::cli::graph::run(args).await,
    }
}
