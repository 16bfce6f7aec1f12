//! # sheetsync: Database to Google Sheets Export
//!
//! This is the main entry point for the `sheetsync` command-line interface.
//! The binary is a thin entrypoint; all logic lives in the `sheetsync_cli`
//! library crate.

use anyhow::Result;
use clap::Parser;
use sheetsync_cli::{run, Cli};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 1. Setup logging
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sheetsync=info".parse()?))
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Run and report fatal errors
    if let Err(e) = run(cli).await {
        eprintln!("[sheetsync error] {e:?}");
        std::process::exit(1);
    }

    Ok(())
}
