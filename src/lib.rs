pub mod bbox;
pub mod commands;
pub mod config;
pub mod errors;
pub mod llm;
pub mod pipeline;

use clap::Parser;

use crate::commands::Cli;
use crate::errors::BoxLensResult;

/// Log to stderr so stdout stays free for command output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the `boxlens` binary.
pub async fn run() -> BoxLensResult<()> {
    // Load .env file if present (ignore error if not found) before clap reads env vars.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config_or_default(cli.config.as_deref())?;
    commands::dispatch(cli.command, &cfg).await
}
