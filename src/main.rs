//! blast-cmp-import: load BLAST comparison results into the aligner database.
//!
//! Reads a CSV file of `query,target,p-value` rows and stores each row in the
//! `blast_cmp` table, committing row by row.

mod app;
mod cli;
mod data;
mod import;

use anyhow::Result;
use cli::{AppConfig, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse_args();
    let config = AppConfig::from_cli(cli.db, cli.log_level);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    app::run(config, cli.command)
}
