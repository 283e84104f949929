//! Command-line interface argument parsing for blast-cmp-import.
//!
//! Typical use:
//! - `blast-cmp-import init`
//! - `blast-cmp-import import blast_results.csv`
//! - `blast-cmp-import list --pending --json`

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Load BLAST comparison results from CSV into the aligner database.
#[derive(Parser, Debug)]
#[command(name = "blast-cmp-import")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the SQLite database file.
    /// Defaults to $BLAST_CMP_DB, then <data dir>/blast-cmp/aligner.db
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the blast_cmp table if it does not exist
    Init,

    /// Insert every row of a BLAST results CSV file
    Import {
        /// CSV file with query id, target id and p-value columns
        #[arg(default_value = "blast_results.csv")]
        csv: PathBuf,

        /// Create the table first if needed
        #[arg(long)]
        init: bool,

        /// Field delimiter (single ASCII character)
        #[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: u8,

        /// Treat the first line as a header row
        #[arg(long)]
        has_headers: bool,

        /// Log and skip invalid rows instead of aborting
        #[arg(long)]
        skip_invalid: bool,

        /// Validate the file without touching the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Show stored comparisons
    List {
        /// Maximum number of rows to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only rows still missing an alignment p-value
        #[arg(long)]
        pending: bool,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record the alignment p-value for one comparison
    SetPValue {
        /// Comparison id
        id: i64,

        /// P-value; a decimal comma is accepted
        p_value: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Parse a delimiter argument into a single byte
fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(format!("delimiter must be a single ASCII character, got {s:?}")),
    }
}

/// Configuration derived from CLI arguments and the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    /// Create AppConfig from the global CLI options
    pub fn from_cli(db: Option<String>, log_level: String) -> Self {
        let db_path = db.map(PathBuf::from).unwrap_or_else(|| {
            // Check BLAST_CMP_DB environment variable first
            if let Ok(path) = std::env::var("BLAST_CMP_DB") {
                PathBuf::from(path)
            } else {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("blast-cmp")
                    .join("aligner.db")
            }
        });

        AppConfig { db_path, log_level }
    }
}
