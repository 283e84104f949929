//! Command dispatch: ties the CLI to storage and the importer.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{AppConfig, Commands};
use crate::data::{normalize_p_value, Storage, StoredComparison};
use crate::import::{run_import, ImportOptions};

/// Run one subcommand against the configured database
pub fn run(config: AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            let storage = Storage::open(&config.db_path)?;
            storage.init_schema()?;
            info!(path = %config.db_path.display(), "blast_cmp table ready");
        }
        Commands::Import {
            csv,
            init,
            delimiter,
            has_headers,
            skip_invalid,
            dry_run,
        } => {
            let options = ImportOptions {
                delimiter,
                has_headers,
                skip_invalid,
            };
            import_file(&config, &csv, init, dry_run, &options)?;
        }
        Commands::List {
            limit,
            pending,
            json,
        } => {
            let storage = open_existing(&config)?;
            let rows = if pending {
                storage.pending(limit)?
            } else {
                storage.list(limit)?
            };
            print_rows(&rows, json)?;
        }
        Commands::SetPValue { id, p_value } => {
            let value = normalize_p_value(&p_value)
                .with_context(|| format!("Invalid p-value: {p_value:?}"))?;
            let storage = open_existing(&config)?;
            storage.set_p_value(id, value)?;
            info!(id, p_value = value, "p-value recorded");
        }
    }

    Ok(())
}

/// Open a database that already holds the `blast_cmp` table.
///
/// Never creates the file, so a mistyped `--db` is reported instead of
/// leaving an empty database behind.
fn open_existing(config: &AppConfig) -> Result<Storage> {
    let missing = || {
        anyhow::anyhow!(
            "Table blast_cmp does not exist in {:?}; run `init` or pass --init",
            config.db_path
        )
    };
    if !config.db_path.exists() {
        return Err(missing());
    }
    let storage = Storage::open(&config.db_path)?;
    if !storage.has_table()? {
        return Err(missing());
    }
    Ok(storage)
}

fn import_file(
    config: &AppConfig,
    csv: &Path,
    init: bool,
    dry_run: bool,
    options: &ImportOptions,
) -> Result<()> {
    let file = File::open(csv).with_context(|| format!("Failed to open CSV file: {csv:?}"))?;

    let storage = if dry_run {
        None
    } else if init {
        let storage = Storage::open(&config.db_path)?;
        storage.init_schema()?;
        Some(storage)
    } else {
        Some(open_existing(config)?)
    };

    info!(file = %csv.display(), dry_run, "importing BLAST results");
    let summary = run_import(storage.as_ref(), file, options)?;

    println!(
        "{} rows read, {} {}, {} skipped",
        summary.rows_read,
        summary.inserted,
        if dry_run { "valid" } else { "inserted" },
        summary.skipped
    );

    if let Some(storage) = &storage {
        let total = storage.count()?;
        info!(total, "blast_cmp row total");
        println!("{total} rows in blast_cmp");
    }
    Ok(())
}

fn print_rows(rows: &[StoredComparison], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    println!(
        "{:>6}  {:<24} {:<24} {:>10} {:>10}",
        "id", "query", "target", "blast_p", "p_value"
    );
    for row in rows {
        println!("{row}");
    }
    Ok(())
}
