//! CSV import of BLAST comparison rows.
//!
//! Rows are read one at a time and each one is inserted and committed before
//! the next is parsed, so an aborted import keeps everything written so far.

use std::io::Read;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{BlastComparison, ImportSummary, RowError, Storage};

/// Failure while reading one record of the input
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Row(#[from] RowError),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// How the input file is read and how bad rows are handled
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    /// Log and skip invalid rows instead of aborting
    pub skip_invalid: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            delimiter: b',',
            has_headers: false,
            skip_invalid: false,
        }
    }
}

/// Iterate over the comparisons in a CSV stream
pub fn read_comparisons<R: Read>(
    reader: R,
    options: &ImportOptions,
) -> impl Iterator<Item = Result<BlastComparison, ImportError>> {
    ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_headers)
        // Column count is checked per row so the error names the line
        .flexible(true)
        .from_reader(reader)
        .into_records()
        .map(|result| -> Result<BlastComparison, ImportError> {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            debug!(line, ?record, "read row");
            Ok(BlastComparison::from_record(line, &record)?)
        })
}

/// Load every row of `reader` into `storage`.
///
/// With no storage the rows are only parsed and validated (dry run).
pub fn run_import<R: Read>(
    storage: Option<&Storage>,
    reader: R,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for result in read_comparisons(reader, options) {
        summary.rows_read += 1;

        let cmp = match result {
            Ok(cmp) => cmp,
            Err(ImportError::Row(err)) if options.skip_invalid => {
                warn!(error = %err, "skipping invalid row");
                summary.skipped += 1;
                continue;
            }
            Err(err) => return Err(err).context("Import aborted"),
        };

        if let Some(storage) = storage {
            let id = storage.insert_comparison(&cmp)?;
            debug!(
                id,
                query = %cmp.query_sequence,
                target = %cmp.target_sequence,
                p_value = cmp.blast_p_value,
                "inserted comparison"
            );
        }
        summary.inserted += 1;
    }

    info!(
        rows = summary.rows_read,
        inserted = summary.inserted,
        skipped = summary.skipped,
        dry_run = storage.is_none(),
        "import finished"
    );
    Ok(summary)
}
