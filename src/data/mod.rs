//! Data layer for the `blast_cmp` table.
//!
//! Handles parsing comparison rows and reading/writing them in the SQLite database.

mod models;
mod storage;

pub use models::{normalize_p_value, BlastComparison, ImportSummary, RowError, StoredComparison};
pub use storage::Storage;
