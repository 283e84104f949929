//! SQLite storage layer for BLAST comparison results.
//!
//! Database schema:
//! - `blast_cmp` table: id, query_sequence, target_sequence, blast_p_value,
//!   p_value (nullable, filled by the aligner), imported_at
//!
//! Every statement takes its values as bound parameters.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::models::{BlastComparison, StoredComparison};

const CREATE_BLAST_CMP: &str = "
CREATE TABLE IF NOT EXISTS blast_cmp (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_sequence TEXT NOT NULL,
    target_sequence TEXT NOT NULL,
    blast_p_value REAL NOT NULL,
    p_value REAL,
    imported_at TEXT
)";

const INSERT_BLAST_CMP: &str = "
INSERT INTO blast_cmp (query_sequence, target_sequence, blast_p_value, imported_at)
VALUES (?1, ?2, ?3, ?4)";

const SELECT_COLUMNS: &str =
    "SELECT id, query_sequence, target_sequence, blast_p_value, p_value, imported_at FROM blast_cmp";

/// Parse a timestamp string into a DateTime<Utc>
fn parse_timestamp(timestamp: Option<String>) -> Option<DateTime<Utc>> {
    timestamp.and_then(|t| {
        DateTime::parse_from_rfc3339(&t)
            .or_else(|_| DateTime::parse_from_str(&t, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// SQLite's LIMIT treats a negative value as "no limit"
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

fn stored_from_row(row: &Row) -> rusqlite::Result<StoredComparison> {
    let imported_at: Option<String> = row.get(5)?;
    Ok(StoredComparison {
        id: row.get(0)?,
        query_sequence: row.get(1)?,
        target_sequence: row.get(2)?,
        blast_p_value: row.get(3)?,
        p_value: row.get(4)?,
        imported_at: parse_timestamp(imported_at),
    })
}

/// Storage interface for the aligner's comparison database
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {parent:?}"))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {path:?}"))?;
        debug!(path = %path.display(), "opened database");
        Ok(Storage { conn })
    }

    /// Open a throwaway in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Storage { conn })
    }

    /// Create the `blast_cmp` table if it does not exist yet
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_BLAST_CMP)
            .context("Failed to create blast_cmp table")
    }

    /// Whether the `blast_cmp` table exists
    pub fn has_table(&self) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'blast_cmp'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert one comparison and commit it. Returns the new row id.
    pub fn insert_comparison(&self, cmp: &BlastComparison) -> Result<i64> {
        let imported_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut stmt = self.conn.prepare_cached(INSERT_BLAST_CMP)?;
        stmt.execute(params![
            cmp.query_sequence,
            cmp.target_sequence,
            cmp.blast_p_value,
            imported_at
        ])
        .with_context(|| {
            format!(
                "Failed to insert comparison {} / {}",
                cmp.query_sequence, cmp.target_sequence
            )
        })?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Number of stored comparisons
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blast_cmp", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// List stored comparisons in insertion order
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<StoredComparison>> {
        self.select(&format!("{SELECT_COLUMNS} ORDER BY id LIMIT ?1"), limit)
    }

    /// List comparisons whose alignment p-value has not been computed yet
    pub fn pending(&self, limit: Option<usize>) -> Result<Vec<StoredComparison>> {
        self.select(
            &format!("{SELECT_COLUMNS} WHERE p_value IS NULL ORDER BY id LIMIT ?1"),
            limit,
        )
    }

    fn select(&self, sql: &str, limit: Option<usize>) -> Result<Vec<StoredComparison>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([sql_limit(limit)], stored_from_row)?;

        let mut comparisons = Vec::new();
        for row in rows {
            comparisons.push(row?);
        }
        Ok(comparisons)
    }

    /// Record the alignment p-value for the comparison with `id`
    pub fn set_p_value(&self, id: i64, p_value: f64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE blast_cmp SET p_value = ?1 WHERE id = ?2",
            params![p_value, id],
        )?;
        if updated == 0 {
            anyhow::bail!("No comparison with id {id}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(query: &str, target: &str, p: f64) -> BlastComparison {
        BlastComparison {
            query_sequence: query.to_string(),
            target_sequence: target.to_string(),
            blast_p_value: p,
        }
    }

    fn storage() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        storage.init_schema().unwrap();
        storage
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(!storage.has_table().unwrap());
        storage.init_schema().unwrap();
        storage.init_schema().unwrap();
        assert!(storage.has_table().unwrap());
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_list() {
        let storage = storage();
        let first = storage.insert_comparison(&comparison("q1", "t1", 1e-30)).unwrap();
        let second = storage.insert_comparison(&comparison("q2", "t2", 0.5)).unwrap();
        assert!(second > first);

        let rows = storage.list(None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first);
        assert_eq!(rows[0].query_sequence, "q1");
        assert_eq!(rows[0].target_sequence, "t1");
        assert_eq!(rows[0].blast_p_value, 1e-30);
        assert!(rows[0].p_value.is_none());
        assert!(rows[0].imported_at.is_some());

        assert_eq!(storage.list(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_values_are_bound_not_interpolated() {
        let storage = storage();
        let hostile = "x'); DROP TABLE blast_cmp; --";
        storage.insert_comparison(&comparison(hostile, "t", 0.1)).unwrap();

        assert!(storage.has_table().unwrap());
        assert_eq!(storage.list(None).unwrap()[0].query_sequence, hostile);
    }

    #[test]
    fn test_insert_without_table_fails() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.insert_comparison(&comparison("q", "t", 0.1)).is_err());
    }

    #[test]
    fn test_pending_and_set_p_value() {
        let storage = storage();
        let a = storage.insert_comparison(&comparison("a", "b", 0.1)).unwrap();
        let c = storage.insert_comparison(&comparison("c", "d", 0.2)).unwrap();

        storage.set_p_value(a, 0.003).unwrap();

        let pending = storage.pending(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, c);

        let all = storage.list(None).unwrap();
        assert_eq!(all[0].p_value, Some(0.003));
    }

    #[test]
    fn test_set_p_value_unknown_id() {
        let storage = storage();
        assert!(storage.set_p_value(42, 0.1).is_err());
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("aligner.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.init_schema().unwrap();
            storage.insert_comparison(&comparison("q", "t", 0.1)).unwrap();
        }
        assert!(path.exists());

        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp(Some("2025-01-01T12:00:00Z".to_string())).is_some());
        assert!(parse_timestamp(Some("not a date".to_string())).is_none());
        assert!(parse_timestamp(None).is_none());
    }
}
