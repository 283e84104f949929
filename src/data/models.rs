//! Data models for BLAST comparison records.

use chrono::{DateTime, Utc};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fields every CSV row must carry
pub const FIELD_COUNT: usize = 3;

/// A row that could not be turned into a comparison record
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("line {line}: expected 3 columns, found {found}")]
    ColumnCount { line: u64, found: usize },

    #[error("line {line}: {column} is empty")]
    EmptyIdentifier { line: u64, column: &'static str },

    #[error("line {line}: invalid p-value {value:?}")]
    InvalidPValue { line: u64, value: String },
}

/// Parse a p-value written with either a decimal point or a decimal comma.
///
/// Returns `None` for anything that is not a finite, non-negative number.
pub fn normalize_p_value(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// One BLAST comparison as read from the input file
#[derive(Debug, Clone, PartialEq)]
pub struct BlastComparison {
    pub query_sequence: String,
    pub target_sequence: String,
    pub blast_p_value: f64,
}

impl BlastComparison {
    /// Build a comparison from a raw CSV record found at `line`.
    ///
    /// Identifiers are kept byte-for-byte; only the p-value is normalized.
    pub fn from_record(line: u64, record: &StringRecord) -> Result<Self, RowError> {
        if record.len() != FIELD_COUNT {
            return Err(RowError::ColumnCount {
                line,
                found: record.len(),
            });
        }

        let query_sequence = identifier(line, record, 0, "query_sequence")?;
        let target_sequence = identifier(line, record, 1, "target_sequence")?;

        let raw = &record[2];
        let blast_p_value = normalize_p_value(raw).ok_or_else(|| RowError::InvalidPValue {
            line,
            value: raw.to_string(),
        })?;

        Ok(BlastComparison {
            query_sequence,
            target_sequence,
            blast_p_value,
        })
    }
}

fn identifier(
    line: u64,
    record: &StringRecord,
    idx: usize,
    column: &'static str,
) -> Result<String, RowError> {
    let value = &record[idx];
    if value.trim().is_empty() {
        return Err(RowError::EmptyIdentifier { line, column });
    }
    Ok(value.to_string())
}

/// A comparison row as stored in the `blast_cmp` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredComparison {
    pub id: i64,
    pub query_sequence: String,
    pub target_sequence: String,
    pub blast_p_value: f64,
    /// Alignment p-value, filled in later by the aligner
    pub p_value: Option<f64>,
    pub imported_at: Option<DateTime<Utc>>,
}

/// Format a p-value the way it is shown in listings
pub fn format_p_value(v: f64) -> String {
    if v != 0.0 && (v.abs() < 0.001 || v.abs() >= 1000.0) {
        format!("{v:.2e}")
    } else {
        format!("{v:.4}")
    }
}

impl std::fmt::Display for StoredComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p_value = self
            .p_value
            .map(format_p_value)
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:>6}  {:<24} {:<24} {:>10} {:>10}",
            self.id,
            self.query_sequence,
            self.target_sequence,
            format_p_value(self.blast_p_value),
            p_value
        )
    }
}

/// Counters collected over one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub inserted: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_normalize_decimal_comma() {
        assert_eq!(normalize_p_value("0,05"), Some(0.05));
        assert_eq!(normalize_p_value(" 2,5e-10 "), Some(2.5e-10));
        assert_eq!(normalize_p_value("1e-100"), Some(1e-100));
        assert_eq!(normalize_p_value("0.0"), Some(0.0));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_p_value(""), None);
        assert_eq!(normalize_p_value("abc"), None);
        assert_eq!(normalize_p_value("1,2,3"), None);
        assert_eq!(normalize_p_value("-0.5"), None);
        assert_eq!(normalize_p_value("NaN"), None);
        assert_eq!(normalize_p_value("inf"), None);
    }

    #[test]
    fn test_from_record() {
        let cmp = BlastComparison::from_record(1, &record(&["sp|P1", " sp|P2 ", "3,2e-5"])).unwrap();
        assert_eq!(cmp.query_sequence, "sp|P1");
        assert_eq!(cmp.target_sequence, " sp|P2 ");
        assert_eq!(cmp.blast_p_value, 3.2e-5);
    }

    #[test]
    fn test_from_record_column_count() {
        let err = BlastComparison::from_record(4, &record(&["a", "b", "1", "5"])).unwrap_err();
        assert_eq!(err, RowError::ColumnCount { line: 4, found: 4 });

        let err = BlastComparison::from_record(5, &record(&["a", "b"])).unwrap_err();
        assert_eq!(err, RowError::ColumnCount { line: 5, found: 2 });
    }

    #[test]
    fn test_from_record_empty_identifier() {
        let err = BlastComparison::from_record(2, &record(&["a", "  ", "0.1"])).unwrap_err();
        assert_eq!(
            err,
            RowError::EmptyIdentifier {
                line: 2,
                column: "target_sequence"
            }
        );
    }

    #[test]
    fn test_from_record_invalid_p_value() {
        let err = BlastComparison::from_record(3, &record(&["a", "b", "x"])).unwrap_err();
        assert!(matches!(err, RowError::InvalidPValue { line: 3, .. }));
        assert_eq!(err.to_string(), "line 3: invalid p-value \"x\"");
    }

    #[test]
    fn test_format_p_value() {
        assert_eq!(format_p_value(0.05), "0.0500");
        assert_eq!(format_p_value(1e-50), "1.00e-50");
        assert_eq!(format_p_value(0.0), "0.0000");
    }
}
