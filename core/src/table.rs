//! Spreadsheet-style tables: a header row followed by data rows, all cells
//! strings. Backends only move rows around; key lookup and header
//! bookkeeping live here so every backend gets the same upsert behaviour.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::models::DATE_FORMAT;

/// Raw row storage behind the record store.
///
/// Row numbers are 1-based and count the header, matching spreadsheet
/// addressing. Called synchronously; network-backed implementations block.
pub trait TableBackend: Send + Sync {
    fn table_names(&self) -> Result<Vec<String>>;
    fn create_table(&self, name: &str, columns: usize) -> Result<()>;
    /// All rows including the header, or `None` if the table does not exist.
    fn read_rows(&self, name: &str) -> Result<Option<Vec<Vec<String>>>>;
    fn append_row(&self, name: &str, row: &[String]) -> Result<()>;
    fn write_row(&self, name: &str, row_number: usize, row: &[String]) -> Result<()>;
}

/// Lets one backend sit behind a store while the caller keeps a handle.
impl<T: TableBackend + ?Sized> TableBackend for Arc<T> {
    fn table_names(&self) -> Result<Vec<String>> {
        (**self).table_names()
    }

    fn create_table(&self, name: &str, columns: usize) -> Result<()> {
        (**self).create_table(name, columns)
    }

    fn read_rows(&self, name: &str) -> Result<Option<Vec<Vec<String>>>> {
        (**self).read_rows(name)
    }

    fn append_row(&self, name: &str, row: &[String]) -> Result<()> {
        (**self).append_row(name, row)
    }

    fn write_row(&self, name: &str, row_number: usize, row: &[String]) -> Result<()> {
        (**self).write_row(name, row_number, row)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub key_column: usize,
    /// Canonical form of a key cell. Two cells match when their canonical
    /// forms are equal; an empty form never matches.
    pub normalize_key: fn(&str) -> String,
}

pub const DAILY_LOGS: TableSchema = TableSchema {
    name: "daily_logs",
    headers: &["Date", "Calories", "Steps", "Weight", "Notes"],
    key_column: 0,
    normalize_key: date_key,
};

pub const SETTINGS: TableSchema = TableSchema {
    name: "settings",
    headers: &["Setting", "Value"],
    key_column: 0,
    normalize_key: trimmed_key,
};

/// Written for external charting; never read back.
pub const TRENDS: TableSchema = TableSchema {
    name: "trends",
    headers: &["Date", "Net Calories", "Weight", "Steps"],
    key_column: 0,
    normalize_key: date_key,
};

pub const ALL_TABLES: &[TableSchema] = &[DAILY_LOGS, SETTINGS, TRENDS];

impl TableSchema {
    #[must_use]
    pub fn header_row(&self) -> Vec<String> {
        self.headers.iter().map(|h| (*h).to_string()).collect()
    }

    fn key_of(&self, row: &[String]) -> Option<String> {
        row.get(self.key_column)
            .map(|cell| (self.normalize_key)(cell))
            .filter(|key| !key.is_empty())
    }
}

fn trimmed_key(cell: &str) -> String {
    cell.trim().to_string()
}

/// Dates compare by value, so a hand-typed `2025-1-5` matches `2025-01-05`.
/// Anything that is not a date falls back to the trimmed text.
fn date_key(cell: &str) -> String {
    let cell = cell.trim();
    NaiveDate::parse_from_str(cell, DATE_FORMAT)
        .map_or_else(|_| cell.to_string(), |d| d.format(DATE_FORMAT).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated { row_number: usize },
}

/// Table names end up in file names and API ranges.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("Invalid table name '{name}'. Use letters, digits and underscores");
    }
    Ok(())
}

/// Make sure `schema`'s table exists and starts with its header row.
/// Safe to call repeatedly.
pub fn ensure_table(backend: &dyn TableBackend, schema: &TableSchema) -> Result<()> {
    let exists = backend
        .table_names()?
        .iter()
        .any(|name| name == schema.name);

    if !exists {
        debug!(table = schema.name, "creating table");
        backend
            .create_table(schema.name, schema.headers.len())
            .with_context(|| format!("Failed to create table '{}'", schema.name))?;
        backend.append_row(schema.name, &schema.header_row())?;
        return Ok(());
    }

    let empty = backend
        .read_rows(schema.name)?
        .is_none_or(|rows| rows.is_empty());
    if empty {
        debug!(table = schema.name, "writing missing header row");
        backend.append_row(schema.name, &schema.header_row())?;
    }
    Ok(())
}

/// Data rows (everything after the header). A missing table reads as empty.
pub fn data_rows(backend: &dyn TableBackend, schema: &TableSchema) -> Result<Vec<Vec<String>>> {
    let rows = backend.read_rows(schema.name)?.unwrap_or_default();
    Ok(rows.into_iter().skip(1).collect())
}

/// Overwrite the first data row whose key matches `row`'s key, or append
/// `row` when there is none.
///
/// The table is re-read on every call so edits made elsewhere since the
/// last read are seen. There is no locking: two writers racing on the same
/// key both succeed and the later write wins.
pub fn upsert_row_by_key(
    backend: &dyn TableBackend,
    schema: &TableSchema,
    row: &[String],
) -> Result<UpsertOutcome> {
    let outcomes = upsert_rows_by_key(backend, schema, &[row])?;
    Ok(outcomes[0])
}

/// [`upsert_row_by_key`] for many rows against a single read of the table.
/// Each row still costs one backend write. A key repeated within `rows`
/// updates the row its first occurrence landed on.
pub fn upsert_rows_by_key<R: AsRef<[String]>>(
    backend: &dyn TableBackend,
    schema: &TableSchema,
    rows: &[R],
) -> Result<Vec<UpsertOutcome>> {
    let keys = rows
        .iter()
        .map(|row| {
            schema.key_of(row.as_ref()).with_context(|| {
                format!("Row for '{}' is missing its key", schema.name)
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let existing = backend.read_rows(schema.name)?.unwrap_or_default();
    if existing.is_empty() {
        ensure_table(backend, schema)?;
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    for (idx, r) in existing.iter().enumerate().skip(1) {
        if let Some(key) = schema.key_of(r) {
            positions.entry(key).or_insert(idx + 1);
        }
    }
    // The header occupies row 1 even when it was only just written.
    let mut next_row = existing.len().max(1) + 1;

    let mut outcomes = Vec::with_capacity(rows.len());
    for (row, key) in rows.iter().zip(keys) {
        if let Some(&row_number) = positions.get(&key) {
            debug!(table = schema.name, %key, row_number, "updating row");
            backend.write_row(schema.name, row_number, row.as_ref())?;
            outcomes.push(UpsertOutcome::Updated { row_number });
        } else {
            debug!(table = schema.name, %key, "appending row");
            backend.append_row(schema.name, row.as_ref())?;
            positions.insert(key, next_row);
            next_row += 1;
            outcomes.push(UpsertOutcome::Inserted);
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn test_ensure_table_creates_with_header() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &DAILY_LOGS).unwrap();

        let rows = backend.read_rows("daily_logs").unwrap().unwrap();
        assert_eq!(rows, vec![DAILY_LOGS.header_row()]);
    }

    #[test]
    fn test_ensure_table_is_idempotent() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &SETTINGS).unwrap();
        ensure_table(&backend, &SETTINGS).unwrap();
        ensure_table(&backend, &SETTINGS).unwrap();

        let rows = backend.read_rows("settings").unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(backend.table_names().unwrap(), vec!["settings".to_string()]);
    }

    #[test]
    fn test_ensure_table_adds_header_to_empty_table() {
        let backend = MemoryBackend::new();
        backend.create_table("trends", 4).unwrap();
        ensure_table(&backend, &TRENDS).unwrap();

        let rows = backend.read_rows("trends").unwrap().unwrap();
        assert_eq!(rows, vec![TRENDS.header_row()]);
    }

    #[test]
    fn test_ensure_table_leaves_existing_data_alone() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &SETTINGS).unwrap();
        backend.append_row("settings", &row(&["Height", "180"])).unwrap();
        ensure_table(&backend, &SETTINGS).unwrap();

        assert_eq!(backend.read_rows("settings").unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_upsert_inserts_then_updates_in_place() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &SETTINGS).unwrap();

        let first = upsert_row_by_key(&backend, &SETTINGS, &row(&["Height", "170"])).unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);
        upsert_row_by_key(&backend, &SETTINGS, &row(&["Weight", "80"])).unwrap();

        let second = upsert_row_by_key(&backend, &SETTINGS, &row(&["Height", "180"])).unwrap();
        assert_eq!(second, UpsertOutcome::Updated { row_number: 2 });

        let rows = data_rows(&backend, &SETTINGS).unwrap();
        assert_eq!(rows, vec![row(&["Height", "180"]), row(&["Weight", "80"])]);
    }

    #[test]
    fn test_upsert_row_count_changes_only_on_insert() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &DAILY_LOGS).unwrap();

        let a = row(&["2025-01-01", "2000", "5000", "80", ""]);
        let b = row(&["2025-01-02", "1800", "6000", "79.8", ""]);
        upsert_row_by_key(&backend, &DAILY_LOGS, &a).unwrap();
        upsert_row_by_key(&backend, &DAILY_LOGS, &b).unwrap();
        assert_eq!(data_rows(&backend, &DAILY_LOGS).unwrap().len(), 2);

        let a2 = row(&["2025-01-01", "2200", "7000", "80.1", "cheat day"]);
        upsert_row_by_key(&backend, &DAILY_LOGS, &a2).unwrap();
        let rows = data_rows(&backend, &DAILY_LOGS).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], a2);
        assert_eq!(rows[1], b);
    }

    #[test]
    fn test_upsert_matches_key_ignoring_whitespace() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &SETTINGS).unwrap();
        backend.append_row("settings", &row(&[" Height ", "170"])).unwrap();

        let outcome = upsert_row_by_key(&backend, &SETTINGS, &row(&["Height", "175"])).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { row_number: 2 });
    }

    #[test]
    fn test_upsert_never_matches_header_row() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &SETTINGS).unwrap();

        let outcome = upsert_row_by_key(&backend, &SETTINGS, &row(&["Setting", "x"])).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(backend.read_rows("settings").unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_upsert_creates_missing_table() {
        let backend = MemoryBackend::new();
        let outcome =
            upsert_row_by_key(&backend, &TRENDS, &row(&["2025-01-01", "-200", "80", "5000"]))
                .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let rows = backend.read_rows("trends").unwrap().unwrap();
        assert_eq!(rows[0], TRENDS.header_row());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_upsert_rejects_empty_key() {
        let backend = MemoryBackend::new();
        assert!(upsert_row_by_key(&backend, &SETTINGS, &row(&["  ", "1"])).is_err());
        assert!(upsert_row_by_key(&backend, &SETTINGS, &[]).is_err());
    }

    #[test]
    fn test_date_key_matches_unpadded_date() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &DAILY_LOGS).unwrap();
        backend
            .append_row("daily_logs", &row(&[" 2025-1-5 ", "1500", "100", "80", ""]))
            .unwrap();

        let canonical = row(&["2025-01-05", "1700", "4000", "79.5", ""]);
        let outcome = upsert_row_by_key(&backend, &DAILY_LOGS, &canonical).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { row_number: 2 });
        assert_eq!(data_rows(&backend, &DAILY_LOGS).unwrap(), vec![canonical]);
    }

    #[test]
    fn test_date_key_falls_back_to_text() {
        assert_eq!(date_key(" 2025-3-9"), "2025-03-09");
        assert_eq!(date_key(" someday "), "someday");
        assert_eq!(trimmed_key(" 2025-3-9 "), "2025-3-9");
    }

    #[derive(Default)]
    struct CountingBackend {
        inner: MemoryBackend,
        reads: AtomicUsize,
    }

    impl TableBackend for CountingBackend {
        fn table_names(&self) -> Result<Vec<String>> {
            self.inner.table_names()
        }

        fn create_table(&self, name: &str, columns: usize) -> Result<()> {
            self.inner.create_table(name, columns)
        }

        fn read_rows(&self, name: &str) -> Result<Option<Vec<Vec<String>>>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_rows(name)
        }

        fn append_row(&self, name: &str, row: &[String]) -> Result<()> {
            self.inner.append_row(name, row)
        }

        fn write_row(&self, name: &str, row_number: usize, row: &[String]) -> Result<()> {
            self.inner.write_row(name, row_number, row)
        }
    }

    #[test]
    fn test_upsert_rows_reads_table_once() {
        let backend = CountingBackend::default();
        ensure_table(&backend, &TRENDS).unwrap();
        upsert_row_by_key(&backend, &TRENDS, &row(&["2025-01-02", "0", "80", "1"])).unwrap();
        let before = backend.reads.load(Ordering::SeqCst);

        let rows: Vec<Vec<String>> = (1..=5)
            .map(|d| row(&[format!("2025-01-0{d}").as_str(), "-100", "80", "5000"]))
            .collect();
        let outcomes = upsert_rows_by_key(&backend, &TRENDS, &rows).unwrap();

        assert_eq!(backend.reads.load(Ordering::SeqCst) - before, 1);
        assert_eq!(outcomes[0], UpsertOutcome::Inserted);
        assert_eq!(outcomes[1], UpsertOutcome::Updated { row_number: 2 });
        assert_eq!(data_rows(&backend.inner, &TRENDS).unwrap().len(), 5);
    }

    #[test]
    fn test_upsert_rows_repeated_key_updates_appended_row() {
        let backend = MemoryBackend::new();
        let rows = vec![
            row(&["Height", "170"]),
            row(&["Weight", "80"]),
            row(&["Height", "175"]),
        ];
        let outcomes = upsert_rows_by_key(&backend, &SETTINGS, &rows).unwrap();

        assert_eq!(outcomes[2], UpsertOutcome::Updated { row_number: 2 });
        assert_eq!(
            data_rows(&backend, &SETTINGS).unwrap(),
            vec![row(&["Height", "175"]), row(&["Weight", "80"])]
        );
    }

    #[test]
    fn test_upsert_rows_rejects_batch_with_missing_key() {
        let backend = MemoryBackend::new();
        ensure_table(&backend, &SETTINGS).unwrap();
        let rows = vec![row(&["Height", "170"]), row(&["", "1"])];

        assert!(upsert_rows_by_key(&backend, &SETTINGS, &rows).is_err());
        assert!(data_rows(&backend, &SETTINGS).unwrap().is_empty());
    }

    #[test]
    fn test_data_rows_missing_table_is_empty() {
        let backend = MemoryBackend::new();
        assert!(data_rows(&backend, &DAILY_LOGS).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_outcome_json_shape() {
        let inserted = serde_json::to_value(UpsertOutcome::Inserted).unwrap();
        assert_eq!(inserted, serde_json::json!({ "outcome": "inserted" }));
        let updated = serde_json::to_value(UpsertOutcome::Updated { row_number: 4 }).unwrap();
        assert_eq!(
            updated,
            serde_json::json!({ "outcome": "updated", "row_number": 4 })
        );
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("daily_logs").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("../etc").is_err());
        assert!(validate_table_name("two words").is_err());
    }
}
