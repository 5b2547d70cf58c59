use std::collections::BTreeMap;
use std::fmt::Display;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{DailyLog, Settings, TrendRow, validate_daily_log};
use crate::table::{
    ALL_TABLES, DAILY_LOGS, SETTINGS, TRENDS, TableBackend, UpsertOutcome, data_rows,
    ensure_table, upsert_row_by_key, upsert_rows_by_key,
};

/// The `daily_logs`, `settings` and `trends` tables over any backend.
pub struct RecordStore {
    backend: Box<dyn TableBackend>,
}

impl RecordStore {
    /// Wrap `backend` and make sure every table exists with its header.
    pub fn open(backend: Box<dyn TableBackend>) -> Result<Self> {
        for schema in ALL_TABLES {
            ensure_table(backend.as_ref(), schema)?;
        }
        Ok(Self { backend })
    }

    // --- Daily logs ---

    pub fn upsert_log(&self, log: &DailyLog) -> Result<UpsertOutcome> {
        validate_daily_log(log)?;
        upsert_row_by_key(self.backend.as_ref(), &DAILY_LOGS, &log.to_row())
    }

    /// Every parseable log, in store order. Rows that do not parse are
    /// skipped.
    pub fn read_all_logs(&self) -> Result<Vec<DailyLog>> {
        let rows = data_rows(self.backend.as_ref(), &DAILY_LOGS)?;
        let mut logs = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if row.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            match DailyLog::from_row(row) {
                Ok(log) => logs.push(log),
                // +2: 1-based, plus the header row
                Err(e) => warn!(row_number = idx + 2, "skipping malformed log row: {e:#}"),
            }
        }
        Ok(logs)
    }

    pub fn find_log(&self, date: NaiveDate) -> Result<Option<DailyLog>> {
        Ok(self
            .read_all_logs()?
            .into_iter()
            .rev()
            .find(|l| l.date == date))
    }

    // --- Settings ---

    /// Raw `Setting -> Value` pairs. If a key appears more than once the
    /// row read last wins.
    pub fn read_settings(&self) -> Result<BTreeMap<String, String>> {
        let rows = data_rows(self.backend.as_ref(), &SETTINGS)?;
        let mut settings = BTreeMap::new();
        for row in rows {
            let Some(key) = row.first().map(|k| k.trim()).filter(|k| !k.is_empty()) else {
                continue;
            };
            // Trailing empty cells may be trimmed by the backend.
            let value = row.get(1).map(|v| v.trim().to_string()).unwrap_or_default();
            if let Some(previous) = settings.insert(key.to_string(), value) {
                debug!(key, %previous, "duplicate setting key, keeping the later row");
            }
        }
        Ok(settings)
    }

    pub fn update_setting(&self, key: &str, value: impl Display) -> Result<UpsertOutcome> {
        let row = vec![key.to_string(), value.to_string()];
        upsert_row_by_key(self.backend.as_ref(), &SETTINGS, &row)
    }

    /// Typed settings. On first use, when the table holds nothing
    /// recognisable, the defaults are written back so they persist.
    pub fn load_settings(&self, today: NaiveDate) -> Result<Settings> {
        let raw = self.read_settings()?;
        if !Settings::has_known_keys(&raw) {
            let defaults = Settings::defaults(today);
            debug!("settings table empty, storing defaults");
            self.save_settings(&defaults)?;
            return Ok(defaults);
        }
        Ok(Settings::from_map(&raw, today))
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let rows: Vec<Vec<String>> = settings
            .to_entries()
            .into_iter()
            .map(|(key, value)| vec![key.to_string(), value])
            .collect();
        upsert_rows_by_key(self.backend.as_ref(), &SETTINGS, &rows)?;
        Ok(())
    }

    // --- Trends ---

    /// Upsert each row by date into the `trends` table. Rows for dates not
    /// in `rows` are left alone. One table read, then one write per row.
    pub fn write_trends(&self, rows: &[TrendRow]) -> Result<usize> {
        let cells: Vec<Vec<String>> = rows.iter().map(TrendRow::to_row).collect();
        upsert_rows_by_key(self.backend.as_ref(), &TRENDS, &cells)?;
        Ok(rows.len())
    }
}
