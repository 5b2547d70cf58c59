use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};

use crate::table::{TableBackend, validate_table_name};

type Tables = BTreeMap<String, Vec<Vec<String>>>;

/// Process-local tables. Everything is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableBackend for MemoryBackend {
    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables().keys().cloned().collect())
    }

    fn create_table(&self, name: &str, _columns: usize) -> Result<()> {
        validate_table_name(name)?;
        let mut tables = self.tables();
        if tables.contains_key(name) {
            bail!("Table '{name}' already exists");
        }
        tables.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn read_rows(&self, name: &str) -> Result<Option<Vec<Vec<String>>>> {
        Ok(self.tables().get(name).cloned())
    }

    fn append_row(&self, name: &str, row: &[String]) -> Result<()> {
        let mut tables = self.tables();
        let Some(rows) = tables.get_mut(name) else {
            bail!("Table '{name}' does not exist");
        };
        rows.push(row.to_vec());
        Ok(())
    }

    fn write_row(&self, name: &str, row_number: usize, row: &[String]) -> Result<()> {
        let mut tables = self.tables();
        let Some(rows) = tables.get_mut(name) else {
            bail!("Table '{name}' does not exist");
        };
        let Some(slot) = row_number.checked_sub(1).and_then(|i| rows.get_mut(i)) else {
            bail!("Row {row_number} is out of range for table '{name}'");
        };
        *slot = row.to_vec();
        Ok(())
    }
}
