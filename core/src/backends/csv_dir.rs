use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::table::{TableBackend, validate_table_name};

/// A directory of CSV files, one `<table>.csv` per table.
#[derive(Debug, Clone)]
pub struct CsvBackend {
    dir: PathBuf,
}

impl CsvBackend {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, name: &str) -> Result<PathBuf> {
        validate_table_name(name)?;
        Ok(self.dir.join(format!("{name}.csv")))
    }

    fn load(path: &Path) -> Result<Vec<Vec<String>>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut rows = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            let record = result
                .with_context(|| format!("Failed to parse {} row {}", path.display(), line_num + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }
}

impl TableBackend for CsvBackend {
    fn table_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_table(&self, name: &str, _columns: usize) -> Result<()> {
        let path = self.table_path(name)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(())
    }

    fn read_rows(&self, name: &str) -> Result<Option<Vec<Vec<String>>>> {
        let path = self.table_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    fn append_row(&self, name: &str, row: &[String]) -> Result<()> {
        let path = self.table_path(name)?;
        if !path.exists() {
            bail!("Table '{name}' does not exist");
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
        wtr.write_record(row)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        wtr.flush()?;
        Ok(())
    }

    fn write_row(&self, name: &str, row_number: usize, row: &[String]) -> Result<()> {
        let path = self.table_path(name)?;
        if !path.exists() {
            bail!("Table '{name}' does not exist");
        }
        let mut rows = Self::load(&path)?;
        let Some(slot) = row_number.checked_sub(1).and_then(|i| rows.get_mut(i)) else {
            bail!("Row {row_number} is out of range for table '{name}'");
        };
        *slot = row.to_vec();

        // Write a sibling file and rename so a crash never leaves half a table.
        let tmp = path.with_extension("csv.tmp");
        {
            let mut wtr = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&tmp)
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            for r in &rows {
                wtr.write_record(r)?;
            }
            wtr.flush()?;
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}
