use anyhow::{Context, Result, bail};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use trimline_core::table::{TableBackend, validate_table_name};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Google Sheets v4 over blocking HTTP. Each table is one worksheet.
///
/// The bearer token is supplied by the caller and never refreshed here.
pub struct SheetsBackend {
    client: Client,
    spreadsheet_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    // Absent when the range holds no data.
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl SheetsBackend {
    pub fn new(spreadsheet_id: &str, token: &str) -> Result<Self> {
        if spreadsheet_id.trim().is_empty() {
            bail!("Spreadsheet id must not be empty");
        }
        let client = Client::builder()
            .user_agent(format!(
                "trimline/{} (weight tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            token: token.trim().to_string(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{API_BASE}/{}{suffix}", self.spreadsheet_id)
    }

    fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        bail!("Spreadsheet API returned {status}: {}", api_error_message(&body));
    }
}

impl TableBackend for SheetsBackend {
    fn table_names(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(self.url(""))
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(&self.token)
            .send()
            .context("Failed to reach spreadsheet API")?;
        let data: SpreadsheetResponse = Self::check(resp)?
            .json()
            .context("Failed to parse spreadsheet metadata")?;
        Ok(data.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    fn create_table(&self, name: &str, columns: usize) -> Result<()> {
        validate_table_name(name)?;
        debug!(sheet = name, "adding worksheet");
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": name,
                        "gridProperties": { "rowCount": 1000, "columnCount": columns.max(1) }
                    }
                }
            }]
        });
        let resp = self
            .client
            .post(self.url(":batchUpdate"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .context("Failed to reach spreadsheet API")?;
        Self::check(resp).with_context(|| format!("Failed to create worksheet '{name}'"))?;
        Ok(())
    }

    fn read_rows(&self, name: &str) -> Result<Option<Vec<Vec<String>>>> {
        validate_table_name(name)?;
        if !self.table_names()?.iter().any(|t| t == name) {
            return Ok(None);
        }
        let resp = self
            .client
            .get(self.url(&format!("/values/{name}")))
            .bearer_auth(&self.token)
            .send()
            .context("Failed to reach spreadsheet API")?;
        let range: ValueRange = Self::check(resp)?
            .json()
            .with_context(|| format!("Failed to parse rows of '{name}'"))?;
        Ok(Some(normalize_rows(range.values)))
    }

    fn append_row(&self, name: &str, row: &[String]) -> Result<()> {
        validate_table_name(name)?;
        let resp = self
            .client
            .post(self.url(&format!("/values/{name}!A1:append")))
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(&self.token)
            .json(&json!({ "values": [row] }))
            .send()
            .context("Failed to reach spreadsheet API")?;
        Self::check(resp).with_context(|| format!("Failed to append to '{name}'"))?;
        Ok(())
    }

    fn write_row(&self, name: &str, row_number: usize, row: &[String]) -> Result<()> {
        validate_table_name(name)?;
        if row_number == 0 {
            bail!("Row numbers start at 1");
        }
        let range = row_range(name, row_number, row.len());
        let resp = self
            .client
            .put(self.url(&format!("/values/{range}")))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.token)
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": [row] }))
            .send()
            .context("Failed to reach spreadsheet API")?;
        Self::check(resp).with_context(|| format!("Failed to update row {row_number} of '{name}'"))?;
        Ok(())
    }
}

/// A1 column name for a 1-based column index: 1 -> A, 27 -> AA.
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn row_range(name: &str, row_number: usize, columns: usize) -> String {
    let last = column_letter(columns.max(1));
    format!("{name}!A{row_number}:{last}{row_number}")
}

/// Stringify cells and pad rows the API trimmed back to the header width.
fn normalize_rows(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    let width = values.first().map_or(0, Vec::len);
    values
        .into_iter()
        .map(|row| {
            let mut cells: Vec<String> = row.into_iter().map(cell_to_string).collect();
            if cells.len() < width {
                cells.resize(width, String::new());
            }
            cells
        })
        .collect()
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |parsed| parsed.error.message,
    )
}
