use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// --- Daily logs ---

/// One row of the `daily_logs` table. `date` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub calories: u32,
    pub steps: u32,
    pub weight_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

impl DailyLog {
    /// Column order: Date, Calories, Steps, Weight, Notes.
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.format(DATE_FORMAT).to_string(),
            self.calories.to_string(),
            self.steps.to_string(),
            self.weight_kg.to_string(),
            self.notes.clone().unwrap_or_default(),
        ]
    }

    /// Parse a stored row. Spreadsheet APIs drop trailing empty cells, so a
    /// row without the Notes column is accepted.
    pub fn from_row(row: &[String]) -> Result<Self> {
        let row = trim_trailing_blanks(row);
        if !(4..=5).contains(&row.len()) {
            bail!("Expected 4 or 5 columns, got {}", row.len());
        }

        let date_str = row[0].trim();
        let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT)
            .with_context(|| format!("Invalid date '{date_str}'"))?;
        let calories = parse_count(&row[1]).context("Invalid calories")?;
        let steps = parse_count(&row[2]).context("Invalid steps")?;
        let weight_str = row[3].trim();
        let weight_kg: f64 = weight_str
            .parse()
            .with_context(|| format!("Invalid weight '{weight_str}'"))?;
        let notes = row
            .get(4)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Self {
            date,
            calories,
            steps,
            weight_kg,
            notes,
        })
    }
}

pub fn validate_daily_log(log: &DailyLog) -> Result<()> {
    if !log.weight_kg.is_finite() || log.weight_kg < 0.0 {
        bail!("Weight must be a non-negative number");
    }
    Ok(())
}

fn trim_trailing_blanks(row: &[String]) -> &[String] {
    let len = row
        .iter()
        .rposition(|c| !c.trim().is_empty())
        .map_or(0, |i| i + 1);
    &row[..len]
}

/// Parse a non-negative whole number. Spreadsheets sometimes hand back
/// integral values as "2000.0".
#[allow(clippy::cast_sign_loss)]
fn parse_count(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }
    let value: f64 = s.parse().with_context(|| format!("'{s}' is not a number"))?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        bail!("'{s}' is not a non-negative whole number");
    }
    Ok(value as u32)
}

// --- Settings ---

pub const SETTING_HEIGHT: &str = "Height";
pub const SETTING_WEIGHT: &str = "Weight";
pub const SETTING_TARGET_WEIGHT: &str = "Target Weight";
pub const SETTING_TARGET_DATE: &str = "Target Date";

// Canonical key first, then the aliases older entry points wrote.
const HEIGHT_KEYS: &[&str] = &[SETTING_HEIGHT, "height"];
const WEIGHT_KEYS: &[&str] = &[SETTING_WEIGHT, "weight"];
const TARGET_WEIGHT_KEYS: &[&str] = &[SETTING_TARGET_WEIGHT, "target_weight"];
const TARGET_DATE_KEYS: &[&str] = &[SETTING_TARGET_DATE, "target_date"];

const DEFAULT_HEIGHT_CM: f64 = 170.0;
const DEFAULT_WEIGHT_KG: f64 = 70.0;
const DEFAULT_TARGET_WEIGHT_KG: f64 = 65.0;
const DEFAULT_TARGET_DAYS: i64 = 30;

/// Profile and goal. Stored remotely as `Setting -> Value` string pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub height_cm: f64,
    pub weight_kg: f64,
    pub target_weight_kg: f64,
    pub target_date: NaiveDate,
}

impl Settings {
    #[must_use]
    pub fn defaults(today: NaiveDate) -> Self {
        Self {
            height_cm: DEFAULT_HEIGHT_CM,
            weight_kg: DEFAULT_WEIGHT_KG,
            target_weight_kg: DEFAULT_TARGET_WEIGHT_KG,
            target_date: today + Duration::days(DEFAULT_TARGET_DAYS),
        }
    }

    /// Build typed settings from the raw key/value table. Missing or
    /// unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>, today: NaiveDate) -> Self {
        let defaults = Self::defaults(today);
        Self {
            height_cm: lookup(map, HEIGHT_KEYS, |v| v.parse::<f64>().ok())
                .unwrap_or(defaults.height_cm),
            weight_kg: lookup(map, WEIGHT_KEYS, |v| v.parse::<f64>().ok())
                .unwrap_or(defaults.weight_kg),
            target_weight_kg: lookup(map, TARGET_WEIGHT_KEYS, |v| v.parse::<f64>().ok())
                .unwrap_or(defaults.target_weight_kg),
            target_date: lookup(map, TARGET_DATE_KEYS, |v| {
                NaiveDate::parse_from_str(v, DATE_FORMAT).ok()
            })
            .unwrap_or(defaults.target_date),
        }
    }

    /// True when the raw table holds at least one key this type understands.
    #[must_use]
    pub fn has_known_keys(map: &BTreeMap<String, String>) -> bool {
        [HEIGHT_KEYS, WEIGHT_KEYS, TARGET_WEIGHT_KEYS, TARGET_DATE_KEYS]
            .iter()
            .flat_map(|keys| keys.iter())
            .any(|k| map.contains_key(*k))
    }

    /// Canonical key/value pairs, values as they are written to the store.
    #[must_use]
    pub fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (SETTING_HEIGHT, self.height_cm.to_string()),
            (SETTING_WEIGHT, self.weight_kg.to_string()),
            (SETTING_TARGET_WEIGHT, self.target_weight_kg.to_string()),
            (
                SETTING_TARGET_DATE,
                self.target_date.format(DATE_FORMAT).to_string(),
            ),
        ]
    }
}

fn lookup<T>(
    map: &BTreeMap<String, String>,
    keys: &[&str],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    for key in keys {
        if let Some(raw) = map.get(*key) {
            if let Some(value) = parse(raw.trim()) {
                return Some(value);
            }
            warn!(key, value = %raw, "ignoring unparseable setting");
        }
    }
    None
}

/// Bounds match what the settings form has always accepted.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if !(50.0..=250.0).contains(&settings.height_cm) {
        bail!("Height must be between 50 and 250 cm");
    }
    if !(30.0..=300.0).contains(&settings.weight_kg) {
        bail!("Weight must be between 30 and 300 kg");
    }
    if !(30.0..=300.0).contains(&settings.target_weight_kg) {
        bail!("Target weight must be between 30 and 300 kg");
    }
    Ok(())
}

// --- BMR profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => bail!("Invalid sex '{s}'. Use 'male' or 'female'"),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => f.write_str("male"),
            Self::Female => f.write_str("female"),
        }
    }
}

/// Inputs to the BMR estimate that are not part of the stored settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BmrProfile {
    pub age_years: f64,
    pub sex: Sex,
}

impl Default for BmrProfile {
    fn default() -> Self {
        Self {
            age_years: 30.0,
            sex: Sex::Male,
        }
    }
}

// --- Derived views ---

/// Parallel series for charting, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    pub dates: Vec<NaiveDate>,
    pub weight_kg: Vec<f64>,
    pub steps: Vec<u32>,
    pub calories: Vec<u32>,
}

/// One row of the `trends` table: Date, Net Calories, Weight, Steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub date: NaiveDate,
    pub net_calories: f64,
    pub weight_kg: f64,
    pub steps: u32,
}

impl TrendRow {
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.format(DATE_FORMAT).to_string(),
            format!("{:.0}", no_neg_zero(self.net_calories.round())),
            self.weight_kg.to_string(),
            self.steps.to_string(),
        ]
    }
}

/// Rounding -0.4 gives -0.0, which formats as "-0".
fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub log_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_calories: Option<f64>,
    pub bmr: f64,
    /// Average intake as a fraction of BMR, clamped to 0..=1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calorie_ratio: Option<f64>,
    pub start_weight_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_weight_kg: Option<f64>,
    pub target_weight_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    pub target_date: NaiveDate,
    pub days_to_target: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn test_daily_log_row_roundtrip() {
        let log = DailyLog {
            date: date(2025, 3, 4),
            calories: 2100,
            steps: 8500,
            weight_kg: 81.4,
            notes: Some("Leg day".to_string()),
        };
        let cells = log.to_row();
        assert_eq!(cells, row(&["2025-03-04", "2100", "8500", "81.4", "Leg day"]));
        assert_eq!(DailyLog::from_row(&cells).unwrap(), log);
    }

    #[test]
    fn test_daily_log_from_row_without_notes() {
        let log = DailyLog::from_row(&row(&["2025-03-04", "1800", "0", "80"])).unwrap();
        assert_eq!(log.calories, 1800);
        assert!((log.weight_kg - 80.0).abs() < f64::EPSILON);
        assert!(log.notes.is_none());
    }

    #[test]
    fn test_daily_log_from_row_empty_notes_is_none() {
        let log = DailyLog::from_row(&row(&["2025-03-04", "1800", "0", "80", "  "])).unwrap();
        assert!(log.notes.is_none());
    }

    #[test]
    fn test_daily_log_from_row_accepts_float_counts() {
        let log = DailyLog::from_row(&row(&["2025-03-04", "2000.0", "7500.0", "80"])).unwrap();
        assert_eq!(log.calories, 2000);
        assert_eq!(log.steps, 7500);
    }

    #[test]
    fn test_daily_log_from_row_malformed() {
        assert!(DailyLog::from_row(&row(&["2025-03-04", "1800"])).is_err());
        assert!(DailyLog::from_row(&row(&["yesterday", "1800", "0", "80"])).is_err());
        assert!(DailyLog::from_row(&row(&["2025-03-04", "-5", "0", "80"])).is_err());
        assert!(DailyLog::from_row(&row(&["2025-03-04", "12.5", "0", "80"])).is_err());
        assert!(DailyLog::from_row(&row(&["2025-03-04", "1800", "0", "heavy"])).is_err());
        assert!(DailyLog::from_row(&row(&["2025-03-04", "1", "2", "3", "x", "extra"])).is_err());
    }

    #[test]
    fn test_validate_daily_log() {
        let mut log = DailyLog {
            date: date(2025, 1, 1),
            calories: 0,
            steps: 0,
            weight_kg: 0.0,
            notes: None,
        };
        assert!(validate_daily_log(&log).is_ok());
        log.weight_kg = -1.0;
        assert!(validate_daily_log(&log).is_err());
        log.weight_kg = f64::NAN;
        assert!(validate_daily_log(&log).is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let s = Settings::defaults(date(2025, 1, 1));
        assert!((s.height_cm - 170.0).abs() < f64::EPSILON);
        assert!((s.weight_kg - 70.0).abs() < f64::EPSILON);
        assert!((s.target_weight_kg - 65.0).abs() < f64::EPSILON);
        assert_eq!(s.target_date, date(2025, 1, 31));
    }

    #[test]
    fn test_settings_from_map_canonical_keys() {
        let mut map = BTreeMap::new();
        map.insert("Height".to_string(), "182".to_string());
        map.insert("Weight".to_string(), "90.5".to_string());
        map.insert("Target Weight".to_string(), "80".to_string());
        map.insert("Target Date".to_string(), "2025-12-31".to_string());

        let s = Settings::from_map(&map, date(2025, 1, 1));
        assert!((s.height_cm - 182.0).abs() < f64::EPSILON);
        assert!((s.weight_kg - 90.5).abs() < f64::EPSILON);
        assert!((s.target_weight_kg - 80.0).abs() < f64::EPSILON);
        assert_eq!(s.target_date, date(2025, 12, 31));
    }

    #[test]
    fn test_settings_from_map_aliases() {
        let mut map = BTreeMap::new();
        map.insert("target_weight".to_string(), "72".to_string());
        map.insert("target_date".to_string(), "2025-06-01".to_string());

        let s = Settings::from_map(&map, date(2025, 1, 1));
        assert!((s.target_weight_kg - 72.0).abs() < f64::EPSILON);
        assert_eq!(s.target_date, date(2025, 6, 1));
        assert!(Settings::has_known_keys(&map));
    }

    #[test]
    fn test_settings_canonical_key_beats_alias() {
        let mut map = BTreeMap::new();
        map.insert("Target Weight".to_string(), "75".to_string());
        map.insert("target_weight".to_string(), "60".to_string());

        let s = Settings::from_map(&map, date(2025, 1, 1));
        assert!((s.target_weight_kg - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_settings_unparseable_value_falls_back() {
        let mut map = BTreeMap::new();
        map.insert("Height".to_string(), "tall".to_string());
        map.insert("height".to_string(), "175".to_string());
        map.insert("Target Date".to_string(), "soon".to_string());

        let s = Settings::from_map(&map, date(2025, 1, 1));
        assert!((s.height_cm - 175.0).abs() < f64::EPSILON);
        assert_eq!(s.target_date, date(2025, 1, 31));
    }

    #[test]
    fn test_settings_unknown_keys_only() {
        let mut map = BTreeMap::new();
        map.insert("Theme".to_string(), "dark".to_string());
        assert!(!Settings::has_known_keys(&map));
    }

    #[test]
    fn test_settings_to_entries() {
        let s = Settings {
            height_cm: 180.0,
            weight_kg: 92.3,
            target_weight_kg: 85.0,
            target_date: date(2025, 9, 1),
        };
        assert_eq!(
            s.to_entries(),
            vec![
                ("Height", "180".to_string()),
                ("Weight", "92.3".to_string()),
                ("Target Weight", "85".to_string()),
                ("Target Date", "2025-09-01".to_string()),
            ]
        );
    }

    #[test]
    fn test_validate_settings() {
        let mut s = Settings::defaults(date(2025, 1, 1));
        assert!(validate_settings(&s).is_ok());
        s.height_cm = 20.0;
        assert!(validate_settings(&s).is_err());
        s.height_cm = 170.0;
        s.target_weight_kg = 400.0;
        assert!(validate_settings(&s).is_err());
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!("male".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!("Female".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!("F".parse::<Sex>().unwrap(), Sex::Female);
        assert!("other".parse::<Sex>().is_err());
        assert_eq!(Sex::Female.to_string(), "female");
    }

    #[test]
    fn test_bmr_profile_default() {
        let p = BmrProfile::default();
        assert!((p.age_years - 30.0).abs() < f64::EPSILON);
        assert_eq!(p.sex, Sex::Male);
    }

    #[test]
    fn test_trend_row_to_row() {
        let r = TrendRow {
            date: date(2025, 2, 2),
            net_calories: -312.6,
            weight_kg: 79.9,
            steps: 10_000,
        };
        assert_eq!(r.to_row(), row(&["2025-02-02", "-313", "79.9", "10000"]));
    }

    #[test]
    fn test_trend_row_small_deficit_is_zero() {
        for net in [-0.4, -0.0, 0.3] {
            let r = TrendRow {
                date: date(2025, 2, 2),
                net_calories: net,
                weight_kg: 80.0,
                steps: 0,
            };
            assert_eq!(r.to_row()[1], "0", "net {net}");
        }
    }

    #[test]
    fn test_daily_log_json() {
        let log = DailyLog {
            date: date(2025, 1, 9),
            calories: 1850,
            steps: 7200,
            weight_kg: 80.2,
            notes: None,
        };
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["date"], "2025-01-09");
        assert!(value.get("notes").is_none());

        let parsed: DailyLog = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, log);
    }
}
