use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use trimline_core::models::DATE_FORMAT;

pub(crate) const LBS_PER_KG: f64 = 2.20462;
pub(crate) const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(today()),
        Some(s) => parse_date_str(&s),
    }
}

pub(crate) fn parse_date_str(s: &str) -> Result<NaiveDate> {
    match s.trim() {
        "today" => Ok(today()),
        "yesterday" => Ok(today() - chrono::Duration::days(1)),
        "tomorrow" => Ok(today() + chrono::Duration::days(1)),
        other => NaiveDate::parse_from_str(other, DATE_FORMAT).with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// Convert a weight in `unit` (kg or lbs) to kilograms. Zero is allowed;
/// settings ranges are checked when they are saved.
pub(crate) fn weight_to_kg(value: f64, unit: &str) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        bail!("Weight must be a non-negative number");
    }
    match unit.trim().to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => Ok(no_neg_zero(value * KG_PER_LB)),
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        assert_eq!(parse_date(None).unwrap(), Local::now().date_naive());
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
        assert!(parse_date(Some("2024-13-01".to_string())).is_err());
    }

    #[test]
    fn test_weight_to_kg() {
        assert!((weight_to_kg(80.0, "kg").unwrap() - 80.0).abs() < f64::EPSILON);
        assert!((weight_to_kg(80.0, "KG").unwrap() - 80.0).abs() < f64::EPSILON);
        assert!((weight_to_kg(200.0, "lbs").unwrap() - 90.7184).abs() < 1e-4);
        assert!((weight_to_kg(200.0, "lb").unwrap() - 90.7184).abs() < 1e-4);
    }

    #[test]
    fn test_weight_to_kg_accepts_zero() {
        assert_eq!(weight_to_kg(0.0, "kg").unwrap().to_bits(), 0.0_f64.to_bits());
        assert_eq!(weight_to_kg(0.0, "lbs").unwrap().to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn test_weight_to_kg_invalid() {
        assert!(weight_to_kg(-5.0, "kg").is_err());
        assert!(weight_to_kg(f64::NAN, "kg").is_err());
        assert!(weight_to_kg(80.0, "stone").is_err());
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), r#"{"error":"nope"}"#);
        assert_eq!(json_error("say \"hi\""), r#"{"error":"say \"hi\""}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }
}
