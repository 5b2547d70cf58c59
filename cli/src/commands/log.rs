use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use trimline_core::models::{DATE_FORMAT, DailyLog};
use trimline_core::service::TrackerService;
use trimline_core::table::UpsertOutcome;

use super::helpers::{LBS_PER_KG, json_error, parse_date, print_json, truncate, weight_to_kg};

pub(crate) struct LogArgs {
    pub calories: u32,
    pub weight: f64,
    pub unit: String,
    pub steps: u32,
    pub date: Option<String>,
    pub notes: Option<String>,
}

pub(crate) fn cmd_log(svc: &TrackerService, args: LogArgs, json: bool) -> Result<()> {
    let weight_kg = weight_to_kg(args.weight, &args.unit)?;
    if !json && !args.unit.eq_ignore_ascii_case("kg") {
        eprintln!("Converting {:.1} {} -> {weight_kg:.2} kg", args.weight, args.unit);
    }

    let log = DailyLog {
        date: parse_date(args.date)?,
        calories: args.calories,
        steps: args.steps,
        weight_kg,
        notes: args.notes.filter(|n| !n.trim().is_empty()),
    };
    let outcome = svc.log_day(&log)?;

    if json {
        print_json(&serde_json::json!({ "log": log, "result": outcome }))?;
    } else {
        let verb = match outcome {
            UpsertOutcome::Inserted => "Logged",
            UpsertOutcome::Updated { .. } => "Updated",
        };
        println!(
            "{verb} {}: {} kcal, {} steps, {:.1} kg ({:.1} lbs)",
            log.date.format(DATE_FORMAT),
            log.calories,
            log.steps,
            log.weight_kg,
            log.weight_kg * LBS_PER_KG
        );
        if let Some(ref n) = log.notes {
            println!("  Notes: {n}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_show(svc: &TrackerService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;

    if let Some(log) = svc.get_log(date)? {
        if json {
            print_json(&log)?;
        } else {
            println!("=== {} ===\n", log.date.format(DATE_FORMAT));
            println!("  Calories: {} kcal", log.calories);
            println!("  Steps:    {}", log.steps);
            println!(
                "  Weight:   {:.1} kg ({:.1} lbs)",
                log.weight_kg,
                log.weight_kg * LBS_PER_KG
            );
            if let Some(ref n) = log.notes {
                println!("  Notes:    {n}");
            }
        }
    } else {
        let message = format!("No entry for {}", date.format(DATE_FORMAT));
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_history(svc: &TrackerService, days: usize, json: bool) -> Result<()> {
    let logs = svc.recent_logs(days)?;

    if json {
        return print_json(&logs);
    }
    if logs.is_empty() {
        eprintln!("No entries yet. Use `trimline log` to record a day.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: u32,
        #[tabled(rename = "Steps")]
        steps: u32,
        #[tabled(rename = "Weight (kg)")]
        kg: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<HistoryRow> = logs
        .iter()
        .map(|l| HistoryRow {
            date: l.date.format(DATE_FORMAT).to_string(),
            calories: l.calories,
            steps: l.steps,
            kg: format!("{:.1}", l.weight_kg),
            notes: l.notes.as_deref().map(|n| truncate(n, 30)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
