use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use trimline_core::models::{DATE_FORMAT, TrendSeries};
use trimline_core::service::TrackerService;

use super::helpers::{print_json, today};

pub(crate) fn cmd_trends(svc: &TrackerService, publish: bool, json: bool) -> Result<()> {
    let series = svc.trends()?;
    let published = if publish {
        Some(svc.publish_trends(today())?)
    } else {
        None
    };

    if json {
        return print_json(&serde_json::json!({
            "series": series,
            "published_rows": published,
        }));
    }

    if series.dates.is_empty() {
        eprintln!("No entries yet. Use `trimline log` to record a day.");
    } else {
        println!("{}", trend_table(&series));
    }
    if let Some(rows) = published {
        println!("Published {rows} row(s) to the trends table");
    }
    Ok(())
}

fn trend_table(series: &TrendSeries) -> String {
    #[derive(Tabled)]
    struct TrendLine {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        kg: String,
        #[tabled(rename = "Change")]
        change: String,
        #[tabled(rename = "Steps")]
        steps: u32,
        #[tabled(rename = "Calories")]
        calories: u32,
    }

    let rows: Vec<TrendLine> = series
        .dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let kg = series.weight_kg[i];
            let change = i
                .checked_sub(1)
                .map(|prev| kg - series.weight_kg[prev])
                .map_or_else(|| "-".to_string(), |d| format!("{d:+.1}"));
            TrendLine {
                date: date.format(DATE_FORMAT).to_string(),
                kg: format!("{kg:.1}"),
                change,
                steps: series.steps[i],
                calories: series.calories[i],
            }
        })
        .collect();

    Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string()
}
