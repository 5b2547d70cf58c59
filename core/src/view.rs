//! Turns raw logs and settings into what the dashboard and trend pages show.
//! Nothing here touches the store.

use chrono::NaiveDate;

use crate::metrics::{
    compute_average_calories, compute_bmr, compute_calorie_ratio, compute_progress_percent,
    net_calories,
};
use crate::models::{BmrProfile, DailyLog, DashboardSummary, Settings, TrendRow, TrendSeries};

fn sorted_by_date(logs: &[DailyLog]) -> Vec<&DailyLog> {
    let mut sorted: Vec<&DailyLog> = logs.iter().collect();
    // Stable, so entries sharing a date keep their store order.
    sorted.sort_by_key(|l| l.date);
    sorted
}

#[must_use]
pub fn build_trend_series(logs: &[DailyLog]) -> TrendSeries {
    let sorted = sorted_by_date(logs);
    TrendSeries {
        dates: sorted.iter().map(|l| l.date).collect(),
        weight_kg: sorted.iter().map(|l| l.weight_kg).collect(),
        steps: sorted.iter().map(|l| l.steps).collect(),
        calories: sorted.iter().map(|l| l.calories).collect(),
    }
}

/// The `n` most recent logs, oldest first.
#[must_use]
pub fn build_latest_window(logs: &[DailyLog], n: usize) -> Vec<DailyLog> {
    let sorted = sorted_by_date(logs);
    let skip = sorted.len().saturating_sub(n);
    sorted.into_iter().skip(skip).cloned().collect()
}

#[must_use]
pub fn build_dashboard_summary(
    logs: &[DailyLog],
    settings: &Settings,
    profile: &BmrProfile,
    today: NaiveDate,
) -> DashboardSummary {
    let bmr = compute_bmr(
        settings.weight_kg,
        settings.height_cm,
        profile.age_years,
        profile.sex,
    );
    let average_calories = compute_average_calories(logs);
    let calorie_ratio = average_calories.and_then(|avg| compute_calorie_ratio(avg, bmr));
    let current_weight_kg = sorted_by_date(logs).last().map(|l| l.weight_kg);
    let progress_percent = current_weight_kg.map(|current| {
        compute_progress_percent(settings.weight_kg, current, settings.target_weight_kg)
    });

    DashboardSummary {
        log_count: logs.len(),
        average_calories,
        bmr,
        calorie_ratio,
        start_weight_kg: settings.weight_kg,
        current_weight_kg,
        target_weight_kg: settings.target_weight_kg,
        progress_percent,
        target_date: settings.target_date,
        days_to_target: (settings.target_date - today).num_days(),
    }
}

/// Rows for the `trends` table, ascending by date.
#[must_use]
pub fn build_trend_rows(logs: &[DailyLog], bmr: f64) -> Vec<TrendRow> {
    sorted_by_date(logs)
        .into_iter()
        .map(|l| TrendRow {
            date: l.date,
            net_calories: net_calories(l.calories, bmr),
            weight_kg: l.weight_kg,
            steps: l.steps,
        })
        .collect()
}
