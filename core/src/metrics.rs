//! Pure calculations behind the dashboard.

use crate::models::{DailyLog, Sex};

/// Floor for the progress denominator so a target equal to the start
/// weight does not divide by zero.
pub const PROGRESS_EPSILON: f64 = 1e-5;

/// Harris-Benedict basal metabolic rate in kcal/day.
///
/// Inputs are not validated: zero or negative values flow through the
/// formula unchanged.
#[must_use]
pub fn compute_bmr(weight_kg: f64, height_cm: f64, age_years: f64, sex: Sex) -> f64 {
    match sex {
        Sex::Male => 88.362 + 13.397 * weight_kg + 4.799 * height_cm - 5.677 * age_years,
        Sex::Female => 447.593 + 9.247 * weight_kg + 3.098 * height_cm - 4.330 * age_years,
    }
}

/// Share of the planned loss already achieved, in percent. Not clamped:
/// overshooting the target gives more than 100, gaining weight gives a
/// negative value.
#[must_use]
pub fn compute_progress_percent(start_weight: f64, current_weight: f64, target_weight: f64) -> f64 {
    (start_weight - current_weight) / (start_weight - target_weight).max(PROGRESS_EPSILON) * 100.0
}

/// Calories per calendar day spanned by the logs, counting days with no
/// entry. `None` when there are no logs.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_average_calories(logs: &[DailyLog]) -> Option<f64> {
    let first = logs.iter().map(|l| l.date).min()?;
    let last = logs.iter().map(|l| l.date).max()?;
    let total: u64 = logs.iter().map(|l| u64::from(l.calories)).sum();
    let days = (last - first).num_days() + 1;
    Some(total as f64 / days as f64)
}

/// Average intake relative to BMR, clamped to `0.0..=1.0`.
#[must_use]
pub fn compute_calorie_ratio(average_calories: f64, bmr: f64) -> Option<f64> {
    if bmr <= 0.0 {
        return None;
    }
    Some((average_calories / bmr).clamp(0.0, 1.0))
}

#[must_use]
pub fn net_calories(calories: u32, bmr: f64) -> f64 {
    f64::from(calories) - bmr
}
