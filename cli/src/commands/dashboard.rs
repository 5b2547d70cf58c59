use anyhow::Result;

use trimline_core::models::{DATE_FORMAT, DashboardSummary};
use trimline_core::service::TrackerService;

use super::helpers::{no_neg_zero, print_json, today};

const BAR_WIDTH: usize = 30;

pub(crate) fn cmd_dashboard(svc: &TrackerService, json: bool) -> Result<()> {
    let summary = svc.dashboard(today())?;

    if json {
        return print_json(&summary);
    }

    for line in render_dashboard(&summary) {
        println!("{line}");
    }
    Ok(())
}

fn render_dashboard(s: &DashboardSummary) -> Vec<String> {
    let mut lines = vec!["=== Dashboard ===".to_string(), String::new()];

    match s.average_calories {
        Some(avg) => lines.push(format!(
            "  Avg intake:   {:.0} kcal/day over {} logged day(s)",
            no_neg_zero(avg),
            s.log_count
        )),
        None => lines.push("  Avg intake:   no entries yet".to_string()),
    }
    lines.push(format!("  BMR:          {:.0} kcal/day", s.bmr));
    if let Some(ratio) = s.calorie_ratio {
        lines.push(format!("  Intake/BMR:   {} {:.0}%", bar(ratio), ratio * 100.0));
    }

    lines.push(String::new());
    let current = s
        .current_weight_kg
        .map_or_else(|| "-".to_string(), |w| format!("{w:.1} kg"));
    lines.push(format!(
        "  Weight:       {:.1} kg -> {current} (target {:.1} kg)",
        s.start_weight_kg, s.target_weight_kg
    ));
    if let Some(pct) = s.progress_percent {
        lines.push(format!(
            "  Progress:     {} {:.1}%",
            bar(pct / 100.0),
            no_neg_zero(pct)
        ));
    }

    let date = s.target_date.format(DATE_FORMAT);
    lines.push(match s.days_to_target {
        d if d > 0 => format!("  Target date:  {date} ({d} days left)"),
        0 => format!("  Target date:  {date} (today)"),
        d => format!("  Target date:  {date} ({} days ago)", -d),
    });
    lines
}

/// Fixed-width text bar. `fraction` is clamped to 0..=1 for drawing only.
#[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn bar(fraction: f64) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}
