use anyhow::{Result, bail};

use trimline_core::models::{DATE_FORMAT, Settings};
use trimline_core::service::TrackerService;

use super::helpers::{LBS_PER_KG, parse_date_str, print_json, today, weight_to_kg};

#[derive(Default)]
pub(crate) struct SettingsUpdate {
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub target_date: Option<String>,
    pub unit: String,
}

pub(crate) fn cmd_settings_show(svc: &TrackerService, json: bool) -> Result<()> {
    let settings = svc.settings(today())?;
    let profile = svc.profile();

    if json {
        return print_json(&serde_json::json!({
            "settings": settings,
            "profile": profile,
        }));
    }

    print_settings(&settings);
    println!("  Age:           {:.0} (config)", profile.age_years);
    println!("  Sex:           {} (config)", profile.sex);
    Ok(())
}

pub(crate) fn cmd_settings_set(
    svc: &TrackerService,
    update: SettingsUpdate,
    json: bool,
) -> Result<()> {
    let current = svc.settings(today())?;
    let updated = apply_update(current, update)?;
    let saved = svc.save_settings(&updated)?;

    if json {
        print_json(&saved)?;
    } else {
        println!("Settings saved");
        print_settings(&saved);
    }
    Ok(())
}

fn apply_update(mut settings: Settings, update: SettingsUpdate) -> Result<Settings> {
    if update.height.is_none()
        && update.weight.is_none()
        && update.target_weight.is_none()
        && update.target_date.is_none()
    {
        bail!("Nothing to change. Pass --height, --weight, --target-weight or --target-date");
    }

    if let Some(h) = update.height {
        settings.height_cm = h;
    }
    if let Some(w) = update.weight {
        settings.weight_kg = weight_to_kg(w, &update.unit)?;
    }
    if let Some(w) = update.target_weight {
        settings.target_weight_kg = weight_to_kg(w, &update.unit)?;
    }
    if let Some(d) = update.target_date {
        settings.target_date = parse_date_str(&d)?;
    }
    Ok(settings)
}

fn print_settings(s: &Settings) {
    println!("  Height:        {:.1} cm", s.height_cm);
    println!(
        "  Start weight:  {:.1} kg ({:.1} lbs)",
        s.weight_kg,
        s.weight_kg * LBS_PER_KG
    );
    println!(
        "  Target weight: {:.1} kg ({:.1} lbs)",
        s.target_weight_kg,
        s.target_weight_kg * LBS_PER_KG
    );
    println!("  Target date:   {}", s.target_date.format(DATE_FORMAT));
}
