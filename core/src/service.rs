use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use crate::backends::MemoryBackend;
use crate::metrics::compute_bmr;
use crate::models::{
    BmrProfile, DailyLog, DashboardSummary, Settings, TrendSeries, validate_settings,
};
use crate::store::RecordStore;
use crate::table::UpsertOutcome;
use crate::view::{
    build_dashboard_summary, build_latest_window, build_trend_rows, build_trend_series,
};

/// One method per user interaction. Every call re-reads the store; nothing
/// is cached between calls.
///
/// Called synchronously. With a network backend each call blocks on HTTP,
/// so async callers should run it on a blocking thread.
pub struct TrackerService {
    store: RecordStore,
    profile: BmrProfile,
}

impl TrackerService {
    #[must_use]
    pub fn new(store: RecordStore, profile: BmrProfile) -> Self {
        Self { store, profile }
    }

    pub fn new_in_memory() -> Result<Self> {
        let store = RecordStore::open(Box::new(MemoryBackend::new()))?;
        Ok(Self::new(store, BmrProfile::default()))
    }

    #[must_use]
    pub fn profile(&self) -> &BmrProfile {
        &self.profile
    }

    // --- Daily logs ---

    pub fn log_day(&self, log: &DailyLog) -> Result<UpsertOutcome> {
        let outcome = self.store.upsert_log(log)?;
        info!(date = %log.date, ?outcome, "logged day");
        Ok(outcome)
    }

    pub fn get_log(&self, date: NaiveDate) -> Result<Option<DailyLog>> {
        self.store.find_log(date)
    }

    pub fn all_logs(&self) -> Result<Vec<DailyLog>> {
        self.store.read_all_logs()
    }

    pub fn recent_logs(&self, n: usize) -> Result<Vec<DailyLog>> {
        let logs = self.store.read_all_logs()?;
        Ok(build_latest_window(&logs, n))
    }

    // --- Settings ---

    pub fn settings(&self, today: NaiveDate) -> Result<Settings> {
        self.store.load_settings(today)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        validate_settings(settings)?;
        self.store.save_settings(settings)?;
        info!("settings saved");
        Ok(settings.clone())
    }

    // --- Derived views ---

    pub fn dashboard(&self, today: NaiveDate) -> Result<DashboardSummary> {
        let settings = self.store.load_settings(today)?;
        let logs = self.store.read_all_logs()?;
        Ok(build_dashboard_summary(
            &logs,
            &settings,
            &self.profile,
            today,
        ))
    }

    pub fn trends(&self) -> Result<TrendSeries> {
        let logs = self.store.read_all_logs()?;
        Ok(build_trend_series(&logs))
    }

    /// Upsert one `trends` row per logged date. Rows whose date is no longer
    /// logged stay in the table. Returns the number of rows written.
    pub fn publish_trends(&self, today: NaiveDate) -> Result<usize> {
        let settings = self.store.load_settings(today)?;
        let bmr = compute_bmr(
            settings.weight_kg,
            settings.height_cm,
            self.profile.age_years,
            self.profile.sex,
        );
        let logs = self.store.read_all_logs()?;
        let written = self.store.write_trends(&build_trend_rows(&logs, bmr))?;
        info!(rows = written, "published trends");
        Ok(written)
    }
}
