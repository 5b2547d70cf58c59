mod dashboard;
mod helpers;
mod log;
mod settings;
mod trends;

pub(crate) use dashboard::cmd_dashboard;
pub(crate) use log::{LogArgs, cmd_history, cmd_log, cmd_show};
pub(crate) use settings::{SettingsUpdate, cmd_settings_set, cmd_settings_show};
pub(crate) use trends::cmd_trends;
