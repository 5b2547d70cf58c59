use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sheets::SheetsBackend;
use trimline_core::backends::{CsvBackend, MemoryBackend};
use trimline_core::models::{BmrProfile, Sex};
use trimline_core::table::TableBackend;

pub const DEFAULT_TOKEN_ENV: &str = "TRIMLINE_SHEETS_TOKEN";

/// Which table backend to open, as selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Memory,
    Csv,
    Sheets,
}

/// `config.json` in the config directory. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub backend: Option<BackendConfig>,
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    Csv {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
    Sheets {
        spreadsheet_id: String,
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub age: Option<f64>,
    pub sex: Option<Sex>,
}

pub struct Config {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub file: ConfigFile,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "trimline").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_path = proj_dirs.config_dir().join("config.json");
        let file = read_config_file(&config_path)?;

        Ok(Config {
            data_dir,
            config_path,
            file,
        })
    }

    /// Open the table backend. `kind` from the command line wins over the
    /// config file; with neither, the CSV directory under the data dir is used.
    pub fn open_backend(&self, kind: Option<BackendKind>) -> Result<Box<dyn TableBackend>> {
        let configured = self.file.backend.clone();
        let selected = match (kind, configured) {
            (None, Some(cfg)) => cfg,
            (None, None) | (Some(BackendKind::Csv), None) => BackendConfig::Csv { dir: None },
            (Some(BackendKind::Memory), _) => BackendConfig::Memory,
            (Some(BackendKind::Csv), Some(cfg)) => match cfg {
                BackendConfig::Csv { dir } => BackendConfig::Csv { dir },
                _ => BackendConfig::Csv { dir: None },
            },
            (Some(BackendKind::Sheets), Some(cfg @ BackendConfig::Sheets { .. })) => cfg,
            (Some(BackendKind::Sheets), _) => bail!(
                "The sheets backend needs a spreadsheet_id in {}",
                self.config_path.display()
            ),
        };

        match selected {
            BackendConfig::Memory => {
                tracing::warn!("using the in-memory backend, nothing will be saved");
                Ok(Box::new(MemoryBackend::new()))
            }
            BackendConfig::Csv { dir } => {
                let dir = dir.unwrap_or_else(|| self.data_dir.join("tables"));
                tracing::debug!(dir = %dir.display(), "using csv backend");
                Ok(Box::new(CsvBackend::open(&dir)?))
            }
            BackendConfig::Sheets {
                spreadsheet_id,
                token_env,
            } => {
                let token = std::env::var(&token_env).with_context(|| {
                    format!("Set {token_env} to an OAuth access token for the spreadsheet")
                })?;
                tracing::debug!(%spreadsheet_id, "using sheets backend");
                Ok(Box::new(SheetsBackend::new(&spreadsheet_id, &token)?))
            }
        }
    }

    /// BMR inputs: command-line values, then the config file, then defaults.
    #[must_use]
    pub fn profile(&self, age: Option<f64>, sex: Option<Sex>) -> BmrProfile {
        let defaults = BmrProfile::default();
        BmrProfile {
            age_years: age.or(self.file.profile.age).unwrap_or(defaults.age_years),
            sex: sex.or(self.file.profile.sex).unwrap_or(defaults.sex),
        }
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        Ok((key, true))
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}
