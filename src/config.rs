use crate::clustering::{ClusteringStrategy, MatchWindow};
use crate::error::{DedupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "LEDGER_DEDUP_DB";
pub const ENV_BIND_ADDR: &str = "LEDGER_DEDUP_BIND";

/// Knobs for duplicate detection. Defaults reproduce production grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Max amount difference in minor units (1 = 0.01)
    #[serde(default = "default_amount_tolerance")]
    pub amount_tolerance_minor: i64,

    /// Max days between a cluster seed and a member
    #[serde(default = "default_max_days_apart")]
    pub max_days_apart: i64,

    #[serde(default)]
    pub strategy: ClusteringStrategy,
}

fn default_amount_tolerance() -> i64 {
    MatchWindow::default().amount_tolerance_minor
}

fn default_max_days_apart() -> i64 {
    MatchWindow::default().max_days_apart
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            amount_tolerance_minor: default_amount_tolerance(),
            max_days_apart: default_max_days_apart(),
            strategy: ClusteringStrategy::default(),
        }
    }
}

impl DetectionConfig {
    pub fn window(&self) -> MatchWindow {
        MatchWindow {
            amount_tolerance_minor: self.amount_tolerance_minor,
            max_days_apart: self.max_days_apart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub detection: DetectionConfig,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledger-dedup")
        .join("ledger.db")
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            detection: DetectionConfig::default(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ledger-dedup")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Read settings from `path`; a missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&content)?;
    Ok(settings)
}

impl Settings {
    /// File settings (explicit path or the default location), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
        let mut settings = load_settings_from(&path)?;
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from a key lookup (the process env in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(bind) = lookup(ENV_BIND_ADDR).filter(|v| !v.is_empty()) {
            self.bind_addr = bind;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection.amount_tolerance_minor < 0 {
            return Err(DedupError::InvalidInput(
                "detection.amount_tolerance_minor must be >= 0".to_string(),
            ));
        }
        if self.detection.max_days_apart < 0 {
            return Err(DedupError::InvalidInput("detection.max_days_apart must be >= 0".to_string()));
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, format!("{json}\n"))?;
        Ok(())
    }
}
