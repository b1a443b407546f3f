// User settings
// Loaded from ~/.config/payrecon/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("cannot write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Export target when `--export` is given without an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Reconciliation defaults, overridable per job and per command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconSettings {
    /// Decimal amount; differences strictly above it are discrepancies
    pub tolerance: String,

    /// Wall-clock limit for one reconciliation, None = unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for ReconSettings {
    fn default() -> Self {
        Self {
            tolerance: "0.00".to_string(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub format: ExportFormat,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { format: ExportFormat::Xlsx }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Marketplace labels offered by front ends
    pub marketplaces: Vec<String>,

    pub recon: ReconSettings,

    pub export: ExportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            marketplaces: vec!["Amazon".into(), "Meesho".into(), "Flipkart".into()],
            recon: ReconSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

const DEFAULT_FILE: &str = r#"# payrecon settings

marketplaces = ["Amazon", "Meesho", "Flipkart"]

[recon]
# Differences strictly greater than this amount are reported
tolerance = "0.00"
# Abort a reconciliation that runs longer than this (milliseconds)
# timeout_ms = 30000

[export]
# "xlsx" or "csv"
format = "xlsx"
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("payrecon")
            .join("settings.toml")
    }

    /// Load settings from the default location, falling back to defaults.
    /// Creates a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = Self::write_default_file(&path) {
                tracing::debug!(error = %e, "could not create default settings file");
            }
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save current settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |message: String| SettingsError::Write {
            path: path.to_path_buf(),
            message,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        fs::write(path, text).map_err(|e| write_err(e.to_string()))
    }

    fn write_default_file(path: &Path) -> Result<(), SettingsError> {
        let write_err = |e: std::io::Error| SettingsError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, DEFAULT_FILE).map_err(write_err)
    }
}
