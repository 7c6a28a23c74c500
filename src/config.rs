use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::export::csv::CsvExporter;
use crate::export::json::JsonExporter;
use crate::export::tsv::TsvExporter;
use crate::export::{ExportFormat, Exporter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtensionConfig {
    pub copy_feedback_ms: u64,
    pub startup_notice_ms: u64,
    pub exit_animation_ms: u64,
    pub label_revert_ms: u64,
    pub rescan_delay_ms: u64,
    pub initial_label: String,
    pub idle_label: String,
    pub busy_label: String,
    pub success_message: String,
    pub error_message: String,
    pub startup_message: String,
    pub show_startup_notice: bool,
    pub format: ExportFormat,
    pub csv_delimiter: char,
    pub csv_bom: bool,
    pub json_pretty: bool,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            copy_feedback_ms: 3000,
            startup_notice_ms: 4000,
            exit_animation_ms: 300,
            label_revert_ms: 2000,
            rescan_delay_ms: 100,
            initial_label: "📋".to_string(),
            idle_label: "📋 Copy".to_string(),
            busy_label: "✅ Copied!".to_string(),
            success_message: "✅ Table copied to clipboard!".to_string(),
            error_message: "❌ Failed to copy table".to_string(),
            startup_message: "📋 Table Copy Extension Active!".to_string(),
            show_startup_notice: false,
            format: ExportFormat::Tsv,
            csv_delimiter: ',',
            csv_bom: false,
            json_pretty: false,
        }
    }
}

impl ExtensionConfig {
    /// Loads `config.json` from the platform config directory, falling back
    /// to defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs = ProjectDirs::from("com", "table-copy", "table-copy")
            .ok_or(ConfigError::NoConfigDir)?;

        Ok(proj_dirs.config_dir().join("config.json"))
    }

    pub fn copy_feedback(&self) -> Duration {
        Duration::from_millis(self.copy_feedback_ms)
    }

    pub fn startup_notice(&self) -> Duration {
        Duration::from_millis(self.startup_notice_ms)
    }

    pub fn exit_animation(&self) -> Duration {
        Duration::from_millis(self.exit_animation_ms)
    }

    pub fn label_revert(&self) -> Duration {
        Duration::from_millis(self.label_revert_ms)
    }

    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms)
    }

    /// Builds the exporter for the configured payload format.
    pub fn exporter(&self) -> Box<dyn Exporter + Send + Sync> {
        match self.format {
            ExportFormat::Tsv => Box::new(TsvExporter),
            ExportFormat::Csv => {
                let delimiter = if self.csv_delimiter.is_ascii() {
                    self.csv_delimiter as u8
                } else {
                    b','
                };
                Box::new(CsvExporter::new().with_delimiter(delimiter).with_bom(self.csv_bom))
            }
            ExportFormat::Json => Box::new(JsonExporter::new().pretty(self.json_pretty)),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.copy_feedback_ms == 0 {
            errors.push("Copy feedback dwell must be greater than zero".to_string());
        }

        if self.label_revert_ms == 0 {
            errors.push("Label revert delay must be greater than zero".to_string());
        }

        if self.initial_label.trim().is_empty() || self.idle_label.trim().is_empty() {
            errors.push("Control labels must not be empty".to_string());
        }

        if self.busy_label.trim().is_empty() {
            errors.push("Copied label must not be empty".to_string());
        }

        if !self.csv_delimiter.is_ascii() {
            errors.push(format!(
                "CSV delimiter '{}' is not ASCII, ',' will be used",
                self.csv_delimiter
            ));
        }

        errors
    }
}
