//! Persistent user configuration.
//!
//! The configuration is a TOML file with one table per section. It is loaded
//! once at startup into a [`Settings`] value that is passed down explicitly.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`YTMIGRATOR_<SECTION>__<KEY>`)
//! 2. The config file (`~/.ytmigrator/config.toml` by default)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use miette::{miette, Context, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    io::{read_json, write_bytes_atomic, write_json_atomic},
    types::{MergeQuality, Quality},
};

pub const ENV_PREFIX: &str = "YTMIGRATOR";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub download: DownloadSettings,
    pub organization: OrganizationSettings,
    pub metadata: MetadataSettings,
    pub logging: LoggingSettings,
    pub advanced: AdvancedSettings,
    pub video_processing: VideoProcessingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadSettings {
    pub output_path: PathBuf,
    pub quality: Quality,
    /// Container the downloaded streams are merged into
    pub format: String,
    pub audio_only: bool,
    pub download_subtitles: bool,
    /// Comma separated list of subtitle languages
    pub subtitle_languages: String,
    pub download_thumbnails: bool,
    pub download_metadata: bool,
    /// Forwarded as is to the download backend
    pub concurrent_downloads: u32,
    /// e.g. `50K` or `4.2M`
    pub rate_limit: Option<String>,
    pub retry_attempts: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./downloads"),
            quality: Quality::Best,
            format: "mp4".to_string(),
            audio_only: false,
            download_subtitles: true,
            subtitle_languages: "en,zh,zh-Hans,zh-Hant".to_string(),
            download_thumbnails: true,
            download_metadata: true,
            concurrent_downloads: 3,
            rate_limit: None,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrganizationSettings {
    /// Write a manifest listing the videos of each downloaded playlist
    pub organize_by_playlist: bool,
    pub max_filename_length: usize,
    /// Remove empty directories from the output at the end of a download run
    pub cleanup_empty_dirs: bool,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            organize_by_playlist: true,
            max_filename_length: 200,
            cleanup_empty_dirs: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataSettings {
    pub export_format: ExportFormat,
    pub include_technical_info: bool,
    pub include_engagement_metrics: bool,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            export_format: ExportFormat::Json,
            include_technical_info: true,
            include_engagement_metrics: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "warn", alias = "WARNING", alias = "warning")]
    Warn,
    #[default]
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "trace")]
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub log_file: PathBuf,
    /// Log to the terminal. When disabled, logs are appended to `log_file`
    pub console_output: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_file: PathBuf::from("./logs/ytmigrator.log"),
            console_output: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvancedSettings {
    pub proxy_url: Option<String>,
    pub cookies_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoProcessingSettings {
    pub default_subtitle_language: String,
    pub output_quality: MergeQuality,
    pub subtitle_fontsize: u32,
    pub subtitle_fontcolor: String,
    pub subtitle_outline: u32,
    pub subtitle_outlinecolor: String,
    /// Where intermediate subtitle files are written. System temp dir if unset
    pub temp_directory: Option<PathBuf>,
}

impl Default for VideoProcessingSettings {
    fn default() -> Self {
        Self {
            default_subtitle_language: "zh-Hans".to_string(),
            output_quality: MergeQuality::High,
            subtitle_fontsize: 24,
            subtitle_fontcolor: "white".to_string(),
            subtitle_outline: 2,
            subtitle_outlinecolor: "black".to_string(),
            temp_directory: None,
        }
    }
}

/// Problems found by [`Settings::validate`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Issues {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Settings {
    /// Return a copy of the settings with `section.key` set to `value`.
    ///
    /// The textual value is interpreted as null (`none`), a boolean, an integer
    /// or a float when the target field accepts it, and as a string otherwise.
    /// Unknown sections or keys and values of the wrong type are rejected.
    pub fn with_value(&self, section: &str, key: &str, value: &str) -> Result<Settings> {
        let doc = serde_json::to_value(self).into_diagnostic()?;
        if !doc.get(section).is_some_and(Value::is_object) {
            return Err(miette!(
                help = "Sections are: download, organization, metadata, logging, advanced, video_processing",
                "Unknown configuration section '{section}'"
            ));
        }

        let mut last_err = None;
        for candidate in interpret_value(value) {
            let mut doc = doc.clone();
            doc[section][key] = candidate;

            match serde_json::from_value::<Settings>(doc) {
                Ok(settings) => return Ok(settings),
                Err(err) => last_err = Some(err),
            }
        }

        let reason = last_err.map(|err| err.to_string()).unwrap_or_default();
        Err(miette!(
            "Invalid configuration value '{value}' for {section}.{key}: {reason}"
        ))
    }

    /// Check the settings for values that would make a run fail or misbehave
    pub fn validate(&self) -> Issues {
        let mut issues = Issues::default();

        let output = &self.download.output_path;
        let output_parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let writable = std::fs::metadata(output_parent)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            issues
                .errors
                .push(format!("Output path is not writable: {}", output.display()));
        }

        match self.download.concurrent_downloads {
            0 => issues
                .errors
                .push("concurrent_downloads must be at least 1".to_string()),
            n if n > 10 => issues
                .warnings
                .push("High concurrent download count may cause rate limiting".to_string()),
            _ => {}
        }

        if self.organization.max_filename_length < 16 {
            issues.errors.push(format!(
                "max_filename_length is too small: {}",
                self.organization.max_filename_length
            ));
        }

        if self.video_processing.subtitle_fontsize == 0 {
            issues
                .errors
                .push("subtitle_fontsize must be greater than 0".to_string());
        }

        if let Some(cookies) = &self.advanced.cookies_file {
            if !cookies.is_file() {
                issues
                    .warnings
                    .push(format!("Cookies file does not exist: {}", cookies.display()));
            }
        }

        if let Some(log_dir) = self.logging.log_file.parent() {
            if !log_dir.as_os_str().is_empty() && std::fs::create_dir_all(log_dir).is_err() {
                issues.errors.push(format!(
                    "Cannot create log directory: {}",
                    log_dir.display()
                ));
            }
        }

        issues
    }
}

/// Candidate interpretations of a textual value, most specific first
fn interpret_value(value: &str) -> Vec<Value> {
    let mut candidates = Vec::new();
    let lower = value.trim().to_lowercase();

    if lower == "none" || lower == "null" {
        candidates.push(Value::Null);
    }
    if let Ok(b) = lower.parse::<bool>() {
        candidates.push(Value::Bool(b));
    }
    if let Ok(n) = value.trim().parse::<i64>() {
        candidates.push(Value::from(n));
    } else if let Ok(f) = value.trim().parse::<f64>() {
        candidates.push(Value::from(f));
    }
    candidates.push(Value::String(value.to_string()));

    candidates
}

/// Location of the configuration file and the operations on it
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.ytmigrator/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| miette!("Could not find the home directory"))?;
        Ok(home.join(".ytmigrator").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the effective settings: file values overridden by the environment.
    ///
    /// The file is created with the default values if it does not exist.
    pub fn load(&self) -> Result<Settings> {
        self.ensure_exists()?;

        config::Config::builder()
            .add_source(config::File::from(self.path.as_path()).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read configuration {}", self.path.display()))?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid configuration")
    }

    /// Settings as written in the file, without environment overrides
    pub fn read_file(&self) -> Result<Settings> {
        self.ensure_exists()?;

        let content = std::fs::read_to_string(&self.path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not read configuration {}", self.path.display()))?;
        toml::from_str(&content)
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid configuration file {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let content = toml::to_string_pretty(settings)
            .into_diagnostic()
            .wrap_err("Could not serialize configuration")?;
        write_bytes_atomic(&self.path, content.as_bytes())
            .wrap_err_with(|| format!("Could not write configuration {}", self.path.display()))?;

        debug!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Set a single value. Nothing is written if the value is rejected.
    pub fn set(&self, section: &str, key: &str, value: &str) -> Result<Settings> {
        let settings = self.read_file()?.with_value(section, key, value)?;
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn reset(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.save(&settings)?;
        info!("Configuration reset to defaults");
        Ok(settings)
    }

    pub fn export(&self, dest: &Path) -> Result<()> {
        let settings = self.read_file()?;
        write_json_atomic(dest, &settings)
            .wrap_err_with(|| format!("Could not export configuration to {}", dest.display()))
    }

    /// Replace the configuration with the one exported in `src`
    pub fn import(&self, src: &Path) -> Result<Settings> {
        let settings: Settings =
            read_json(src).wrap_err_with(|| format!("Could not import {}", src.display()))?;
        self.save(&settings)?;
        Ok(settings)
    }

    fn ensure_exists(&self) -> Result<()> {
        if !self.path.exists() {
            info!("Creating default configuration at {}", self.path.display());
            self.save(&Settings::default())?;
        }
        Ok(())
    }
}
