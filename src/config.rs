use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::annotation::store::DEFAULT_REMOVAL_DELAY;
use crate::note::client::DEFAULT_ENDPOINT;
use crate::note::prompt::DEFAULT_LEARNER;
use crate::note::NoteSettings;

pub const DEFAULT_THEME: &str = "lectern-paper";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Lesson opened when no path is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default = "default_theme_name")]
    pub theme: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `tracing` filter directive; `LECTERN_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_min_display_ms")]
    pub min_display_ms: u64,
    #[serde(default = "default_typewriter_ms")]
    pub typewriter_ms: u64,
    #[serde(default = "default_bullet_delay_ms")]
    pub bullet_delay_ms: u64,
    #[serde(default = "default_removal_delay_ms")]
    pub removal_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Who notes are written for, as in "for an AWS learner".
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_theme_name() -> String { DEFAULT_THEME.to_string() }
fn default_endpoint() -> String { DEFAULT_ENDPOINT.to_string() }
fn default_request_timeout_secs() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_min_display_ms() -> u64 { 6500 }
fn default_typewriter_ms() -> u64 { 12 }
fn default_bullet_delay_ms() -> u64 { 200 }
fn default_removal_delay_ms() -> u64 { DEFAULT_REMOVAL_DELAY.as_millis() as u64 }
fn default_audience() -> String { DEFAULT_LEARNER.to_string() }

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_display_ms: default_min_display_ms(),
            typewriter_ms: default_typewriter_ms(),
            bullet_delay_ms: default_bullet_delay_ms(),
            removal_delay_ms: default_removal_delay_ms(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { audience: default_audience() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document: None,
            theme: default_theme_name(),
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
            timing: TimingConfig::default(),
            prompt: PromptConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Load config, creating the config directory, the default theme and a
    /// default config file if they don't exist. Never overwrites existing
    /// files.
    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_in(&Self::config_dir())
    }

    pub fn load_or_create_in(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join("config.toml");
        let themes_dir = dir.join("themes");

        fs::create_dir_all(&themes_dir).map_err(|source| ConfigError::Write { path: themes_dir.clone(), source })?;

        let default_theme_path = themes_dir.join(format!("{DEFAULT_THEME}.toml"));
        if !default_theme_path.exists() {
            let default_theme_content = include_str!("../themes/lectern-paper.toml");
            fs::write(&default_theme_path, default_theme_content)
                .map_err(|source| ConfigError::Write { path: default_theme_path.clone(), source })?;
        }

        if !config_path.exists() {
            Self::default().save_to(&config_path)?;
        }
        Self::load_from(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("lectern")
    }
    pub fn config_path() -> PathBuf { Self::config_dir().join("config.toml") }
    pub fn themes_dir() -> PathBuf { Self::config_dir().join("themes") }
    pub fn log_path() -> PathBuf { Self::config_dir().join("lectern.log") }

    pub fn document_path(&self) -> Option<PathBuf> {
        self.document
            .as_deref()
            .map(|d| PathBuf::from(shellexpand::tilde(d).to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn removal_delay(&self) -> Duration {
        Duration::from_millis(self.timing.removal_delay_ms)
    }

    pub fn note_settings(&self) -> NoteSettings {
        NoteSettings {
            min_display: Duration::from_millis(self.timing.min_display_ms),
            char_interval: Duration::from_millis(self.timing.typewriter_ms),
            line_delay: Duration::from_millis(self.timing.bullet_delay_ms),
            learner: self.prompt.audience.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint, "http://localhost:4000/api/ask");
        assert_eq!(config.note_settings(), NoteSettings::default());
        assert_eq!(config.removal_delay(), Duration::from_millis(400));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            endpoint = "http://proxy.internal:8080/ask"

            [timing]
            min_display_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://proxy.internal:8080/ask");
        assert_eq!(config.timing.min_display_ms, 1000);
        assert_eq!(config.timing.typewriter_ms, 12);
        assert_eq!(config.prompt.audience, "AWS learner");
        assert_eq!(config.theme, DEFAULT_THEME);
    }

    #[test]
    fn test_load_or_create_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let created = Config::load_or_create_in(dir.path()).unwrap();
        assert_eq!(created, Config::default());
        assert!(dir.path().join("config.toml").exists());
        assert!(dir.path().join("themes").join("lectern-paper.toml").exists());

        fs::write(dir.path().join("config.toml"), "log_level = \"debug\"\n").unwrap();
        let reloaded = Config::load_or_create_in(dir.path()).unwrap();
        assert_eq!(reloaded.log_level, "debug");
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_document_path_expands_tilde() {
        let config = Config { document: Some("~/lessons/lex.txt".to_string()), ..Config::default() };
        let path = config.document_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("lessons/lex.txt"));
    }
}
