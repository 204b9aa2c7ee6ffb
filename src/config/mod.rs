//! Typed configuration from environment variables and an optional TOML file.
//!
//! Loads once at startup. Values from the environment override the file,
//! which overrides the built-in defaults. Unknown clear policies or an
//! unreadable config file fail fast.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::announce::{VoiceOption, VoiceSettings};
use crate::error::{Error, Result};
use crate::export::DEFAULT_EXPORT_PREFIX;
use crate::model::ClearPolicy;

/// Directory used for the durable slots when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "queue-data";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the durable slots.
    pub data_dir: PathBuf,
    /// Scope of `clear_queue`. Chosen once here for every caller.
    pub clear_policy: ClearPolicy,
    /// Directory export files are written to.
    pub export_dir: PathBuf,
    /// Prefix of export file names.
    pub export_prefix: String,
    pub voice: VoiceSettings,
    /// Voices the announcer may choose from.
    pub voices: Vec<VoiceOption>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            clear_policy: ClearPolicy::default(),
            export_dir: PathBuf::from("."),
            export_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            voice: VoiceSettings::default(),
            voices: Vec::new(),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

/// On-disk shape of the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    clear_policy: Option<ClearPolicy>,
    export_dir: Option<PathBuf>,
    export_prefix: Option<String>,
    log_level: Option<String>,
    otel_endpoint: Option<String>,
    voice: Option<VoiceSettings>,
    voices: Vec<VoiceOption>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// `QUEUE_CONFIG` names an optional TOML file read first.
    pub fn from_env() -> Result<Self> {
        let mut config = match optional_var("QUEUE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load a TOML file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))
    }

    /// Parse TOML on top of the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        let mut config = Self::default();
        if let Some(dir) = file.data_dir {
            config.data_dir = dir;
        }
        if let Some(policy) = file.clear_policy {
            config.clear_policy = policy;
        }
        if let Some(dir) = file.export_dir {
            config.export_dir = dir;
        }
        if let Some(prefix) = file.export_prefix {
            config.export_prefix = prefix;
        }
        if let Some(level) = file.log_level {
            config.log_level = level;
        }
        config.otel_endpoint = file.otel_endpoint;
        if let Some(voice) = file.voice {
            config.voice = voice.clamped();
        }
        config.voices = file.voices;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = optional_var("QUEUE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(policy) = optional_var("QUEUE_CLEAR_POLICY") {
            self.clear_policy = policy.parse()?;
        }
        if let Some(dir) = optional_var("QUEUE_EXPORT_DIR") {
            self.export_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = optional_var("QUEUE_EXPORT_PREFIX") {
            self.export_prefix = prefix;
        }
        if let Some(endpoint) = optional_var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        if let Some(level) = optional_var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }
}

/// A set, non-blank environment variable.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
