/*
 * Application-wide settings: the extension allow-list, glob exclude patterns
 * and the change-detector tick period. Settings are stored as JSON in the
 * application's local configuration directory. Every field has a serde default,
 * so a partial or older file still loads, and a missing file means "use the
 * defaults".
 *
 * As elsewhere in the engine, access goes through a trait
 * (`ConfigManagerOperations`) so callers can be tested with other backends.
 */
use crate::core::models::{DEFAULT_EXTENSIONS, ExtensionFilter};
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "CodeCombiner";
const CONFIG_FILENAME: &str = "config.json";

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_poll_interval_ms() -> u64 {
    500
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            extensions: default_extensions(),
            exclude_patterns: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    pub fn extension_filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(self.extensions.iter().map(String::as_str))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /*
     * Applies command line overrides for one run. Empty override lists leave
     * the stored values in place.
     */
    pub fn with_overrides(mut self, extensions: &[String], excludes: &[String]) -> Self {
        if !extensions.is_empty() {
            self.extensions = extensions.to_vec();
        }
        if !excludes.is_empty() {
            self.exclude_patterns = excludes.to_vec();
        }
        self
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoProjectDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration format error: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine project directory for configuration")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            ConfigError::NoProjectDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<AppConfig>;
    fn save_config(&self, app_name: &str, config: &AppConfig) -> Result<()>;
}

pub struct CoreConfigManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    /// Reads and writes below `dir` instead of the per-user config directory.
    #[cfg(test)]
    pub fn with_config_dir(dir: PathBuf) -> Self {
        CoreConfigManager {
            config_dir_override: Some(dir),
        }
    }

    fn config_file_path(&self, app_name: &str) -> Result<PathBuf> {
        let dir = match &self.config_dir_override {
            Some(dir) => dir.clone(),
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoProjectDirectory)?,
        };
        Ok(dir.join(CONFIG_FILENAME))
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_config(&self, app_name: &str) -> Result<AppConfig> {
        let file_path = self.config_file_path(app_name)?;
        if !file_path.exists() {
            log::debug!("CoreConfigManager: {file_path:?} does not exist, using defaults.");
            return Ok(AppConfig::default());
        }
        let reader = BufReader::new(File::open(&file_path)?);
        let config: AppConfig = serde_json::from_reader(reader)?;
        log::debug!("CoreConfigManager: Loaded configuration from {file_path:?}.");
        Ok(config)
    }

    fn save_config(&self, app_name: &str, config: &AppConfig) -> Result<()> {
        let file_path = self.config_file_path(app_name)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&file_path)?);
        serde_json::to_writer_pretty(writer, config)?;
        log::debug!("CoreConfigManager: Saved configuration to {file_path:?}.");
        Ok(())
    }
}
