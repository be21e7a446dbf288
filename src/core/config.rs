//! Configuration module for the device monitor
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\droid_monitor\config.toml
//! - Linux: ~/.config/droid_monitor/config.toml
//! - macOS: ~/Library/Application Support/droid_monitor/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config directory
const APP_NAME: &str = "droid_monitor";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Local override file checked before the standard location
const LOCAL_CONFIG_FILE: &str = "./droid_monitor.toml";

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Open the configuration file in the default application.
pub fn open_config_in_editor() -> Result<PathBuf, ConfigError> {
    let config_path = init_config()?;

    open::that(&config_path)
        .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Locations of the helper binaries
    pub tools: ToolsConfig,

    /// Polling behaviour
    pub monitor: MonitorSettings,

    /// Per-command timeouts
    pub timeouts: TimeoutConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Helper binary configuration
///
/// Locating or installing the binaries is left to the user; bare names are
/// resolved through `PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the debug-bridge tool
    pub adb_path: PathBuf,

    /// Path to the bootloader tool
    pub fastboot_path: PathBuf,
}

/// Detection loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// How often to poll for device changes (in milliseconds)
    pub poll_interval_ms: u64,

    /// Probe different devices in parallel (each device's probes stay sequential)
    pub parallel_probes: bool,
}

/// Timeout configuration, all values in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Device listing commands
    pub listing_ms: u64,

    /// Single property / variable queries
    pub probe_ms: u64,

    /// Shell pipelines and vendor commands
    pub shell_ms: u64,

    /// Reboot commands
    pub reboot_ms: u64,

    /// Grace period after killing a timed-out process
    pub kill_grace_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            fastboot_path: PathBuf::from("fastboot"),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            parallel_probes: false,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            listing_ms: 3000,
            probe_ms: 5000,
            shell_ms: 15000,
            reboot_ms: 10000,
            kill_grace_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn listing(&self) -> Duration {
        Duration::from_millis(self.listing_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn shell(&self) -> Duration {
        Duration::from_millis(self.shell_ms)
    }

    pub fn reboot(&self) -> Duration {
        Duration::from_millis(self.reboot_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./droid_monitor.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_toml_str(&content).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the monitor spin or never time out
    pub fn validate(&self) -> Result<(), String> {
        if self.monitor.poll_interval_ms == 0 {
            return Err("monitor.poll_interval_ms must be greater than zero".to_string());
        }
        let t = &self.timeouts;
        if t.listing_ms == 0 || t.probe_ms == 0 || t.shell_ms == 0 || t.reboot_ms == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./droid_monitor.toml (current directory - for development/override)
    /// 2. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load(&local);
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return local;
        }

        get_config_path().unwrap_or(local)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML or values)
    ParseError(PathBuf, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
    /// Failed to open config file in editor
    OpenError(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), err)
            }
            ConfigError::ParseError(path, err) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), err)
            }
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), err)
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::OpenError(path, err) => {
                write!(f, "Failed to open config file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tools.adb_path, PathBuf::from("adb"));
        assert_eq!(config.tools.fastboot_path, PathBuf::from("fastboot"));
        assert_eq!(config.monitor.poll_interval_ms, 2000);
        assert!(!config.monitor.parallel_probes);
        assert_eq!(config.timeouts.listing(), Duration::from_secs(3));
        assert_eq!(config.timeouts.shell(), Duration::from_secs(15));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [tools]
            adb_path = "/opt/platform-tools/adb"

            [timeouts]
            probe_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.tools.adb_path, PathBuf::from("/opt/platform-tools/adb"));
        assert_eq!(config.tools.fastboot_path, PathBuf::from("fastboot"));
        assert_eq!(config.timeouts.probe_ms, 1500);
        assert_eq!(config.timeouts.listing_ms, 3000);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_toml_str("[monitor]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(err.contains("poll_interval_ms"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml_str(&Config::generate_default_config()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.monitor.poll_interval_ms = 750;
        config.monitor.parallel_probes = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[monitor\npoll_interval_ms = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_, _)));
        assert!(err.to_string().contains("bad.toml"));
    }
}
