//! Configuration system for cryptdev
//!
//! Supports TOML configuration files with sensible defaults.
//! Configuration is loaded from:
//! - macOS: ~/Library/Application Support/cryptdev/config.toml
//! - Linux: ~/.config/cryptdev/config.toml

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::Shift;
use crate::{DEFAULT_BUFFER_CAPACITY, DEFAULT_DEVICE_NAME, DEFAULT_READ_CHUNK_SIZE};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device session settings
    pub device: DeviceConfig,
    /// Device file mount settings
    pub mount: MountConfig,
    /// Command-line application settings
    pub client: ClientConfig,
}

/// Device session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Shift applied on attach
    pub default_shift: Shift,
    /// Session buffer size in bytes; also the largest accepted command
    pub buffer_capacity: usize,
    /// File name of the device inside the mount
    pub name: String,
    /// Keep the last shift across detach/attach instead of resetting it
    pub retain_shift_on_reattach: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            default_shift: Shift::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            name: DEFAULT_DEVICE_NAME.to_string(),
            retain_shift_on_reattach: false,
        }
    }
}

/// Mount configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Mount point (uses a temp directory if None)
    pub mount_point: Option<PathBuf>,
    /// Filesystem name shown in mount tables
    pub fs_name: String,
    /// Allow other users to open the device
    pub allow_other: bool,
    /// Unmount automatically when the process exits
    pub auto_unmount: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            mount_point: None,
            fs_name: "cryptdev".to_string(),
            allow_other: false,
            auto_unmount: true,
        }
    }
}

/// Command-line application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Device path (derived from the mount settings if None)
    pub device_path: Option<PathBuf>,
    /// Bytes requested per read from the device
    pub read_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_path: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => {
                debug!("No config directory found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "device.buffer_capacity must be non-zero".into(),
            ));
        }
        if self.device.name.is_empty() || self.device.name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "device.name {:?} is not a valid file name",
                self.device.name
            )));
        }
        if self.client.read_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "client.read_chunk_size must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "cryptdev", "cryptdev")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the effective mount point (config override or temp directory)
    pub fn mount_point(&self) -> PathBuf {
        self.mount
            .mount_point
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cryptdev"))
    }

    /// Get the effective device path (config override or mount point + name)
    pub fn device_path(&self) -> PathBuf {
        self.client
            .device_path
            .clone()
            .unwrap_or_else(|| self.mount_point().join(&self.device.name))
    }

    /// Path of the status file next to the device
    pub fn status_path(&self) -> PathBuf {
        self.device_path().with_file_name(crate::STATUS_FILE_NAME)
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// I/O error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// Value out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialization error: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.default_shift.value(), 13);
        assert_eq!(config.device.buffer_capacity, 64 * 1024);
        assert_eq!(config.client.read_chunk_size, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.device.default_shift, config.device.default_shift);
        assert_eq!(parsed.device.name, config.device.name);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [device]
            default_shift = 5
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.default_shift.value(), 5);
        // Other values should be defaults
        assert_eq!(config.device.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert!(config.mount.auto_unmount);
    }

    #[test]
    fn test_out_of_range_shift_rejected() {
        let toml_str = r#"
            [device]
            default_shift = 26
        "#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.device.name = "a/b".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.device.buffer_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.client.read_chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_derived_paths() {
        let mut config = Config::default();
        config.mount.mount_point = Some(PathBuf::from("/mnt/crypt"));
        assert_eq!(config.device_path(), PathBuf::from("/mnt/crypt/crypto0"));
        assert_eq!(config.status_path(), PathBuf::from("/mnt/crypt/status"));

        config.client.device_path = Some(PathBuf::from("/dev/usb/crypto1"));
        assert_eq!(config.device_path(), PathBuf::from("/dev/usb/crypto1"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.device.default_shift = Shift::new(3).unwrap();
        config.device.retain_shift_on_reattach = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.device.default_shift.value(), 3);
        assert!(loaded.device.retain_shift_on_reattach);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\nread_chunk_size = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_sample_config() {
        let sample = Config::sample();
        assert!(sample.contains("[device]"));
        assert!(sample.contains("[mount]"));
        assert!(sample.contains("[client]"));
    }

    #[test]
    fn test_config_load_missing() {
        let config = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.device.default_shift.value(), 13);
    }
}
