//! # Configuration Module
//!
//! Connection settings for mpdctl and where they live on disk.
//!
//! ## Sources, lowest precedence first
//!
//! 1. Built-in defaults ([`DEFAULT_HOST`], [`DEFAULT_PORT`], [`KEEPALIVE_INTERVAL`])
//! 2. `config.json` in the platform config directory:
//!    - Linux: `~/.config/mpdctl/config.json`
//!    - macOS: `~/Library/Application Support/mpdctl/config.json`
//!    - Windows: `%APPDATA%\mpdctl\config.json`
//! 3. Command-line flags / `MPD_HOST` and `MPD_PORT` environment variables
//!
//! A missing file is not an error; a malformed one is.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port MPD listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 6600;

pub const DEFAULT_HOST: &str = "localhost";

/// Time between keep-alive pings. MPD's default `connection_timeout` is 60s.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(55);

const CONFIG_FILE: &str = "config.json";

/// Returns the platform-appropriate config file path.
///
/// The `mpdctl` directory is not created; the file is optional.
///
/// # Errors
///
/// Returns an error if the system config directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!(
        "Could not determine system config directory. Please pass --config explicitly."
    ))?;

    Ok(config_dir.join("mpdctl").join(CONFIG_FILE))
}

/// Settings needed to open and supervise a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Seconds between keep-alive pings.
    pub keepalive_secs: u64,
    /// Passed through to `Connection::start_keep_alive`.
    pub keepalive_daemon: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keepalive_secs: KEEPALIVE_INTERVAL.as_secs(),
            keepalive_daemon: true,
        }
    }
}

impl ClientConfig {
    /// Load from the default location, or defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = get_config_path()?;
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config file: {}", path.display()))?;

        config.validate()
            .with_context(|| format!("Invalid settings in config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply command-line / environment overrides.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.host.trim().is_empty(), "host must not be empty");
        anyhow::ensure!(self.port != 0, "port must be between 1 and 65535");
        anyhow::ensure!(self.keepalive_secs > 0, "keepalive_secs must be at least 1");
        Ok(())
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6600);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(55));
        assert!(config.keepalive_daemon);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path_structure() -> Result<()> {
        let path = get_config_path()?;
        assert!(path.ends_with("mpdctl/config.json"));
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "host": "192.168.178.37" }"#)?;

        let config = ClientConfig::load_from(&path)?;
        assert_eq!(config.host, "192.168.178.37");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.keepalive_secs, 55);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("config.json");
        let config = ClientConfig {
            host: "music.lan".to_string(),
            port: 6601,
            keepalive_secs: 30,
            keepalive_daemon: false,
        };

        config.save_to(&path)?;
        assert_eq!(ClientConfig::load_from(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json")?;
        assert!(ClientConfig::load_from(&path).is_err());

        fs::write(&path, r#"{ "keepalive_secs": 0 }"#)?;
        assert!(ClientConfig::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_file_is_error_for_explicit_path() {
        assert!(ClientConfig::load_from(Path::new("/nonexistent/mpdctl/config.json")).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::default().with_overrides(Some("10.0.0.2".to_string()), None);
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.port, DEFAULT_PORT);

        let config = config.with_overrides(None, Some(6700));
        assert_eq!(config.port, 6700);
    }
}
