//! Daemon Configuration
//!
//! Configuration management for the COSMIC Remote front end.

use anyhow::{Context, Result};
use cosmic_remote_protocol::{
    HistoryConfig, QualityPreset, StreamingConfig, TransferConfig, DEFAULT_NETWORK_PORT,
    MAX_RECENT_CONNECTIONS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration inside the config directory
pub const CONFIG_FILE_NAME: &str = "remote.toml";

/// Front end configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Recent-connection history
    #[serde(default)]
    pub history: HistorySection,

    /// Transfer tracking and simulated transfer speed
    #[serde(default)]
    pub transfer: TransferSection,

    /// Screen streaming
    #[serde(default)]
    pub streaming: StreamingSection,

    /// Storage paths
    #[serde(default)]
    pub paths: PathConfig,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Port used for network connects when none is given
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Simulated network connect time in milliseconds
    #[serde(default = "default_network_delay")]
    pub network_delay_ms: u64,

    /// Simulated USB connect time in milliseconds
    #[serde(default = "default_wired_delay")]
    pub wired_delay_ms: u64,

    /// Simulated Bluetooth connect time in milliseconds
    #[serde(default = "default_network_delay")]
    pub short_range_delay_ms: u64,

    /// Simulated Bluetooth scan time in milliseconds
    #[serde(default = "default_scan_delay")]
    pub scan_delay_ms: u64,
}

/// History configuration (serialization wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySection {
    /// Maximum number of remembered connections (at most 10)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Write history to disk
    #[serde(default = "default_true")]
    pub persist: bool,
}

/// Transfer configuration (serialization wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSection {
    /// How long finished transfers stay visible, in milliseconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Interval between simulated progress steps, in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Progress per step for uploads and downloads
    #[serde(default = "default_transfer_step")]
    pub transfer_step: f64,

    /// Progress per step for archive creation
    #[serde(default = "default_compress_step")]
    pub compress_step: f64,

    /// Simulated directory listing time in milliseconds
    #[serde(default = "default_listing_delay")]
    pub listing_delay_ms: u64,
}

/// Streaming configuration (serialization wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSection {
    /// Data usage tick in milliseconds
    #[serde(default = "default_data_usage_interval")]
    pub data_usage_interval_ms: u64,

    /// Frame rate and latency resampling interval in milliseconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_ms: u64,

    /// Pause between stop and start on reset, in milliseconds
    #[serde(default = "default_reset_delay")]
    pub reset_delay_ms: u64,

    /// Quality preset at startup
    #[serde(default)]
    pub default_quality: QualityPreset,

    /// Audio volume at startup (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub default_volume: f64,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Configuration directory
    pub config_dir: PathBuf,

    /// Data directory (history, downloads)
    pub data_dir: PathBuf,
}

fn default_port() -> u16 {
    DEFAULT_NETWORK_PORT
}

fn default_network_delay() -> u64 {
    1500
}

fn default_wired_delay() -> u64 {
    1000
}

fn default_scan_delay() -> u64 {
    2000
}

fn default_max_entries() -> usize {
    MAX_RECENT_CONNECTIONS
}

fn default_true() -> bool {
    true
}

fn default_settle_delay() -> u64 {
    500
}

fn default_tick_interval() -> u64 {
    100
}

fn default_transfer_step() -> f64 {
    0.05
}

fn default_compress_step() -> f64 {
    0.02
}

fn default_listing_delay() -> u64 {
    500
}

fn default_data_usage_interval() -> u64 {
    1000
}

fn default_metrics_interval() -> u64 {
    5000
}

fn default_reset_delay() -> u64 {
    1000
}

fn default_volume() -> f64 {
    0.8
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_port: default_port(),
            network_delay_ms: default_network_delay(),
            wired_delay_ms: default_wired_delay(),
            short_range_delay_ms: default_network_delay(),
            scan_delay_ms: default_scan_delay(),
        }
    }
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            persist: default_true(),
        }
    }
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            tick_interval_ms: default_tick_interval(),
            transfer_step: default_transfer_step(),
            compress_step: default_compress_step(),
            listing_delay_ms: default_listing_delay(),
        }
    }
}

impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            data_usage_interval_ms: default_data_usage_interval(),
            metrics_interval_ms: default_metrics_interval(),
            reset_delay_ms: default_reset_delay(),
            default_quality: QualityPreset::default(),
            default_volume: default_volume(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("cosmic")
            .join("cosmic-remote");

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("cosmic")
            .join("cosmic-remote");

        Self {
            config_dir,
            data_dir,
        }
    }
}

impl From<&HistorySection> for HistoryConfig {
    fn from(section: &HistorySection) -> Self {
        Self {
            max_entries: section.max_entries,
            persist: section.persist,
        }
    }
}

impl From<&TransferSection> for TransferConfig {
    fn from(section: &TransferSection) -> Self {
        Self {
            settle_delay: Duration::from_millis(section.settle_delay_ms),
        }
    }
}

impl From<&StreamingSection> for StreamingConfig {
    fn from(section: &StreamingSection) -> Self {
        Self {
            data_usage_interval: Duration::from_millis(section.data_usage_interval_ms.max(1)),
            metrics_interval: Duration::from_millis(section.metrics_interval_ms.max(1)),
            reset_delay: Duration::from_millis(section.reset_delay_ms),
            default_quality: section.default_quality,
            default_volume: section.default_volume,
        }
    }
}

impl TransferSection {
    /// Interval between simulated progress steps
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Simulated directory listing time
    pub fn listing_delay(&self) -> Duration {
        Duration::from_millis(self.listing_delay_ms)
    }
}

impl ConnectionConfig {
    /// Simulated network connect time
    pub fn network_delay(&self) -> Duration {
        Duration::from_millis(self.network_delay_ms)
    }

    /// Simulated USB connect time
    pub fn wired_delay(&self) -> Duration {
        Duration::from_millis(self.wired_delay_ms)
    }

    /// Simulated Bluetooth connect time
    pub fn short_range_delay(&self) -> Duration {
        Duration::from_millis(self.short_range_delay_ms)
    }

    /// Simulated Bluetooth scan time
    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        PathConfig::default().config_dir.join(CONFIG_FILE_NAME)
    }

    /// Load configuration from the default location, creating it if not found
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from `path`, creating a default file if not found
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the config directory
    pub fn save(&self) -> Result<()> {
        self.save_to(self.paths.config_dir.join(CONFIG_FILE_NAME))
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values the managers cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.streaming.default_volume) {
            anyhow::bail!(
                "streaming.default_volume must be between 0.0 and 1.0, got {}",
                self.streaming.default_volume
            );
        }
        for (name, step) in [
            ("transfer.transfer_step", self.transfer.transfer_step),
            ("transfer.compress_step", self.transfer.compress_step),
        ] {
            if !(step > 0.0 && step <= 1.0) {
                anyhow::bail!("{} must be in (0.0, 1.0], got {}", name, step);
            }
        }
        Ok(())
    }

    /// File the connection history is stored in
    pub fn history_path(&self) -> PathBuf {
        self.paths.data_dir.join("recent_connections.json")
    }

    /// Directory downloads are written to
    pub fn download_dir(&self) -> PathBuf {
        self.paths.data_dir.join("downloads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.connection.default_port, 8080);
        assert_eq!(config.history.max_entries, 10);
        assert!(config.history.persist);
        assert_eq!(config.transfer.settle_delay_ms, 500);
        assert_eq!(config.streaming.default_quality, QualityPreset::Medium);
        assert!(config.paths.config_dir.ends_with("cosmic/cosmic-remote"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.connection.default_port, config.connection.default_port);
        assert_eq!(parsed.streaming.default_volume, config.streaming.default_volume);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [streaming]
            default_quality = "high"

            [history]
            max_entries = 5
            "#,
        )
        .unwrap();

        assert_eq!(parsed.streaming.default_quality, QualityPreset::High);
        assert_eq!(parsed.streaming.metrics_interval_ms, 5000);
        assert_eq!(parsed.history.max_entries, 5);
        assert!(parsed.history.persist);
        assert_eq!(parsed.transfer.tick_interval_ms, 100);
    }

    #[test]
    fn test_section_conversions() {
        let config = Config::default();

        let history: HistoryConfig = (&config.history).into();
        assert_eq!(history.capacity(), 10);

        let transfer: TransferConfig = (&config.transfer).into();
        assert_eq!(transfer.settle_delay, Duration::from_millis(500));

        let streaming: StreamingConfig = (&config.streaming).into();
        assert_eq!(streaming.data_usage_interval, Duration::from_secs(1));
        assert_eq!(streaming.metrics_interval, Duration::from_secs(5));
        assert_eq!(streaming.reset_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cosmic-remote").join(CONFIG_FILE_NAME);

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.connection.default_port, 8080);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.paths.data_dir, config.paths.data_dir);
    }

    #[test]
    fn test_invalid_volume_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[streaming]\ndefault_volume = 3.0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
