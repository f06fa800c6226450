//! Configuration for an equalizer session
//!
//! This module provides:
//! - `EqConfig`, the TOML-backed settings for analysis, queues, polling and
//!   the audio format used by offline sessions
//! - `FftOrder`, the supported transform sizes
//! - Async load/save through `tokio::fs`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Transform size of the spectrum analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum FftOrder {
    #[default]
    Order2048,
    Order4096,
    Order8192,
}

impl FftOrder {
    pub const ALL: [FftOrder; 3] = [FftOrder::Order2048, FftOrder::Order4096, FftOrder::Order8192];

    /// Base-2 exponent of the transform size
    pub fn exponent(self) -> u32 {
        match self {
            FftOrder::Order2048 => 11,
            FftOrder::Order4096 => 12,
            FftOrder::Order8192 => 13,
        }
    }

    /// Number of samples per transform
    pub fn size(self) -> usize {
        1 << self.exponent()
    }

    /// Number of magnitude bins produced, `size / 2`
    pub fn bins(self) -> usize {
        self.size() / 2
    }
}

impl TryFrom<usize> for FftOrder {
    type Error = ConfigError;

    fn try_from(size: usize) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|order| order.size() == size)
            .ok_or_else(|| ConfigError::Invalid(format!("unsupported FFT size {size}")))
    }
}

impl From<FftOrder> for usize {
    fn from(order: FftOrder) -> usize {
        order.size()
    }
}

impl fmt::Display for FftOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.size())
    }
}

/// Spectrum analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Transform size (2048, 4096 or 8192)
    pub fft_order: FftOrder,

    /// Decibel floor applied to every magnitude bin
    pub negative_infinity_db: f32,

    /// Bin step used when building the display path
    pub path_resolution: usize,

    /// Whether the polling context produces spectrum paths at all
    pub enabled: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_order: FftOrder::Order2048,
            negative_infinity_db: -48.0,
            path_resolution: 2,
            enabled: true,
        }
    }
}

/// Cross-thread queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Slots per queue
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Polling ticks per second
    pub rate_hz: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { rate_hz: 60 }
    }
}

/// Audio format used when preparing a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,

    /// Samples per accumulated analysis block
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
        }
    }
}

/// Vertical range of the response curve display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            min_db: -24.0,
            max_db: 24.0,
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    pub analyzer: AnalyzerConfig,
    pub queues: QueueConfig,
    pub polling: PollingConfig,
    pub audio: AudioConfig,
    pub response: ResponseConfig,
}

impl EqConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Load from `path`, falling back to defaults
    ///
    /// A missing file yields the defaults. A corrupt or invalid file is
    /// backed up next to itself with a `.corrupt` suffix and the defaults are
    /// returned.
    #[instrument(skip(path))]
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Self::default();
        }

        match Self::load_from_file(path).await {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load config, using defaults");

                let backup_path = path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }
                Self::default()
            }
        }
    }

    /// Reject values no session can be prepared with
    pub fn validate(&self) -> Result<()> {
        if self.queues.capacity == 0 {
            return Err(ConfigError::Invalid("queue capacity must be at least 1".to_string()));
        }
        if self.polling.rate_hz == 0 {
            return Err(ConfigError::Invalid("polling rate must be at least 1 Hz".to_string()));
        }
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample rate must be positive".to_string()));
        }
        if self.audio.block_size == 0 {
            return Err(ConfigError::Invalid("block size must be positive".to_string()));
        }
        if self.analyzer.path_resolution == 0 {
            return Err(ConfigError::Invalid("path resolution must be at least 1".to_string()));
        }
        if !(self.analyzer.negative_infinity_db < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "negative infinity floor must be below 0 dB, got {}",
                self.analyzer.negative_infinity_db
            )));
        }
        if !(self.response.min_db < self.response.max_db) {
            return Err(ConfigError::Invalid(format!(
                "response range is empty: {}..{} dB",
                self.response.min_db, self.response.max_db
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let config = EqConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("fft_order = 2048"));

        let parsed: EqConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: EqConfig = toml::from_str("[analyzer]\nfft_order = 8192\n").unwrap();
        assert_eq!(parsed.analyzer.fft_order, FftOrder::Order8192);
        assert_eq!(parsed.analyzer.negative_infinity_db, -48.0);
        assert_eq!(parsed.queues.capacity, 30);
        assert_eq!(parsed.polling.rate_hz, 60);
    }

    #[test]
    fn test_unsupported_fft_size_rejected() {
        assert!(toml::from_str::<EqConfig>("[analyzer]\nfft_order = 1000\n").is_err());
        assert!(FftOrder::try_from(1024).is_err());
        assert_eq!(FftOrder::try_from(4096).unwrap(), FftOrder::Order4096);
    }

    #[test]
    fn test_fft_order_sizes() {
        assert_eq!(FftOrder::Order2048.size(), 2048);
        assert_eq!(FftOrder::Order4096.bins(), 2048);
        assert_eq!(FftOrder::Order8192.exponent(), 13);
        assert_eq!(FftOrder::Order8192.to_string(), "8192");
    }

    #[test]
    fn test_validate() {
        assert!(EqConfig::default().validate().is_ok());

        let mut config = EqConfig::default();
        config.queues.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = EqConfig::default();
        config.polling.rate_hz = 0;
        assert!(config.validate().is_err());

        let mut config = EqConfig::default();
        config.analyzer.negative_infinity_db = 0.0;
        assert!(config.validate().is_err());

        let mut config = EqConfig::default();
        config.response.min_db = 24.0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("pareq.toml");

        let mut config = EqConfig::default();
        config.analyzer.fft_order = FftOrder::Order4096;
        config.audio.sample_rate = 44100;
        config.save_to_file(&config_path).await.unwrap();

        assert!(config_path.exists());

        let loaded = EqConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("pareq.toml");
        fs::write(&config_path, "[queues]\ncapacity = 0\n").await.unwrap();

        let result = EqConfig::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_load_or_default_backs_up_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("pareq.toml");

        let missing = EqConfig::load_or_default(&config_path).await;
        assert_eq!(missing, EqConfig::default());

        fs::write(&config_path, "this is not toml [[[").await.unwrap();
        let loaded = EqConfig::load_or_default(&config_path).await;

        assert_eq!(loaded, EqConfig::default());
        assert!(temp_dir.path().join("pareq.toml.corrupt").exists());
    }
}
