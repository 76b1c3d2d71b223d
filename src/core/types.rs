use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub device: String,
    /// Line speed; the controller only talks 19200
    pub baud_rate: u32,
    /// Bounded wait for a single read
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: super::DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Retry budget of a single polled measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// How many times the request is sent before giving up
    pub max_sends: u32,
    /// Frames scanned for a matching answer after each send
    pub frames_per_send: u32,
    /// Pause between two send attempts
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub retry_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            max_sends: 3,
            frames_per_send: 10,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Cadences of the stats scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Solar and house current
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub fast_interval: Duration,
    /// Capacity and voltages
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub slow_interval: Duration,
    /// How often a water collection window is opened
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub water_interval: Duration,
    /// Length of a water collection window
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub water_window: Duration,
    /// Period of the keep-alive requests inside a window
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub water_keepalive: Duration,
    /// Maximum time without a valid frame before the process gives up
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub watchdog_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            fast_interval: Duration::from_secs(10),
            slow_interval: Duration::from_secs(600),
            water_interval: Duration::from_secs(3600),
            water_window: Duration::from_secs(30),
            water_keepalive: Duration::from_secs(5),
            watchdog_timeout: Duration::from_secs(30),
        }
    }
}

/// Remote time-series feed the batches are forwarded to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Feed identifier
    pub feed_id: String,
    /// API key sent with every request
    pub api_key: String,
    /// Service root, without trailing slash
    #[serde(default = "default_upload_base_url")]
    pub base_url: String,
}

fn default_upload_base_url() -> String {
    super::DEFAULT_UPLOAD_BASE_URL.to_string()
}

/// Configuration for the bus client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line
    pub serial: SerialConfig,
    /// Polling retry budget
    pub poll: PollConfig,
    /// Scheduler cadences
    pub schedule: ScheduleConfig,
    /// Upload target, if any
    pub upload: Option<UploadConfig>,
}

impl Config {
    /// Parses a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Checks that the settings describe a schedule that can actually run
    pub fn validate(&self) -> Result<()> {
        if self.serial.device.is_empty() {
            return Err(Error::config("Serial device must not be empty"));
        }
        if self.serial.read_timeout.is_zero() {
            return Err(Error::config("Read timeout must be positive"));
        }
        if self.poll.max_sends == 0 {
            return Err(Error::config("max_sends must be at least 1"));
        }
        if self.poll.frames_per_send == 0 {
            return Err(Error::config("frames_per_send must be at least 1"));
        }

        let s = &self.schedule;
        for (name, value) in [
            ("fast_interval", s.fast_interval),
            ("slow_interval", s.slow_interval),
            ("water_interval", s.water_interval),
            ("water_window", s.water_window),
            ("water_keepalive", s.water_keepalive),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{} must be positive", name)));
            }
        }
        if s.water_keepalive >= s.water_window {
            return Err(Error::config("water_keepalive must be shorter than water_window"));
        }
        if s.watchdog_timeout < self.serial.read_timeout {
            return Err(Error::config("watchdog_timeout must not be shorter than read_timeout"));
        }

        if let Some(upload) = &self.upload {
            if upload.feed_id.is_empty() || upload.api_key.is_empty() {
                return Err(Error::config("Upload needs both feed_id and api_key"));
            }
        }

        Ok(())
    }
}
