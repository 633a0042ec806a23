// SPDX-License-Identifier: GPL-3.0-only

//! User and deployment configuration
//!
//! Stored as JSON under the user's configuration directory. Every field has a
//! default so partial files are fine.

use crate::backends::virtual_camera::DeviceConnectorConfiguration;
use crate::constants;
use crate::errors::ConfigError;
use crate::platform::{BundleVersion, VideoCodec, VideoFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// How extension state changes made outside this process are noticed
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationMode {
    /// Push when the registry supports it, foreground diffing otherwise
    #[default]
    Auto,
    /// Always subscribe to registry push notifications
    Push,
    /// Always compare state across application background/foreground switches
    Foreground,
}

/// Description of the virtual camera device published by the extension
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// UUID under which the extension publishes its device
    pub device_uuid: Uuid,
    /// Stream frames are delivered to consumers on
    pub source_stream_name: String,
    /// Stream the producer pushes frames into
    pub sink_stream_name: String,
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_uuid: Uuid::from_u128(0x5a2c_4e1f_8b7d_4c3a_9e6f_1d2b_3c4d_5e6f),
            source_stream_name: "app.vcam.camera.source".to_string(),
            sink_stream_name: "app.vcam.camera.sink".to_string(),
            width: 1280,
            height: 720,
            codec: VideoCodec::Nv12,
            frame_rate: 30,
        }
    }
}

/// Bounded retry policy for resolving the device handle while installing
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl RetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: constants::DEVICE_RETRIEVAL_ATTEMPTS,
            interval_ms: constants::DEVICE_RETRIEVAL_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bundle identifier of the camera extension
    pub extension_identifier: String,
    /// Version of the extension bundled with this host
    pub bundled_version: BundleVersion,
    /// Product name used in menu titles
    pub product_name: String,
    pub camera: CameraConfig,
    pub device_retry: RetryConfig,
    /// Poll interval while waiting for the single request slot
    pub request_poll_interval_ms: u64,
    /// Window in which the approval dialog is expected to appear
    pub watchdog_window_ms: u64,
    /// Interval within which the noisy driver log message is emitted once
    pub log_throttle_secs: u64,
    pub observation: ObservationMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension_identifier: "app.vcam.host.camera-extension".to_string(),
            bundled_version: BundleVersion::parse(env!("CARGO_PKG_VERSION")),
            product_name: "Virtual Camera".to_string(),
            camera: CameraConfig::default(),
            device_retry: RetryConfig::default(),
            request_poll_interval_ms: constants::REQUEST_SLOT_POLL_INTERVAL.as_millis() as u64,
            watchdog_window_ms: constants::NOTIFICATION_WATCHDOG_WINDOW.as_millis() as u64,
            log_throttle_secs: constants::LOG_THROTTLE_INTERVAL.as_secs(),
            observation: ObservationMode::default(),
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vcam-host").join("config.json"))
    }

    /// Load the configuration from `path`, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn video_format(&self) -> VideoFormat {
        VideoFormat {
            codec: self.camera.codec,
            width: self.camera.width,
            height: self.camera.height,
        }
    }

    /// The immutable connector configuration derived from this configuration
    pub fn device_connector_configuration(&self) -> DeviceConnectorConfiguration {
        DeviceConnectorConfiguration::new(
            self.camera.device_uuid,
            &self.camera.source_stream_name,
            &self.camera.sink_stream_name,
            self.video_format(),
        )
    }

    pub fn request_poll_interval(&self) -> Duration {
        Duration::from_millis(self.request_poll_interval_ms.max(1))
    }

    pub fn watchdog_window(&self) -> Duration {
        Duration::from_millis(self.watchdog_window_ms)
    }

    pub fn log_throttle_interval(&self) -> Duration {
        Duration::from_secs(self.log_throttle_secs)
    }
}
