// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the virtual camera host
//!
//! Every error is `Clone + PartialEq` so it can travel inside
//! [`ExtensionState::Error`] and be handed to several waiters of the same
//! single-flight request.

use crate::backends::extension::ExtensionState;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Raw status code reported by the platform (an `OSStatus` on systems that have one)
pub type StatusCode = i32;

/// Property listener errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// The platform refused to register the change callback
    #[error("Failed registering property listener: {0}")]
    RegistrationFailed(StatusCode),
    /// There is no async runtime to deliver decoded values on
    #[error("No runtime available to deliver property changes")]
    NoRuntime,
}

/// Errors raised while connecting to, or feeding, the driver's sink stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// No device with the configured UUID is published
    #[error("Cannot find camera device {0}")]
    DeviceNotFound(Uuid),
    /// The device does not publish a stream with this name
    #[error("Failed retrieving stream {0}")]
    StreamNotFound(String),
    /// Copying the sink stream's buffer queue failed
    #[error("Failed copying buffer queue: {0}")]
    QueueUnavailable(StatusCode),
    /// Starting the sink stream failed
    #[error("Failed starting stream: {0}")]
    StreamStartFailed(StatusCode),
    /// A frame could not be packaged or pushed onto the queue
    #[error("Failed enqueuing frame: {0}")]
    EnqueueFailed(StatusCode),
    /// No connector is currently attached
    #[error("Virtual camera is not connected")]
    NotConnected,
}

/// Errors of the extension lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    /// The requested operation is not allowed in the current state
    #[error("Request cannot be submitted in current state: {0}")]
    RequestUnavailableInState(Box<ExtensionState>),
    /// A callback arrived that matches no known request
    #[error("Request update is inconsistent")]
    InconsistentUpdate,
    /// A callback arrived for a request other than the pending one
    #[error("Request update is inconsistent, but deemed non-critical")]
    NonCriticalInconsistentUpdate,
    /// The system reported a state that cannot be mapped
    #[error("State is unknown")]
    UnknownState,
    /// A request finished with a state that makes no sense for its kind
    #[error("Unexpected camera extension state: {0}")]
    UnexpectedState(Box<ExtensionState>),
    /// The system rejected the request
    #[error("Extension request failed ({code}): {message}")]
    RequestFailed { code: StatusCode, message: String },
    /// The user declined to authorize the request
    #[error("Request requires user authorization")]
    AuthorizationRequired,
    /// The request was abandoned because the manager shut down
    #[error("Request was canceled")]
    Canceled,
    /// Subscribing to state change notifications failed
    #[error("Failed observing extension state: {0}")]
    ObservationFailed(String),
    /// Attaching to the installed camera device failed
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

impl ExtensionError {
    /// Whether this error only warrants a log line
    pub fn is_non_critical(&self) -> bool {
        matches!(self, ExtensionError::NonCriticalInconsistentUpdate)
    }
}

/// Capture permission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The authorization request itself failed
    #[error("Authorization request failed: {0}")]
    RequestFailed(String),
    /// The settings surface could not be opened
    #[error("Failed opening system settings: {0}")]
    SettingsUnavailable(String),
}

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed reading configuration: {0}")]
    Io(String),
    /// The configuration file is not valid JSON
    #[error("Invalid configuration: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Main application error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),
    #[error("Camera error: {0}")]
    Connector(#[from] ConnectorError),
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The device manager task is gone
    #[error("Device manager is not running")]
    ManagerStopped,
    #[error("{0}")]
    Other(String),
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
