// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Separator between process identifiers in the streaming clients property
pub const STREAMING_CLIENTS_SEPARATOR: &str = ",";

/// Separator between bulk-pushed messages in the log property
pub const LOG_MESSAGES_SEPARATOR: &str = "\n";

/// Interval at which a request waits for the single request slot to free up
pub const REQUEST_SLOT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Number of attempts to resolve the device handle while installing
pub const DEVICE_RETRIEVAL_ATTEMPTS: u32 = 10;

/// Delay between two device handle resolution attempts
pub const DEVICE_RETRIEVAL_INTERVAL: Duration = Duration::from_millis(500);

/// Window in which the system approval dialog is expected to take focus
pub const NOTIFICATION_WATCHDOG_WINDOW: Duration = Duration::from_secs(2);

/// Interval within which a noisy driver log message is emitted at most once
pub const LOG_THROTTLE_INTERVAL: Duration = Duration::from_secs(60);

/// Substring identifying the noisy driver log message
pub const THROTTLED_LOG_MESSAGE: &str = "buffer retries failed";

/// Name reported for streaming clients whose process cannot be resolved
pub const UNRESOLVED_APPLICATION_NAME: &str = "An application";

/// Capacity of the simulated driver buffer queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 30;

/// `tracing` target under which driver log messages are re-emitted
pub const EXTENSION_LOG_TARGET: &str = "camera_extension";

/// Platform status codes used where the platform has no code of its own
pub mod status {
    use crate::errors::StatusCode;

    /// Success
    pub const NO_ERR: StatusCode = 0;
    /// A parameter was invalid (e.g. frame does not match the format)
    pub const INVALID_PARAMETER: StatusCode = -12780;
    /// The queue is full
    pub const QUEUE_FULL: StatusCode = -12764;
    /// The queue has been invalidated
    pub const QUEUE_INVALIDATED: StatusCode = -12785;
    /// The stream's queue is already owned by another producer
    pub const QUEUE_BUSY: StatusCode = -12786;
    /// The object does not exist (anymore)
    pub const BAD_OBJECT: StatusCode = -67_000;
    /// Request failure due to missing user authorization
    pub const AUTHORIZATION_REQUIRED: StatusCode = 13;
}
