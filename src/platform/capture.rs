// SPDX-License-Identifier: GPL-3.0-only

//! Media device seam
//!
//! Models the device/stream/property/queue surface of the host's media
//! device layer, as far as a producer connection to the virtual camera needs
//! it.

use crate::errors::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Handle of a published media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Handle of a stream on a media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

/// Handle of a registered property listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// Observable string properties published by the driver's streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertySelector {
    /// Process identifiers of the clients pulling frames, joined by a separator
    StreamingClients,
    /// Bulk-pushed driver log messages, joined by a separator
    Log,
}

impl fmt::Display for PropertySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertySelector::StreamingClients => write!(f, "streaming-clients"),
            PropertySelector::Log => write!(f, "log"),
        }
    }
}

/// Called on a platform thread with the property's new value
pub type PropertyCallback = Box<dyn Fn(String) + Send + Sync>;

/// Called on a platform thread when the driver alters a stream's buffer queue
pub type QueueAlteredCallback = Arc<dyn Fn(StreamId) + Send + Sync>;

/// Video codecs the driver accepts on its sink stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// Semi-planar 4:2:0, video range
    #[default]
    Nv12,
    /// Packed 32-bit BGRA
    Bgra,
}

impl VideoCodec {
    /// Byte size of one frame with the given dimensions
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            VideoCodec::Nv12 => pixels * 3 / 2,
            VideoCodec::Bgra => pixels * 4,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoCodec::Nv12 => write!(f, "NV12"),
            VideoCodec::Bgra => write!(f, "BGRA"),
        }
    }
}

/// Negotiated format description of the sink stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoFormat {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
}

impl VideoFormat {
    pub fn frame_size(&self) -> usize {
        self.codec.frame_size(self.width, self.height)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.codec)
    }
}

/// A decoded video frame handed over by the capture pipeline
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub data: Arc<[u8]>,
}

impl VideoFrame {
    /// A frame filled with a single byte value
    pub fn filled(format: VideoFormat, value: u8) -> Self {
        Self {
            width: format.width,
            height: format.height,
            codec: format.codec,
            data: vec![value; format.frame_size()].into(),
        }
    }
}

/// A frame packaged for the driver queue
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub format: VideoFormat,
    /// Presentation time on the host clock
    pub presentation_time: Duration,
    pub frame: VideoFrame,
}

/// The driver-owned frame queue of a sink stream
///
/// Dropping the handle releases ownership of the queue.
pub trait BufferQueue: Send + Sync {
    fn enqueue(&self, sample: SampleBuffer) -> Result<(), StatusCode>;
}

/// Observable properties of platform objects
pub trait PropertySource: Send + Sync {
    fn read_property(
        &self,
        stream: StreamId,
        selector: PropertySelector,
    ) -> Result<String, StatusCode>;

    /// Register a change callback; it stays registered until removed
    fn add_property_listener(
        &self,
        stream: StreamId,
        selector: PropertySelector,
        callback: PropertyCallback,
    ) -> Result<ListenerToken, StatusCode>;

    fn remove_property_listener(&self, token: ListenerToken);
}

/// The host's media device layer
pub trait CaptureSystem: PropertySource {
    /// Resolve a device by its stable UUID
    fn device_id(&self, uuid: Uuid) -> Option<DeviceId>;

    /// Resolve a stream on `device` by its name
    fn stream_id(&self, device: DeviceId, name: &str) -> Option<StreamId>;

    /// Take ownership of a stream's buffer queue
    fn copy_buffer_queue(
        &self,
        stream: StreamId,
        altered: Option<QueueAlteredCallback>,
    ) -> Result<Box<dyn BufferQueue>, StatusCode>;

    fn start_stream(&self, device: DeviceId, stream: StreamId) -> Result<(), StatusCode>;

    fn stop_stream(&self, device: DeviceId, stream: StreamId) -> Result<(), StatusCode>;
}
