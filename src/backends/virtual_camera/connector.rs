// SPDX-License-Identifier: GPL-3.0-only

//! Producer connection to the virtual camera's sink stream

use super::listeners::{LogListener, StreamingClientsListener};
use crate::constants::status;
use crate::errors::ConnectorError;
use crate::platform::{
    BufferQueue, CaptureSystem, DeviceId, QueueAlteredCallback, SampleBuffer, StreamId,
    VideoFormat, VideoFrame,
};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Immutable description of the device and streams a connector binds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConnectorConfiguration {
    device_uuid: Uuid,
    source_stream_name: String,
    sink_stream_name: String,
    format: VideoFormat,
}

impl DeviceConnectorConfiguration {
    pub fn new(device_uuid: Uuid, source: &str, sink: &str, format: VideoFormat) -> Self {
        Self {
            device_uuid,
            source_stream_name: source.to_string(),
            sink_stream_name: sink.to_string(),
            format,
        }
    }

    pub fn device_uuid(&self) -> Uuid {
        self.device_uuid
    }

    pub fn source_stream_name(&self) -> &str {
        &self.source_stream_name
    }

    pub fn sink_stream_name(&self) -> &str {
        &self.sink_stream_name
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }
}

/// Receives queue-altered notifications from the driver
pub trait ConnectorDelegate: Send + Sync {
    fn queue_altered(&self, stream: StreamId);
}

/// Handler for streaming client snapshots
pub type ClientsHandler = Arc<dyn Fn(Vec<i32>) + Send + Sync>;

/// Handler for driver log messages
pub type LogHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Optional collaborators of a connector
///
/// Every field may be left out; a missing handler means the corresponding
/// notifications are not delivered.
#[derive(Default, Clone)]
pub struct ConnectorHandlers {
    pub streaming_clients: Option<ClientsHandler>,
    pub log: Option<LogHandler>,
    pub delegate: Option<Arc<dyn ConnectorDelegate>>,
    /// Runtime the listener handlers run on, the current one by default
    pub runtime: Option<Handle>,
}

/// Monotonic host clock shared by every connector
fn host_time() -> Duration {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed()
}

/// Owns the producer side of the driver's sink stream
///
/// Constructing a connector takes ownership of the sink stream's buffer
/// queue and starts the stream; dropping it stops the stream and releases
/// the queue.
pub struct DeviceConnector {
    system: Arc<dyn CaptureSystem>,
    configuration: DeviceConnectorConfiguration,
    device: DeviceId,
    sink: StreamId,
    queue: Box<dyn BufferQueue>,
    _clients_listener: Option<StreamingClientsListener>,
    _log_listener: Option<LogListener>,
}

impl DeviceConnector {
    pub fn new(
        system: Arc<dyn CaptureSystem>,
        configuration: DeviceConnectorConfiguration,
        handlers: ConnectorHandlers,
    ) -> Result<Self, ConnectorError> {
        let device = system
            .device_id(configuration.device_uuid)
            .ok_or(ConnectorError::DeviceNotFound(configuration.device_uuid))?;

        let source = system
            .stream_id(device, &configuration.source_stream_name)
            .ok_or_else(|| {
                ConnectorError::StreamNotFound(configuration.source_stream_name.clone())
            })?;
        let sink = system
            .stream_id(device, &configuration.sink_stream_name)
            .ok_or_else(|| ConnectorError::StreamNotFound(configuration.sink_stream_name.clone()))?;

        let altered: Option<QueueAlteredCallback> = handlers.delegate.map(|delegate| {
            Arc::new(move |stream: StreamId| delegate.queue_altered(stream)) as QueueAlteredCallback
        });
        let queue = system
            .copy_buffer_queue(sink, altered)
            .map_err(ConnectorError::QueueUnavailable)?;

        // The queue handle is dropped on failure, releasing it again
        system
            .start_stream(device, sink)
            .map_err(ConnectorError::StreamStartFailed)?;

        let clients_listener = handlers.streaming_clients.and_then(|handler| {
            StreamingClientsListener::new(
                system.clone(),
                source,
                move |pids| handler(pids),
                handlers.runtime.clone(),
            )
            .inspect_err(|e| warn!(?e, "Streaming clients will not be reported"))
            .ok()
        });
        let log_listener = handlers.log.and_then(|handler| {
            LogListener::new(
                system.clone(),
                source,
                move |message| handler(message),
                handlers.runtime.clone(),
            )
            .inspect_err(|e| warn!(?e, "Extension log will not be relayed"))
            .ok()
        });

        info!(
            device = device.0,
            sink = sink.0,
            format = %configuration.format,
            "Connected to virtual camera sink stream"
        );

        Ok(Self {
            system,
            configuration,
            device,
            sink,
            queue,
            _clients_listener: clients_listener,
            _log_listener: log_listener,
        })
    }

    pub fn configuration(&self) -> &DeviceConnectorConfiguration {
        &self.configuration
    }

    /// Push one decoded frame onto the sink stream's queue
    ///
    /// The frame is stamped with the host clock. A frame that does not match
    /// the connector's format is rejected with `INVALID_PARAMETER`.
    pub fn enqueue(&self, frame: &VideoFrame) -> Result<(), ConnectorError> {
        let format = self.configuration.format;
        if frame.codec != format.codec
            || frame.width != format.width
            || frame.height != format.height
            || frame.data.len() < format.frame_size()
        {
            debug!(
                width = frame.width,
                height = frame.height,
                codec = %frame.codec,
                expected = %format,
                "Frame does not match sink format"
            );
            return Err(ConnectorError::EnqueueFailed(status::INVALID_PARAMETER));
        }

        let sample = SampleBuffer {
            format,
            presentation_time: host_time(),
            frame: frame.clone(),
        };
        self.queue
            .enqueue(sample)
            .map_err(ConnectorError::EnqueueFailed)
    }
}

impl Drop for DeviceConnector {
    fn drop(&mut self) {
        if let Err(code) = self.system.stop_stream(self.device, self.sink) {
            error!(code, "Failed to stop sink stream on drop");
        } else {
            info!(sink = self.sink.0, "Disconnected from virtual camera sink stream");
        }
    }
}
