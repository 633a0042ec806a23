// SPDX-License-Identifier: GPL-3.0-only

//! Producer side of the virtual camera
//!
//! Frames captured by the host are pushed into the sink stream of the device
//! the camera extension publishes. The driver hands them to every client
//! application pulling from its source stream and reports those clients back
//! through an observable property.
//!
//! # Architecture
//!
//! ```text
//! Capture pipeline
//!        │ VideoFrame
//!        ▼
//! ┌──────────────────┐
//! │ DeviceConnector  │  ← owns the sink stream's buffer queue
//! └──────────────────┘
//!        │ SampleBuffer
//!        ▼
//! ┌──────────────────┐     streaming clients    ┌──────────────────────────┐
//! │ Camera extension │ ───────────────────────▶ │ StreamingClientsListener │
//! │ (driver)         │ ───────────────────────▶ │ LogListener              │
//! └──────────────────┘     log messages         └──────────────────────────┘
//!        │
//!        ▼
//!   Video apps
//! ```

mod connector;
mod listeners;
mod log_relay;
mod property_listener;

pub use connector::{
    ClientsHandler, ConnectorDelegate, ConnectorHandlers, DeviceConnector,
    DeviceConnectorConfiguration, LogHandler,
};
pub use listeners::{
    LogListener, StreamingClientsListener, parse_streaming_clients, split_log_messages,
};
pub use log_relay::{ExtensionLogRelay, Relayed};
pub use property_listener::PropertyListener;
