// SPDX-License-Identifier: GPL-3.0-only

//! Operating system seams
//!
//! Everything the host needs from the operating system is expressed as a
//! trait here, so the lifecycle and media code never talks to a concrete
//! platform API:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Platform                     │
//! │  ┌───────────────────┐  ┌─────────────────┐  │
//! │  │ ExtensionRegistry │  │  CaptureSystem  │  │
//! │  │ (install/enable)  │  │ (device/queue)  │  │
//! │  └───────────────────┘  └─────────────────┘  │
//! │  ┌───────────────────┐  ┌─────────────────┐  │
//! │  │ Authorization     │  │ SystemSettings  │  │
//! │  └───────────────────┘  └─────────────────┘  │
//! │  ┌───────────────────┐  ┌─────────────────┐  │
//! │  │ ProcessResolver   │  │ AppActivity     │  │
//! │  └───────────────────┘  └─────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! [`simulated`] implements all of them in memory.

mod capture;
mod registry;
pub mod simulated;
mod system;

pub use capture::{
    BufferQueue, CaptureSystem, DeviceId, ListenerToken, PropertyCallback, PropertySelector,
    PropertySource, QueueAlteredCallback, SampleBuffer, StreamId, VideoCodec, VideoFormat,
    VideoFrame,
};
pub use registry::{
    ActivationState, BundleVersion, ExtensionProperties, ExtensionRegistry, ExtensionRequest,
    RegistryCallbacks, RegistryEvent, RegistryFailure, RequestId, RequestKind, RequestResult,
};
pub use system::{
    AppActivity, ApplicationEvents, AuthorizationProvider, AuthorizationStatus, DesktopSettings,
    MediaKind, ProcFsResolver, ProcessInfo, ProcessResolver, SettingsPane, SystemSettings,
};

use std::sync::Arc;

/// Handles to every platform facility the host uses
#[derive(Clone)]
pub struct Platform {
    pub registry: Arc<dyn ExtensionRegistry>,
    pub capture: Arc<dyn CaptureSystem>,
    pub authorization: Arc<dyn AuthorizationProvider>,
    pub settings: Arc<dyn SystemSettings>,
    pub processes: Arc<dyn ProcessResolver>,
    pub app_events: ApplicationEvents,
}
