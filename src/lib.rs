// SPDX-License-Identifier: GPL-3.0-only

//! vcam-host - host side of a privileged virtual camera driver
//!
//! Installs, updates and removes the camera extension through the system's
//! extension registry, tracks its state, and once the driver is live pushes
//! frames into its sink stream while reporting which applications consume
//! the camera.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`devices`]: the [`DeviceManager`] and its collaborators
//! - [`backends`]: extension lifecycle and the driver connector
//! - [`platform`]: operating system seams and their simulated implementation
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! let system = SimulatedSystem::new(&config);
//! let manager = DeviceManager::new(system.platform(), config, delegate);
//! manager.start_devices().await?;
//! manager.activate_camera_extension().await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod devices;
pub mod errors;
pub mod platform;

// Re-export commonly used types
pub use backends::extension::{ExtensionLifecycleManager, ExtensionState};
pub use backends::virtual_camera::{DeviceConnector, DeviceConnectorConfiguration};
pub use config::Config;
pub use devices::{DeviceManager, DeviceManagerDelegate, FrameSink, StreamingClient};
pub use errors::{AppError, AppResult, ConnectorError, ExtensionError};
pub use platform::Platform;
