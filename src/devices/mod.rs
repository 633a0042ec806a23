// SPDX-License-Identifier: GPL-3.0-only

//! Host side device orchestration
//!
//! - [`manager`]: the [`DeviceManager`] reconciling extension state and the connector
//! - [`clients`]: streaming client bookkeeping
//! - [`permissions`]: camera and microphone authorization
//! - [`menu`]: menu item policy for the extension actions
//! - [`analytics`]: events handed to the analytics collaborator

pub mod analytics;
pub mod clients;
pub mod manager;
pub mod menu;
pub mod permissions;

pub use analytics::AnalyticsEvent;
pub use clients::{ClientEvent, ClientTracker, StreamingClient};
pub use manager::{DeviceManager, DeviceManagerDelegate, FrameSink, Info};
pub use menu::{MenuItem, update_activation_menu_item, update_deactivation_menu_item};
pub use permissions::{PermissionDelegate, PermissionHelper};
