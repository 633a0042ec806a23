// SPDX-License-Identifier: GPL-3.0-only

//! Backends talking to the camera extension
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                DeviceManager                 │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │  Extension  │    │ Virtual Camera   │    │
//! │  │ (lifecycle) │    │ (frame producer) │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`extension`]: installing, enabling and monitoring the extension
//! - [`virtual_camera`]: feeding frames into the extension's device

pub mod extension;
pub mod virtual_camera;
