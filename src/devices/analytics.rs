// SPDX-License-Identifier: GPL-3.0-only

//! Analytics events emitted by the device manager

use crate::backends::extension::ExtensionState;
use serde::Serialize;
use std::collections::BTreeMap;

pub const INSTALLATION_ATTEMPTED: &str = "virtual_camera_installation_attempted";
pub const INSTALLATION_FAILED: &str = "virtual_camera_installation_failed";
pub const DEINSTALLATION_FAILED: &str = "virtual_camera_deinstallation_failed";
pub const STATE_CHANGED: &str = "virtual_camera_state_changed";

/// One analytics event, serializable for whatever transport records it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl AnalyticsEvent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn error(name: &str, error: &impl std::fmt::Display) -> Self {
        Self::new(name).with("error", error.to_string())
    }

    pub fn state_changed(from: &ExtensionState, to: &ExtensionState) -> Self {
        let event = Self::new(STATE_CHANGED)
            .with("from", from.name())
            .with("to", to.name());
        match to.error() {
            Some(e) => event.with("error", e.to_string()),
            None => event,
        }
    }
}
