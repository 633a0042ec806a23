// SPDX-License-Identifier: GPL-3.0-only

//! Desktop integration seams: capture permissions, settings surfaces,
//! process lookup and application activity

use crate::errors::PermissionError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capture device media kinds that need user authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "camera"),
            MediaKind::Audio => write!(f, "microphone"),
        }
    }
}

/// Authorization status of one media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "not determined"),
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// The host's capture authorization facility
pub trait AuthorizationProvider: Send + Sync {
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus;

    /// Prompt the user; resolves to whether access was granted
    fn request_access(&self, kind: MediaKind) -> BoxFuture<'static, Result<bool, PermissionError>>;
}

/// Settings surfaces the user may have to be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsPane {
    CameraPrivacy,
    MicrophonePrivacy,
    ExtensionApproval,
}

impl SettingsPane {
    pub fn for_media(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => SettingsPane::CameraPrivacy,
            MediaKind::Audio => SettingsPane::MicrophonePrivacy,
        }
    }
}

/// Opens settings surfaces
pub trait SystemSettings: Send + Sync {
    fn open(&self, pane: SettingsPane) -> Result<(), PermissionError>;
}

/// Opens settings panes by URL with the desktop's default handler
#[derive(Debug, Clone, Default)]
pub struct DesktopSettings;

impl DesktopSettings {
    fn url(pane: SettingsPane) -> &'static str {
        match pane {
            SettingsPane::CameraPrivacy => {
                "x-apple.systempreferences:com.apple.preference.security?Privacy_Camera"
            }
            SettingsPane::MicrophonePrivacy => {
                "x-apple.systempreferences:com.apple.preference.security?Privacy_Microphone"
            }
            SettingsPane::ExtensionApproval => {
                "x-apple.systempreferences:com.apple.LoginItems-Settings.extension"
            }
        }
    }
}

impl SystemSettings for DesktopSettings {
    fn open(&self, pane: SettingsPane) -> Result<(), PermissionError> {
        let url = Self::url(pane);
        info!(?pane, url, "Opening system settings");
        open::that(url).map_err(|e| PermissionError::SettingsUnavailable(e.to_string()))
    }
}

/// What is known about a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub name: String,
    pub bundle_id: Option<String>,
}

/// Resolves process identifiers to applications
pub trait ProcessResolver: Send + Sync {
    fn resolve(&self, pid: i32) -> Option<ProcessInfo>;
}

/// Resolves processes through `/proc`
#[derive(Debug, Clone, Default)]
pub struct ProcFsResolver;

impl ProcessResolver for ProcFsResolver {
    fn resolve(&self, pid: i32) -> Option<ProcessInfo> {
        let name = std::fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;
        let bundle_id = std::fs::read_link(format!("/proc/{pid}/exe"))
            .ok()
            .map(|path| path.display().to_string());
        debug!(pid, name = name.trim(), "Resolved process");
        Some(ProcessInfo {
            name: name.trim().to_string(),
            bundle_id,
        })
    }
}

/// Host application activity, used where the registry cannot push changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppActivity {
    /// The application moved to the background
    ResignedActive,
    /// The application returned to the foreground
    BecameActive,
    /// The application's key window lost focus, e.g. to a system dialog
    KeyWindowResigned,
}

/// Broadcasts application activity to any number of observers
#[derive(Debug, Clone)]
pub struct ApplicationEvents {
    sender: broadcast::Sender<AppActivity>,
}

impl ApplicationEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn emit(&self, activity: AppActivity) {
        // No receivers is fine, nobody observes right now.
        let _ = self.sender.send(activity);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppActivity> {
        self.sender.subscribe()
    }
}

impl Default for ApplicationEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_resolves() {
        let resolver = ProcFsResolver;
        if std::path::Path::new("/proc/self/comm").exists() {
            let info = resolver.resolve(std::process::id() as i32);
            assert!(info.is_some_and(|info| !info.name.is_empty()));
        }
    }

    #[test]
    fn test_settings_pane_for_media() {
        assert_eq!(
            SettingsPane::for_media(MediaKind::Video),
            SettingsPane::CameraPrivacy
        );
        assert_eq!(
            SettingsPane::for_media(MediaKind::Audio),
            SettingsPane::MicrophonePrivacy
        );
    }

    #[tokio::test]
    async fn test_application_events_fan_out() {
        let events = ApplicationEvents::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();
        events.emit(AppActivity::BecameActive);
        assert_eq!(a.recv().await.unwrap(), AppActivity::BecameActive);
        assert_eq!(b.recv().await.unwrap(), AppActivity::BecameActive);
    }
}
