// SPDX-License-Identifier: GPL-3.0-only

//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use vcam_host::backends::extension::ExtensionState;
use vcam_host::config::RetryConfig;
use vcam_host::devices::analytics::AnalyticsEvent;
use vcam_host::devices::{DeviceManager, DeviceManagerDelegate, StreamingClient};
use vcam_host::platform::simulated::SimulatedSystem;
use vcam_host::platform::{AuthorizationStatus, MediaKind};
use vcam_host::{Config, ExtensionError};

/// One notification received by [`RecordingDelegate`]
#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Reboot,
    Relaunch,
    Connected(i32, bool),
    Disconnected(i32, bool),
    State(ExtensionState),
    Error(ExtensionError),
    Event(String),
    Authorization(MediaKind, AuthorizationStatus, AuthorizationStatus),
}

#[derive(Default)]
pub struct RecordingDelegate {
    notes: Mutex<Vec<Note>>,
}

impl RecordingDelegate {
    fn push(&self, note: Note) {
        self.notes.lock().unwrap().push(note);
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<ExtensionState> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn client_notes(&self) -> Vec<Note> {
        self.notes()
            .into_iter()
            .filter(|note| matches!(note, Note::Connected(..) | Note::Disconnected(..)))
            .collect()
    }

    pub fn count(&self, wanted: &Note) -> usize {
        self.notes().iter().filter(|note| *note == wanted).count()
    }

    pub fn events(&self) -> Vec<String> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Event(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Poll until `condition` holds for the notes so far
    pub async fn wait_until(&self, condition: impl Fn(&[Note]) -> bool) -> bool {
        eventually(|| condition(&self.notes())).await
    }
}

impl DeviceManagerDelegate for RecordingDelegate {
    fn requests_reboot(&self) {
        self.push(Note::Reboot);
    }

    fn requests_relaunch(&self) {
        self.push(Note::Relaunch);
    }

    fn streaming_client_connected(&self, client: &StreamingClient, is_first: bool) {
        self.push(Note::Connected(client.pid, is_first));
    }

    fn streaming_client_disconnected(&self, client: &StreamingClient, is_last: bool) {
        self.push(Note::Disconnected(client.pid, is_last));
    }

    fn did_update_extension_state(&self, state: &ExtensionState) {
        self.push(Note::State(state.clone()));
    }

    fn did_fail_with_error(&self, error: &ExtensionError) {
        self.push(Note::Error(error.clone()));
    }

    fn did_record_event(&self, event: &AnalyticsEvent) {
        self.push(Note::Event(event.name.clone()));
    }

    fn authorization_changed(
        &self,
        kind: MediaKind,
        from: AuthorizationStatus,
        to: AuthorizationStatus,
    ) {
        self.push(Note::Authorization(kind, from, to));
    }
}

/// Poll `condition` for up to five seconds
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Configuration with short retry and watchdog windows
pub fn test_config() -> Config {
    Config {
        device_retry: RetryConfig {
            attempts: 3,
            interval_ms: 10,
        },
        watchdog_window_ms: 50,
        ..Config::default()
    }
}

pub fn manager(system: &SimulatedSystem, config: Config) -> (DeviceManager, Arc<RecordingDelegate>) {
    let delegate = Arc::new(RecordingDelegate::default());
    let manager = DeviceManager::new(system.platform(), config, delegate.clone());
    (manager, delegate)
}

/// Wait until the manager reports `state`
pub async fn wait_for_state(manager: &DeviceManager, state: ExtensionState) -> bool {
    let mut receiver = manager.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        receiver.wait_for(|current| *current == state),
    )
    .await
    .is_ok_and(|result| result.is_ok())
}
