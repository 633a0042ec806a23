// SPDX-License-Identifier: GPL-3.0-only

//! Noticing extension state changes made outside this process
//!
//! Registries that can push notifications are subscribed to directly. Where
//! that is not available, the state is compared across the host application
//! moving to the background and back, since that is when users change the
//! extension's state in the system settings.

use super::manager::WeakLifecycleManager;
use super::state::ExtensionState;
use crate::config::ObservationMode;
use crate::errors::ExtensionError;
use crate::platform::{AppActivity, ApplicationEvents, ExtensionRegistry, RegistryCallbacks};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Strategy for observing state changes nobody asked for
pub trait StateObservation: Send + Sync {
    fn start(&self, manager: WeakLifecycleManager) -> Result<(), ExtensionError>;

    fn stop(&self);

    fn name(&self) -> &'static str;
}

/// Pick the observation strategy for a registry
pub fn observation_for(
    mode: ObservationMode,
    registry: Arc<dyn ExtensionRegistry>,
    identifier: &str,
    callbacks: RegistryCallbacks,
    app_events: ApplicationEvents,
) -> Box<dyn StateObservation> {
    let push = match mode {
        ObservationMode::Auto => registry.supports_push_notifications(),
        ObservationMode::Push => true,
        ObservationMode::Foreground => false,
    };

    if push {
        Box::new(PushObservation {
            registry,
            identifier: identifier.to_string(),
            callbacks,
        })
    } else {
        Box::new(ForegroundObservation {
            events: app_events,
            task: Mutex::new(None),
        })
    }
}

/// Subscribes to the registry's push notifications
///
/// Notifications arrive on the lifecycle manager's regular event channel.
pub struct PushObservation {
    registry: Arc<dyn ExtensionRegistry>,
    identifier: String,
    callbacks: RegistryCallbacks,
}

impl StateObservation for PushObservation {
    fn start(&self, _manager: WeakLifecycleManager) -> Result<(), ExtensionError> {
        self.registry
            .start_observing(&self.identifier, self.callbacks.clone())?;
        info!(identifier = %self.identifier, "Observing extension state notifications");
        Ok(())
    }

    fn stop(&self) {
        self.registry.stop_observing(&self.identifier);
    }

    fn name(&self) -> &'static str {
        "push"
    }
}

/// Compares the extension state before and after the application was in
/// the background
pub struct ForegroundObservation {
    events: ApplicationEvents,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StateObservation for ForegroundObservation {
    fn start(&self, weak: WeakLifecycleManager) -> Result<(), ExtensionError> {
        let mut receiver = self.events.subscribe();

        let task = tokio::spawn(async move {
            let mut recorded: Option<ExtensionState> = None;
            loop {
                let activity = match receiver.recv().await {
                    Ok(activity) => activity,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Missed application activity events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(manager) = weak.upgrade() else {
                    break;
                };

                match activity {
                    AppActivity::ResignedActive => {
                        recorded = manager.current_state().await.ok();
                    }
                    AppActivity::BecameActive => match manager.current_state().await {
                        Ok(state) if recorded.as_ref() != Some(&state) => {
                            debug!(%state, "Extension state changed while in background");
                            manager.report_state(state);
                        }
                        Ok(_) => {}
                        Err(e) => manager.report_error(e),
                    },
                    AppActivity::KeyWindowResigned => {}
                }
            }
        });

        let previous = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!("Observing extension state across application activation");
        Ok(())
    }

    fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    fn name(&self) -> &'static str {
        "foreground"
    }
}

impl Drop for ForegroundObservation {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watches for a system dialog taking focus after an activation request
///
/// Some systems only present their approval dialog once. If the key window
/// does not lose focus within the window, the caller routes the user to the
/// settings manually.
#[derive(Debug, Clone)]
pub struct NotificationWatchdog {
    events: ApplicationEvents,
    window: Duration,
}

impl NotificationWatchdog {
    pub fn new(events: ApplicationEvents, window: Duration) -> Self {
        Self { events, window }
    }

    /// Start watching now; resolves to whether the key window resigned
    pub fn arm(&self) -> impl Future<Output = bool> + Send + 'static {
        let mut receiver = self.events.subscribe();
        let window = self.window;

        async move {
            let observed = tokio::time::timeout(window, async move {
                loop {
                    match receiver.recv().await {
                        Ok(AppActivity::KeyWindowResigned) => return true,
                        Ok(_) | Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return false,
                    }
                }
            })
            .await
            .unwrap_or(false);

            if !observed {
                warn!(?window, "No system dialog appeared after activation request");
            }
            observed
        }
    }
}
