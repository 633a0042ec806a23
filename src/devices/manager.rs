// SPDX-License-Identifier: GPL-3.0-only

//! Device manager
//!
//! Owns the camera extension state and reconciles it against the system.
//! All state lives in a single actor task; public methods and every
//! platform callback hand commands to it. Long running steps (registry
//! requests, waiting for the device to appear) run in their own tasks and
//! post their results back, tagged so that results of superseded work are
//! dropped.
//!
//! ```text
//!  menu / UI ──▶ DeviceManager ──▶ ┌───────────────┐ ──▶ ExtensionLifecycleManager
//!                                  │  actor task   │
//!  lifecycle delegate ───────────▶ │ (state, set   │ ──▶ DeviceConnector (FrameSink)
//!  streaming clients listener ───▶ │  of clients)  │
//!                                  └───────┬───────┘
//!                                          ▼
//!                               DeviceManagerDelegate
//! ```

use super::analytics::{self, AnalyticsEvent};
use super::clients::{ClientEvent, ClientTracker, StreamingClient};
use super::menu::{self, MenuItem};
use super::permissions::{PermissionDelegate, PermissionHelper};
use crate::backends::extension::{
    ExtensionLifecycleManager, ExtensionManagerDelegate, ExtensionState, NotificationWatchdog,
};
use crate::backends::virtual_camera::{
    ClientsHandler, ConnectorHandlers, DeviceConnector, ExtensionLogRelay, LogHandler,
};
use crate::config::Config;
use crate::errors::{AppError, AppResult, ConnectorError, ExtensionError};
use crate::platform::{
    AuthorizationStatus, ExtensionProperties, MediaKind, Platform, SettingsPane, VideoFrame,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One-way notifications to the UI, IPC and analytics collaborators
///
/// Every method defaults to doing nothing.
pub trait DeviceManagerDelegate: Send + Sync {
    /// The user should restart the system
    fn requests_reboot(&self) {}

    /// The user should relaunch the application
    fn requests_relaunch(&self) {}

    fn streaming_client_connected(&self, _client: &StreamingClient, _is_first: bool) {}

    fn streaming_client_disconnected(&self, _client: &StreamingClient, _is_last: bool) {}

    fn did_update_extension_state(&self, _state: &ExtensionState) {}

    fn did_fail_with_error(&self, _error: &ExtensionError) {}

    fn did_record_event(&self, _event: &AnalyticsEvent) {}

    fn authorization_changed(
        &self,
        _kind: MediaKind,
        _from: AuthorizationStatus,
        _to: AuthorizationStatus,
    ) {
    }
}

/// Diagnostics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub camera_permission_status: String,
    pub microphone_permission_status: String,
    pub virtual_camera_status: String,
}

/// Entry point for the capture pipeline to push frames
///
/// Holds the current connector, if any. Tearing a connector down waits for
/// in-progress enqueues, so a replacement never shares the queue with it.
#[derive(Clone, Default)]
pub struct FrameSink {
    connector: Arc<RwLock<Option<DeviceConnector>>>,
}

impl FrameSink {
    /// Push one frame; fails with `NotConnected` while there is no connector
    pub fn enqueue(&self, frame: &VideoFrame) -> Result<(), ConnectorError> {
        let guard = self
            .connector
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some(connector) => connector.enqueue(frame),
            None => Err(ConnectorError::NotConnected),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connector
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    fn attach(&self, connector: DeviceConnector) {
        *self
            .connector
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(connector);
    }

    /// Drop the connector; returns whether there was one
    fn detach(&self) -> bool {
        let connector = self
            .connector
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        connector.is_some()
    }
}

type Reply<T> = oneshot::Sender<AppResult<T>>;

enum Command {
    Start(Reply<()>),
    Stop(oneshot::Sender<()>),
    Refresh,
    Queried {
        session: u64,
        result: Result<ExtensionState, ExtensionError>,
        reply: Option<Reply<()>>,
    },
    InstallingFinished {
        epoch: u64,
        resolved: bool,
    },
    InstalledChecked {
        epoch: u64,
        previous: ExtensionState,
        count: Result<usize, ExtensionError>,
    },
    Activate(Option<Reply<ExtensionState>>),
    ActivationFinished {
        session: u64,
        result: Result<ExtensionState, ExtensionError>,
        reply: Option<Reply<ExtensionState>>,
    },
    Deactivate(Reply<ExtensionState>),
    DeactivationFinished {
        session: u64,
        result: Result<ExtensionState, ExtensionError>,
        reply: Reply<ExtensionState>,
    },
    WatchdogFinished { observed: bool },
    StartProducer(oneshot::Sender<()>),
    StopProducer(oneshot::Sender<()>),
    StreamingClients {
        connection: u64,
        pids: Vec<i32>,
    },
    LifecycleFailure(ExtensionError),
    Shutdown,
}

/// Hands lifecycle manager notifications to the actor
struct LifecycleEvents {
    commands: mpsc::UnboundedSender<Command>,
}

impl ExtensionManagerDelegate for LifecycleEvents {
    fn did_update_extension_state(&self, state: ExtensionState) {
        // The reported state may belong to a less relevant instance,
        // so it is only taken as a hint to query again
        debug!(%state, "Extension state update, querying current state");
        let _ = self.commands.send(Command::Refresh);
    }

    fn did_fail_with_error(&self, error: ExtensionError) {
        let _ = self.commands.send(Command::LifecycleFailure(error));
    }

    fn replaces_extension(&self, existing: &ExtensionProperties, replacement: &ExtensionProperties) {
        info!(
            existing = %existing.version_description(),
            replacement = %replacement.version_description(),
            "Replacing camera extension"
        );
    }
}

/// Forwards permission changes to the device manager's delegate
struct PermissionEvents {
    delegate: Arc<dyn DeviceManagerDelegate>,
}

impl PermissionDelegate for PermissionEvents {
    fn authorization_changed(
        &self,
        kind: MediaKind,
        from: AuthorizationStatus,
        to: AuthorizationStatus,
    ) {
        self.delegate.authorization_changed(kind, from, to);
        // Capture access granted after a denial only applies to new processes
        if matches!(
            from,
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted
        ) && to == AuthorizationStatus::Authorized
        {
            info!(%kind, "Access granted after denial, requesting relaunch");
            self.delegate.requests_relaunch();
        }
    }
}

struct Actor {
    platform: Platform,
    config: Config,
    lifecycle: ExtensionLifecycleManager,
    delegate: Arc<dyn DeviceManagerDelegate>,
    commands: mpsc::UnboundedSender<Command>,
    state: ExtensionState,
    state_tx: watch::Sender<ExtensionState>,
    /// Bumped on every applied transition
    epoch: u64,
    /// Bumped on every start and stop
    session: u64,
    /// Bumped on every connector change
    connection: u64,
    started: bool,
    installing: Option<JoinHandle<()>>,
    reboot_alert_shown: bool,
    producer_running: bool,
    tracker: ClientTracker,
    clients: Arc<Mutex<Vec<StreamingClient>>>,
    sink: FrameSink,
    watchdog: NotificationWatchdog,
    watchdog_armed: bool,
    log_relay: Arc<ExtensionLogRelay>,
}

impl Actor {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        debug!("Device manager stopped");
    }

    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => self.start(reply),
            Command::Stop(reply) => {
                self.stop();
                let _ = reply.send(());
            }
            Command::Refresh => {
                if self.started {
                    self.query_state(None);
                }
            }
            Command::Queried {
                session,
                result,
                reply,
            } => self.queried(session, result, reply),
            Command::InstallingFinished { epoch, resolved } => {
                self.installing_finished(epoch, resolved)
            }
            Command::InstalledChecked {
                epoch,
                previous,
                count,
            } => self.installed_checked(epoch, previous, count),
            Command::Activate(reply) => self.activate(reply),
            Command::ActivationFinished {
                session,
                result,
                reply,
            } => self.activation_finished(session, result, reply),
            Command::Deactivate(reply) => self.deactivate(reply),
            Command::DeactivationFinished {
                session,
                result,
                reply,
            } => self.deactivation_finished(session, result, reply),
            Command::WatchdogFinished { observed } => self.watchdog_finished(observed),
            Command::StartProducer(reply) => {
                self.start_producer();
                let _ = reply.send(());
            }
            Command::StopProducer(reply) => {
                self.stop_producer();
                let _ = reply.send(());
            }
            Command::StreamingClients { connection, pids } => {
                self.streaming_clients_changed(connection, pids)
            }
            Command::LifecycleFailure(e) => {
                if e.is_non_critical() {
                    warn!(?e, "Extension manager reported a non-critical error");
                } else {
                    error!(?e, "Extension manager failed");
                    self.delegate.did_fail_with_error(&e);
                }
            }
            Command::Shutdown => {
                self.lifecycle.shutdown();
                self.cancel_installing();
                self.teardown_connector();
                return false;
            }
        }
        true
    }

    fn record(&self, event: AnalyticsEvent) {
        debug!(name = %event.name, "Recording analytics event");
        self.delegate.did_record_event(&event);
    }

    fn start(&mut self, reply: Reply<()>) {
        info!("Starting devices");
        self.session += 1;
        self.started = true;

        let delegate = Arc::new(LifecycleEvents {
            commands: self.commands.clone(),
        });
        if let Err(e) = self.lifecycle.start(delegate) {
            error!(?e, "Failed to start devices");
            let _ = reply.send(Err(e.into()));
            return;
        }
        self.query_state(Some(reply));
    }

    fn stop(&mut self) {
        info!("Stopping devices");
        self.session += 1;
        self.started = false;
        self.lifecycle.stop();
        self.cancel_installing();
        self.teardown_connector();
        self.apply(ExtensionState::Unknown);
    }

    fn query_state(&self, reply: Option<Reply<()>>) {
        let lifecycle = self.lifecycle.clone();
        let commands = self.commands.clone();
        let session = self.session;
        tokio::spawn(async move {
            let result = lifecycle.current_state().await;
            let _ = commands.send(Command::Queried {
                session,
                result,
                reply,
            });
        });
    }

    fn queried(
        &mut self,
        session: u64,
        result: Result<ExtensionState, ExtensionError>,
        reply: Option<Reply<()>>,
    ) {
        let outcome = match result {
            Ok(state) => {
                if session == self.session {
                    self.apply(state);
                } else {
                    debug!(%state, "Dropping state queried in a previous session");
                }
                Ok(())
            }
            Err(ExtensionError::Canceled) => Err(ExtensionError::Canceled),
            Err(e) => {
                error!(?e, "Extension state update failed");
                Err(e)
            }
        };
        if let Some(reply) = reply {
            let _ = reply.send(outcome.map_err(AppError::from));
        }
    }

    /// Apply a transition and run its policy
    fn apply(&mut self, state: ExtensionState) {
        if state == self.state {
            debug!(%state, "Extension state unchanged");
            return;
        }

        let previous = std::mem::replace(&mut self.state, state.clone());
        self.epoch += 1;
        self.cancel_installing();
        info!(from = %previous, to = %state, "Camera extension state changed");

        self.state_tx.send_replace(state.clone());
        self.record(AnalyticsEvent::state_changed(&previous, &state));
        self.delegate.did_update_extension_state(&state);

        match state {
            ExtensionState::Unknown => {
                info!("Camera extension state is unknown, which is valid while reloading");
            }
            ExtensionState::Error(e) => {
                error!(?e, "Camera extension encountered error");
            }
            ExtensionState::AwaitingUserApproval
            | ExtensionState::Disabled
            | ExtensionState::NotInstalled => self.teardown_connector(),
            ExtensionState::Installing => self.wait_for_device(),
            ExtensionState::Installed => self.check_installation(previous),
            ExtensionState::NeedsUpdate => self.activate(None),
            ExtensionState::RequiresReboot => {
                if !self.reboot_alert_shown {
                    self.reboot_alert_shown = true;
                    info!("Requesting reboot");
                    self.delegate.requests_reboot();
                }
            }
            ExtensionState::Uninstalling => {
                self.teardown_connector();
                self.reboot_alert_shown = false;
            }
        }
    }

    fn cancel_installing(&mut self) {
        if let Some(task) = self.installing.take() {
            task.abort();
        }
    }

    /// Poll for the device handle with bounded retries
    fn wait_for_device(&mut self) {
        let capture = self.platform.capture.clone();
        let uuid = self.config.camera.device_uuid;
        let retry = self.config.device_retry;
        let commands = self.commands.clone();
        let epoch = self.epoch;

        self.installing = Some(tokio::spawn(async move {
            let attempts = retry.attempts.max(1);
            let mut resolved = false;
            for attempt in 1..=attempts {
                if capture.device_id(uuid).is_some() {
                    resolved = true;
                    break;
                }
                debug!(attempt, attempts, "Camera device not available yet");
                if attempt < attempts {
                    tokio::time::sleep(retry.interval()).await;
                }
            }
            let _ = commands.send(Command::InstallingFinished { epoch, resolved });
        }));
    }

    fn installing_finished(&mut self, epoch: u64, resolved: bool) {
        if epoch != self.epoch {
            debug!("Dropping superseded device retrieval");
            return;
        }
        if resolved {
            info!("Camera extension is now available");
            self.apply(ExtensionState::Installed);
        } else {
            info!("Camera extension remains unavailable, remediation is required to activate");
            self.apply(ExtensionState::RequiresReboot);
        }
    }

    fn check_installation(&mut self, previous: ExtensionState) {
        let lifecycle = self.lifecycle.clone();
        let commands = self.commands.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let count = lifecycle.installed_instance_count().await;
            let _ = commands.send(Command::InstalledChecked {
                epoch,
                previous,
                count,
            });
        });
    }

    fn installed_checked(
        &mut self,
        epoch: u64,
        previous: ExtensionState,
        count: Result<usize, ExtensionError>,
    ) {
        if epoch != self.epoch {
            debug!("Dropping superseded installation check");
            return;
        }

        let count = match count {
            Ok(count) => count,
            Err(ExtensionError::Canceled) => return,
            Err(e) => {
                error!(?e, "Failed to count extension instances");
                self.apply(ExtensionState::Error(e));
                return;
            }
        };

        if count > 1 || previous == ExtensionState::Disabled {
            info!(
                count,
                %previous,
                "Camera extension has been re-enabled or re-installed, remediation is required"
            );
            self.apply(ExtensionState::RequiresReboot);
            return;
        }

        if self
            .platform
            .capture
            .device_id(self.config.camera.device_uuid)
            .is_none()
        {
            info!("Camera extension is unavailable, waiting for the system to finish installation");
            self.apply(ExtensionState::Installing);
            return;
        }

        if let Err(e) = self.connect() {
            error!(?e, "Failed to connect to the camera extension");
            self.apply(ExtensionState::Error(e.into()));
        }
    }

    fn connect(&mut self) -> Result<(), ConnectorError> {
        self.teardown_connector();
        self.connection += 1;

        let connection = self.connection;
        let commands = self.commands.clone();
        let relay = self.log_relay.clone();
        let on_clients: ClientsHandler = Arc::new(move |pids: Vec<i32>| {
            let _ = commands.send(Command::StreamingClients { connection, pids });
        });
        let on_log: LogHandler = Arc::new(move |message: String| relay.relay(&message));
        let handlers = ConnectorHandlers {
            streaming_clients: Some(on_clients),
            log: Some(on_log),
            ..Default::default()
        };

        let connector = DeviceConnector::new(
            self.platform.capture.clone(),
            self.config.device_connector_configuration(),
            handlers,
        )?;
        self.sink.attach(connector);
        Ok(())
    }

    fn teardown_connector(&mut self) {
        if !self.sink.detach() {
            return;
        }
        info!("Stopped camera connector");
        self.connection += 1;
        let events = self.tracker.clear();
        self.publish_clients();
        self.forward(events);
    }

    fn activate(&mut self, reply: Option<Reply<ExtensionState>>) {
        info!(state = %self.state, "Activating camera extension");
        self.record(AnalyticsEvent::new(analytics::INSTALLATION_ATTEMPTED));

        if self.state == ExtensionState::RequiresReboot {
            info!("Requesting reboot");
            self.delegate.requests_reboot();
            if let Some(reply) = reply {
                let _ = reply.send(Ok(ExtensionState::RequiresReboot));
            }
            return;
        }

        if !self.state.allows_installation() {
            info!(state = %self.state, "Activation is not available");
            if let Some(reply) = reply {
                let error = ExtensionError::RequestUnavailableInState(Box::new(self.state.clone()));
                let _ = reply.send(Err(error.into()));
            }
            return;
        }

        if matches!(
            self.state,
            ExtensionState::AwaitingUserApproval | ExtensionState::Disabled
        ) {
            if self.watchdog_armed {
                debug!("Notification watchdog already armed");
            } else {
                self.watchdog_armed = true;
                let armed = self.watchdog.arm();
                let commands = self.commands.clone();
                tokio::spawn(async move {
                    let observed = armed.await;
                    let _ = commands.send(Command::WatchdogFinished { observed });
                });
            }
        }

        let lifecycle = self.lifecycle.clone();
        let commands = self.commands.clone();
        let session = self.session;
        tokio::spawn(async move {
            let result = lifecycle.request_activation().await;
            let _ = commands.send(Command::ActivationFinished {
                session,
                result,
                reply,
            });
        });
    }

    fn activation_finished(
        &mut self,
        session: u64,
        result: Result<ExtensionState, ExtensionError>,
        reply: Option<Reply<ExtensionState>>,
    ) {
        let current = session == self.session;
        let result = match result {
            Ok(state) => {
                if current {
                    self.apply(state.clone());
                }
                Ok(state)
            }
            Err(e @ ExtensionError::RequestUnavailableInState(_)) => {
                info!(?e, "Activation was not submitted");
                if current && self.started {
                    self.query_state(None);
                }
                Err(e)
            }
            Err(ExtensionError::Canceled) => Err(ExtensionError::Canceled),
            Err(e) => {
                error!(?e, "Activation failed");
                self.record(AnalyticsEvent::error(analytics::INSTALLATION_FAILED, &e));
                self.delegate.did_fail_with_error(&e);
                if current {
                    self.apply(ExtensionState::Error(e.clone()));
                }
                Err(e)
            }
        };
        if let Some(reply) = reply {
            let _ = reply.send(result.map_err(AppError::from));
        }
    }

    fn deactivate(&mut self, reply: Reply<ExtensionState>) {
        info!(state = %self.state, "Deactivating camera extension");
        let lifecycle = self.lifecycle.clone();
        let commands = self.commands.clone();
        let session = self.session;
        tokio::spawn(async move {
            let result = lifecycle.request_deactivation().await;
            let _ = commands.send(Command::DeactivationFinished {
                session,
                result,
                reply,
            });
        });
    }

    fn deactivation_finished(
        &mut self,
        session: u64,
        result: Result<ExtensionState, ExtensionError>,
        reply: Reply<ExtensionState>,
    ) {
        let current = session == self.session;
        let result = match result {
            Ok(state) => {
                if current {
                    self.apply(state.clone());
                }
                Ok(state)
            }
            Err(ExtensionError::AuthorizationRequired) => {
                info!("Deactivation canceled due to missing authorization by user");
                Err(ExtensionError::AuthorizationRequired)
            }
            Err(e @ ExtensionError::RequestUnavailableInState(_)) => {
                info!(?e, "Deactivation was not submitted");
                if current && self.started {
                    self.query_state(None);
                }
                Err(e)
            }
            Err(ExtensionError::Canceled) => Err(ExtensionError::Canceled),
            Err(e) => {
                error!(?e, "Deactivation failed");
                self.record(AnalyticsEvent::error(analytics::DEINSTALLATION_FAILED, &e));
                self.delegate.did_fail_with_error(&e);
                if current {
                    self.apply(ExtensionState::Error(e.clone()));
                }
                Err(e)
            }
        };
        let _ = reply.send(result.map_err(AppError::from));
    }

    fn watchdog_finished(&mut self, observed: bool) {
        self.watchdog_armed = false;
        if observed {
            return;
        }
        if matches!(
            self.state,
            ExtensionState::Installing
                | ExtensionState::Installed
                | ExtensionState::RequiresReboot
                | ExtensionState::NeedsUpdate
        ) {
            info!("Skipping opening settings because the camera extension is already active");
            return;
        }

        info!("Opening settings to allow manual activation of the camera extension");
        if let Err(e) = self.platform.settings.open(SettingsPane::ExtensionApproval) {
            error!(?e, "Failed to open extension settings");
        }
    }

    fn start_producer(&mut self) {
        if self.producer_running {
            info!("Virtual camera producer already started, skipping");
            return;
        }

        let events = if self.tracker.is_empty() {
            // Consumers assume the camera is on until told otherwise
            let host = StreamingClient::host(self.platform.processes.as_ref());
            vec![ClientEvent::Disconnected {
                client: host,
                is_last: true,
            }]
        } else {
            self.tracker.replay_connected()
        };

        self.producer_running = true;
        info!("Virtual camera producer started");
        self.forward(events);
    }

    fn stop_producer(&mut self) {
        if !self.producer_running {
            info!("Virtual camera producer is not running, skipping");
            return;
        }

        let events = self.tracker.replay_disconnected();
        self.forward(events);
        self.producer_running = false;
        info!("Virtual camera producer stopped");
    }

    fn streaming_clients_changed(&mut self, connection: u64, pids: Vec<i32>) {
        if connection != self.connection {
            debug!(?pids, "Dropping streaming clients of a previous connection");
            return;
        }
        let events = self
            .tracker
            .update(&pids, self.platform.processes.as_ref(), Utc::now());
        self.publish_clients();
        self.forward(events);
    }

    fn publish_clients(&self) {
        *self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = self.tracker.clients().to_vec();
    }

    /// Hand client events to the delegate while the producer runs
    fn forward(&self, events: Vec<ClientEvent>) {
        for event in events {
            match &event {
                ClientEvent::Connected { client, is_first } => {
                    info!(
                        app = %client.app_name,
                        pid = client.pid,
                        is_first,
                        "Virtual camera client connected"
                    );
                }
                ClientEvent::Disconnected { client, is_last } => {
                    info!(
                        app = %client.app_name,
                        pid = client.pid,
                        is_last,
                        "Virtual camera client disconnected"
                    );
                }
            }
            if !self.producer_running {
                continue;
            }
            match event {
                ClientEvent::Connected { client, is_first } => {
                    self.delegate.streaming_client_connected(&client, is_first)
                }
                ClientEvent::Disconnected { client, is_last } => {
                    self.delegate.streaming_client_disconnected(&client, is_last)
                }
            }
        }
    }
}

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ExtensionState>,
    clients: Arc<Mutex<Vec<StreamingClient>>>,
    sink: FrameSink,
    camera: PermissionHelper,
    microphone: PermissionHelper,
    product_name: String,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Orchestrates the camera extension, its connector and the permissions
///
/// Cheap to clone. The manager shuts down when the last clone is dropped.
#[derive(Clone)]
pub struct DeviceManager {
    inner: Arc<Inner>,
}

impl DeviceManager {
    /// Create the manager and spawn its actor
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(platform: Platform, config: Config, delegate: Arc<dyn DeviceManagerDelegate>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ExtensionState::Unknown);
        let clients = Arc::new(Mutex::new(Vec::new()));
        let sink = FrameSink::default();

        let permission_events: Arc<dyn PermissionDelegate> = Arc::new(PermissionEvents {
            delegate: delegate.clone(),
        });
        let camera = PermissionHelper::new(
            MediaKind::Video,
            platform.authorization.clone(),
            platform.settings.clone(),
        );
        camera.set_delegate(Some(permission_events.clone()));
        let microphone = PermissionHelper::new(
            MediaKind::Audio,
            platform.authorization.clone(),
            platform.settings.clone(),
        );
        microphone.set_delegate(Some(permission_events));

        let actor = Actor {
            lifecycle: ExtensionLifecycleManager::new(&platform, &config),
            watchdog: NotificationWatchdog::new(
                platform.app_events.clone(),
                config.watchdog_window(),
            ),
            log_relay: Arc::new(ExtensionLogRelay::new(config.log_throttle_interval())),
            platform,
            delegate,
            commands: commands.clone(),
            state: ExtensionState::Unknown,
            state_tx,
            epoch: 0,
            session: 0,
            connection: 0,
            started: false,
            installing: None,
            reboot_alert_shown: false,
            watchdog_armed: false,
            producer_running: false,
            tracker: ClientTracker::new(),
            clients: clients.clone(),
            sink: sink.clone(),
            config: config.clone(),
        };
        tokio::spawn(actor.run(receiver));

        Self {
            inner: Arc::new(Inner {
                commands,
                state,
                clients,
                sink,
                camera,
                microphone,
                product_name: config.product_name,
            }),
        }
    }

    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> AppResult<T> {
        let (reply, receiver) = oneshot::channel();
        self.inner
            .commands
            .send(command(reply))
            .map_err(|_| AppError::ManagerStopped)?;
        receiver.await.map_err(|_| AppError::ManagerStopped)?
    }

    async fn notify(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) -> AppResult<()> {
        let (reply, receiver) = oneshot::channel();
        self.inner
            .commands
            .send(command(reply))
            .map_err(|_| AppError::ManagerStopped)?;
        receiver.await.map_err(|_| AppError::ManagerStopped)
    }

    /// Start observing the extension and reconcile with its current state
    pub async fn start_devices(&self) -> AppResult<()> {
        self.call(Command::Start).await
    }

    /// Stop observing, tear down the connector and forget the state
    pub async fn stop_devices(&self) -> AppResult<()> {
        self.notify(Command::Stop).await
    }

    /// Install, update or approve the extension
    pub async fn activate_camera_extension(&self) -> AppResult<ExtensionState> {
        self.call(|reply| Command::Activate(Some(reply))).await
    }

    /// Uninstall the extension
    pub async fn deactivate_camera_extension(&self) -> AppResult<ExtensionState> {
        self.call(Command::Deactivate).await
    }

    /// A producer started; replays the current clients to the delegate
    pub async fn start_virtual_camera_producer(&self) -> AppResult<()> {
        self.notify(Command::StartProducer).await
    }

    /// The producer stopped; replays disconnects for the current clients
    pub async fn stop_virtual_camera_producer(&self) -> AppResult<()> {
        self.notify(Command::StopProducer).await
    }

    pub fn state(&self) -> ExtensionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that sees the latest state
    pub fn subscribe_state(&self) -> watch::Receiver<ExtensionState> {
        self.inner.state.clone()
    }

    pub fn streaming_clients(&self) -> Vec<StreamingClient> {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Where the capture pipeline pushes frames
    pub fn frame_sink(&self) -> FrameSink {
        self.inner.sink.clone()
    }

    pub fn camera_permissions(&self) -> &PermissionHelper {
        &self.inner.camera
    }

    pub fn microphone_permissions(&self) -> &PermissionHelper {
        &self.inner.microphone
    }

    /// Ask for capture access for every kind whose status is not determined
    pub async fn request_permissions(&self, kinds: &[MediaKind]) {
        info!(?kinds, "Requesting capture device permissions");
        for helper in [&self.inner.camera, &self.inner.microphone] {
            if !kinds.contains(&helper.kind()) {
                continue;
            }
            if helper.current_authorization_status() != AuthorizationStatus::NotDetermined {
                continue;
            }
            if let Err(e) = helper.request_authorization().await {
                error!(?e, kind = %helper.kind(), "Failed to request capture permission");
            }
        }
    }

    pub fn info(&self) -> Info {
        Info {
            camera_permission_status: self.inner.camera.current_authorization_status().to_string(),
            microphone_permission_status: self
                .inner
                .microphone
                .current_authorization_status()
                .to_string(),
            virtual_camera_status: self.state().to_string(),
        }
    }

    /// Update the activation menu item for the current state
    pub fn update_camera_extension_activation_menu_item(&self, item: &mut MenuItem) -> bool {
        menu::update_activation_menu_item(&self.state(), &self.inner.product_name, item)
    }

    /// Update the deactivation menu item for the current state
    pub fn update_camera_extension_deactivation_menu_item(&self, item: &mut MenuItem) -> bool {
        menu::update_deactivation_menu_item(&self.state(), &self.inner.product_name, item)
    }
}
