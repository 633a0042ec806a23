// SPDX-License-Identifier: GPL-3.0-only

//! In-memory platform
//!
//! A complete, scriptable stand-in for the operating system: an extension
//! registry that installs and removes instances, a media layer that publishes
//! the extension's device once it is enabled, and trivial authorization,
//! settings and process lookup. Used by the `simulate` command and the tests.

use super::{
    ActivationState, ApplicationEvents, AuthorizationProvider, AuthorizationStatus,
    BufferQueue, CaptureSystem, DeviceId, ExtensionProperties, ExtensionRegistry,
    ExtensionRequest, ListenerToken, MediaKind, Platform, ProcessInfo, ProcessResolver,
    PropertyCallback, PropertySelector, PropertySource, QueueAlteredCallback, RegistryCallbacks,
    RegistryEvent, RegistryFailure, RequestKind, RequestResult, SampleBuffer, SettingsPane,
    StreamId, SystemSettings,
};
use crate::config::{CameraConfig, Config};
use crate::constants::{self, STREAMING_CLIENTS_SEPARATOR, status};
use crate::errors::{ExtensionError, PermissionError, StatusCode};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How the simulated registry answers activation and deactivation requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// Apply the request and report completion
    Complete,
    /// Park the request until [`SimulatedRegistry::approve`] is called
    NeedsApproval,
    /// Report that the request completes after a reboot
    RequireReboot,
    /// Report a failure
    Fail(RegistryFailure),
    /// Record the request and stay silent; tests answer it by hand
    Manual,
}

struct RegistryState {
    instances: Vec<ExtensionProperties>,
    activation_policy: ResponsePolicy,
    deactivation_policy: ResponsePolicy,
    properties_failure: Option<RegistryFailure>,
    submitted: Vec<ExtensionRequest>,
    parked: Vec<(ExtensionRequest, RegistryCallbacks)>,
    observers: HashMap<String, RegistryCallbacks>,
    last_callbacks: Option<RegistryCallbacks>,
}

/// Simulated extension registry
pub struct SimulatedRegistry {
    identifier: String,
    bundled_version: String,
    push_notifications: AtomicBool,
    publishes_device: AtomicBool,
    capture: Arc<SimulatedCaptureSystem>,
    state: Mutex<RegistryState>,
}

impl SimulatedRegistry {
    fn new(identifier: &str, bundled_version: &str, capture: Arc<SimulatedCaptureSystem>) -> Self {
        Self {
            identifier: identifier.to_string(),
            bundled_version: bundled_version.to_string(),
            push_notifications: AtomicBool::new(true),
            publishes_device: AtomicBool::new(true),
            capture,
            state: Mutex::new(RegistryState {
                instances: Vec::new(),
                activation_policy: ResponsePolicy::Complete,
                deactivation_policy: ResponsePolicy::Complete,
                properties_failure: None,
                submitted: Vec::new(),
                parked: Vec::new(),
                observers: HashMap::new(),
                last_callbacks: None,
            }),
        }
    }

    pub fn set_activation_policy(&self, policy: ResponsePolicy) {
        lock(&self.state).activation_policy = policy;
    }

    pub fn set_deactivation_policy(&self, policy: ResponsePolicy) {
        lock(&self.state).deactivation_policy = policy;
    }

    /// Fail every properties query with `failure` until reset with `None`
    pub fn fail_property_queries(&self, failure: Option<RegistryFailure>) {
        lock(&self.state).properties_failure = failure;
    }

    pub fn set_push_notifications(&self, supported: bool) {
        self.push_notifications.store(supported, Ordering::SeqCst);
    }

    /// Whether enabling the extension publishes its camera device
    pub fn set_publishes_device(&self, publishes: bool) {
        self.publishes_device.store(publishes, Ordering::SeqCst);
    }

    pub fn set_instances(&self, instances: Vec<ExtensionProperties>) {
        lock(&self.state).instances = instances;
    }

    pub fn instances(&self) -> Vec<ExtensionProperties> {
        lock(&self.state).instances.clone()
    }

    pub fn submitted(&self) -> Vec<ExtensionRequest> {
        lock(&self.state).submitted.clone()
    }

    pub fn submitted_count(&self, kind: RequestKind) -> usize {
        lock(&self.state)
            .submitted
            .iter()
            .filter(|request| request.kind == kind)
            .count()
    }

    pub fn parked_count(&self) -> usize {
        lock(&self.state).parked.len()
    }

    /// Answer the oldest parked request of `kind` with a completion code
    pub fn finish_parked(&self, kind: RequestKind, result: RequestResult) -> bool {
        let Some((request, callbacks)) = self.take_parked(kind) else {
            return false;
        };
        if result == RequestResult::Completed {
            match kind {
                RequestKind::Activation => self.enable_bundled_instance(),
                RequestKind::Deactivation => self.uninstall_all(),
                RequestKind::Properties => {}
            }
        }
        callbacks.finished(&request, result);
        true
    }

    /// Fail the oldest parked request of `kind`
    pub fn fail_parked(&self, kind: RequestKind, failure: RegistryFailure) -> bool {
        let Some((request, callbacks)) = self.take_parked(kind) else {
            return false;
        };
        callbacks.failed(&request, failure);
        true
    }

    /// Deliver a raw event on the callback channel of the most recent request
    pub fn emit(&self, event: RegistryEvent) {
        let callbacks = lock(&self.state).last_callbacks.clone();
        if let Some(callbacks) = callbacks {
            callbacks.send(event);
        }
    }

    /// The user approves the extension in the system settings
    ///
    /// Enables the awaiting instance and completes the parked activation
    /// request, which by now is unsolicited from the requester's view.
    pub fn approve(&self) {
        self.enable_bundled_instance();
        if let Some((request, callbacks)) = self.take_parked(RequestKind::Activation) {
            callbacks.finished(&request, RequestResult::Completed);
        }
        self.push(RegistryEvent::WillBecomeEnabled {
            identifier: self.identifier.clone(),
        });
    }

    /// The user disables the enabled extension in the system settings
    pub fn disable(&self) {
        {
            let mut state = lock(&self.state);
            for instance in state.instances.iter_mut() {
                if instance.activation == ActivationState::Enabled {
                    instance.activation = ActivationState::Disabled;
                }
            }
        }
        self.capture.unpublish_device();
        self.push(RegistryEvent::WillBecomeDisabled {
            identifier: self.identifier.clone(),
        });
    }

    /// A reboot purges uninstalling instances
    pub fn reboot(&self) {
        lock(&self.state)
            .instances
            .retain(|instance| instance.activation != ActivationState::Uninstalling);
    }

    fn push(&self, event: RegistryEvent) {
        if !self.push_notifications.load(Ordering::SeqCst) {
            return;
        }
        let observer = lock(&self.state).observers.get(&self.identifier).cloned();
        if let Some(callbacks) = observer {
            callbacks.send(event);
        }
    }

    fn take_parked(&self, kind: RequestKind) -> Option<(ExtensionRequest, RegistryCallbacks)> {
        let mut state = lock(&self.state);
        let index = state
            .parked
            .iter()
            .position(|(request, _)| request.kind == kind)?;
        Some(state.parked.remove(index))
    }

    fn bundled_instance(&self, activation: ActivationState) -> ExtensionProperties {
        ExtensionProperties::new(&self.identifier, &self.bundled_version, activation)
    }

    /// Install or enable the bundled version, replacing any other version
    fn enable_bundled_instance(&self) {
        let bundled = self.bundled_instance(ActivationState::Enabled);
        let mut replaced = Vec::new();
        {
            let mut state = lock(&self.state);
            let mut found = false;
            for instance in state.instances.iter_mut() {
                if instance.version == bundled.version {
                    if instance.activation != ActivationState::Uninstalling {
                        instance.activation = ActivationState::Enabled;
                        found = true;
                    }
                } else if instance.activation != ActivationState::Uninstalling {
                    replaced.push(instance.clone());
                    instance.activation = ActivationState::Uninstalling;
                }
            }
            if !found {
                state.instances.push(bundled.clone());
            }
        }
        for existing in replaced {
            self.emit(RegistryEvent::Replacing {
                existing,
                replacement: bundled.clone(),
            });
        }
        if self.publishes_device.load(Ordering::SeqCst) {
            self.capture.publish_device();
        }
    }

    fn park_awaiting_instance(&self) {
        let mut state = lock(&self.state);
        let bundled_version = super::BundleVersion::parse(&self.bundled_version);
        let existing = state.instances.iter_mut().find(|instance| {
            instance.version == bundled_version
                && instance.activation != ActivationState::Uninstalling
        });
        match existing {
            Some(instance) => {
                if instance.activation == ActivationState::Disabled {
                    instance.activation = ActivationState::AwaitingUserApproval;
                }
            }
            None => {
                let awaiting = self.bundled_instance(ActivationState::AwaitingUserApproval);
                state.instances.push(awaiting);
            }
        }
    }

    fn uninstall_all(&self) {
        {
            let mut state = lock(&self.state);
            for instance in state.instances.iter_mut() {
                instance.activation = ActivationState::Uninstalling;
            }
        }
        self.capture.unpublish_device();
        self.push(RegistryEvent::WillBecomeInactive {
            identifier: self.identifier.clone(),
        });
    }

    fn respond(&self, request: ExtensionRequest, callbacks: RegistryCallbacks, policy: ResponsePolicy) {
        match policy {
            ResponsePolicy::Complete => {
                match request.kind {
                    RequestKind::Activation => self.enable_bundled_instance(),
                    RequestKind::Deactivation => self.uninstall_all(),
                    RequestKind::Properties => {}
                }
                callbacks.finished(&request, RequestResult::Completed);
            }
            ResponsePolicy::NeedsApproval => {
                if request.kind == RequestKind::Activation {
                    self.park_awaiting_instance();
                }
                callbacks.needs_user_approval(&request);
                lock(&self.state).parked.push((request, callbacks));
            }
            ResponsePolicy::RequireReboot => {
                callbacks.finished(&request, RequestResult::WillCompleteAfterReboot);
            }
            ResponsePolicy::Fail(failure) => callbacks.failed(&request, failure),
            ResponsePolicy::Manual => lock(&self.state).parked.push((request, callbacks)),
        }
    }
}

impl ExtensionRegistry for SimulatedRegistry {
    fn submit(&self, request: ExtensionRequest, callbacks: RegistryCallbacks) {
        debug!(id = request.id.0, kind = %request.kind, "Simulated registry received request");

        let policy = {
            let mut state = lock(&self.state);
            state.submitted.push(request.clone());
            state.last_callbacks = Some(callbacks.clone());
            match request.kind {
                RequestKind::Activation => state.activation_policy.clone(),
                RequestKind::Deactivation => state.deactivation_policy.clone(),
                RequestKind::Properties => {
                    if let Some(failure) = state.properties_failure.clone() {
                        drop(state);
                        callbacks.failed(&request, failure);
                        return;
                    }
                    let found: Vec<ExtensionProperties> = state
                        .instances
                        .iter()
                        .filter(|instance| instance.identifier == request.identifier)
                        .cloned()
                        .collect();
                    drop(state);
                    callbacks.found_properties(&request, found);
                    return;
                }
            }
        };

        self.respond(request, callbacks, policy);
    }

    fn supports_push_notifications(&self) -> bool {
        self.push_notifications.load(Ordering::SeqCst)
    }

    fn start_observing(
        &self,
        identifier: &str,
        callbacks: RegistryCallbacks,
    ) -> Result<(), ExtensionError> {
        if !self.supports_push_notifications() {
            return Err(ExtensionError::ObservationFailed(
                "push notifications are not supported".to_string(),
            ));
        }
        lock(&self.state)
            .observers
            .insert(identifier.to_string(), callbacks);
        Ok(())
    }

    fn stop_observing(&self, identifier: &str) {
        lock(&self.state).observers.remove(identifier);
    }
}

/// The consumer side of a simulated sink queue
pub struct SimulatedQueue {
    stream: StreamId,
    capacity: usize,
    samples: Mutex<VecDeque<SampleBuffer>>,
    invalidated: AtomicBool,
    altered: Mutex<Option<QueueAlteredCallback>>,
}

impl SimulatedQueue {
    fn new(stream: StreamId, capacity: usize, altered: Option<QueueAlteredCallback>) -> Self {
        Self {
            stream,
            capacity,
            samples: Mutex::new(VecDeque::new()),
            invalidated: AtomicBool::new(false),
            altered: Mutex::new(altered),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.samples).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The driver removes the oldest sample, notifying the producer
    pub fn dequeue(&self) -> Option<SampleBuffer> {
        let sample = lock(&self.samples).pop_front();
        if sample.is_some() {
            let altered = lock(&self.altered).clone();
            if let Some(altered) = altered {
                altered(self.stream);
            }
        }
        sample
    }

    /// Make every further enqueue fail, as a torn down driver queue does
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    fn push(&self, sample: SampleBuffer) -> Result<(), StatusCode> {
        if self.is_invalidated() {
            return Err(status::QUEUE_INVALIDATED);
        }
        let mut samples = lock(&self.samples);
        if samples.len() >= self.capacity {
            return Err(status::QUEUE_FULL);
        }
        samples.push_back(sample);
        Ok(())
    }
}

/// Producer handle; releases queue ownership when dropped
struct QueueHandle {
    queue: Arc<SimulatedQueue>,
    owned: Arc<Mutex<HashSet<StreamId>>>,
}

impl BufferQueue for QueueHandle {
    fn enqueue(&self, sample: SampleBuffer) -> Result<(), StatusCode> {
        self.queue.push(sample)
    }
}

impl Drop for QueueHandle {
    fn drop(&mut self) {
        *lock(&self.queue.altered) = None;
        lock(&self.owned).remove(&self.queue.stream);
    }
}

struct Listener {
    stream: StreamId,
    selector: PropertySelector,
    callback: Arc<dyn Fn(String) + Send + Sync>,
}

#[derive(Default)]
struct CaptureState {
    device: Option<DeviceId>,
    streams: HashMap<String, StreamId>,
    properties: HashMap<(StreamId, PropertySelector), String>,
    listeners: HashMap<u64, Listener>,
    queues: HashMap<StreamId, Arc<SimulatedQueue>>,
    running: HashSet<StreamId>,
    listener_failure: Option<StatusCode>,
    queue_failure: Option<StatusCode>,
    start_failure: Option<StatusCode>,
}

/// Simulated media device layer hosting the extension's single device
pub struct SimulatedCaptureSystem {
    camera: CameraConfig,
    next_id: AtomicU64,
    owned: Arc<Mutex<HashSet<StreamId>>>,
    state: Mutex<CaptureState>,
}

impl SimulatedCaptureSystem {
    pub fn new(camera: CameraConfig) -> Self {
        Self {
            camera,
            next_id: AtomicU64::new(1),
            owned: Arc::new(Mutex::new(HashSet::new())),
            state: Mutex::new(CaptureState::default()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish the extension's device with its source and sink streams
    pub fn publish_device(&self) {
        let mut state = lock(&self.state);
        if state.device.is_some() {
            return;
        }
        let device = DeviceId(self.next_id() as u32);
        let source = StreamId(self.next_id() as u32);
        let sink = StreamId(self.next_id() as u32);
        state.device = Some(device);
        state
            .streams
            .insert(self.camera.source_stream_name.clone(), source);
        state.streams.insert(self.camera.sink_stream_name.clone(), sink);
        state
            .properties
            .insert((source, PropertySelector::StreamingClients), String::new());
        state
            .properties
            .insert((source, PropertySelector::Log), String::new());
        info!(device = device.0, "Simulated camera device published");
    }

    /// Remove the device; owned queues become invalid
    pub fn unpublish_device(&self) {
        let mut state = lock(&self.state);
        if state.device.take().is_none() {
            return;
        }
        state.streams.clear();
        state.running.clear();
        for queue in state.queues.values() {
            queue.invalidate();
        }
        info!("Simulated camera device removed");
    }

    pub fn is_published(&self) -> bool {
        lock(&self.state).device.is_some()
    }

    pub fn source_stream(&self) -> Option<StreamId> {
        lock(&self.state)
            .streams
            .get(&self.camera.source_stream_name)
            .copied()
    }

    pub fn sink_stream(&self) -> Option<StreamId> {
        lock(&self.state)
            .streams
            .get(&self.camera.sink_stream_name)
            .copied()
    }

    /// The most recently copied sink queue
    pub fn sink_queue(&self) -> Option<Arc<SimulatedQueue>> {
        let sink = self.sink_stream()?;
        lock(&self.state).queues.get(&sink).cloned()
    }

    pub fn is_streaming(&self) -> bool {
        match self.sink_stream() {
            Some(sink) => lock(&self.state).running.contains(&sink),
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    pub fn fail_listener_registration(&self, code: Option<StatusCode>) {
        lock(&self.state).listener_failure = code;
    }

    pub fn fail_queue_copy(&self, code: Option<StatusCode>) {
        lock(&self.state).queue_failure = code;
    }

    pub fn fail_stream_start(&self, code: Option<StatusCode>) {
        lock(&self.state).start_failure = code;
    }

    /// The driver reports a new set of streaming clients
    pub fn set_streaming_clients(&self, pids: &[i32]) {
        let value = pids
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(STREAMING_CLIENTS_SEPARATOR);
        if let Some(source) = self.source_stream() {
            self.set_property(source, PropertySelector::StreamingClients, value);
        }
    }

    /// The driver bulk-pushes log messages
    pub fn push_log(&self, messages: &[&str]) {
        let value = messages.join(constants::LOG_MESSAGES_SEPARATOR);
        if let Some(source) = self.source_stream() {
            self.set_property(source, PropertySelector::Log, value);
        }
    }

    /// Set a property and notify its listeners on the calling thread
    pub fn set_property(&self, stream: StreamId, selector: PropertySelector, value: String) {
        let callbacks: Vec<Arc<dyn Fn(String) + Send + Sync>> = {
            let mut state = lock(&self.state);
            state.properties.insert((stream, selector), value.clone());
            state
                .listeners
                .values()
                .filter(|listener| listener.stream == stream && listener.selector == selector)
                .map(|listener| Arc::clone(&listener.callback))
                .collect()
        };
        for callback in callbacks {
            callback(value.clone());
        }
    }
}

impl PropertySource for SimulatedCaptureSystem {
    fn read_property(
        &self,
        stream: StreamId,
        selector: PropertySelector,
    ) -> Result<String, StatusCode> {
        lock(&self.state)
            .properties
            .get(&(stream, selector))
            .cloned()
            .ok_or(status::BAD_OBJECT)
    }

    fn add_property_listener(
        &self,
        stream: StreamId,
        selector: PropertySelector,
        callback: PropertyCallback,
    ) -> Result<ListenerToken, StatusCode> {
        let token = self.next_id();
        let mut state = lock(&self.state);
        if let Some(code) = state.listener_failure {
            return Err(code);
        }
        if !state.properties.contains_key(&(stream, selector)) {
            return Err(status::BAD_OBJECT);
        }
        state.listeners.insert(
            token,
            Listener {
                stream,
                selector,
                callback: Arc::from(callback),
            },
        );
        Ok(ListenerToken(token))
    }

    fn remove_property_listener(&self, token: ListenerToken) {
        lock(&self.state).listeners.remove(&token.0);
    }
}

impl CaptureSystem for SimulatedCaptureSystem {
    fn device_id(&self, uuid: Uuid) -> Option<DeviceId> {
        if uuid != self.camera.device_uuid {
            return None;
        }
        lock(&self.state).device
    }

    fn stream_id(&self, device: DeviceId, name: &str) -> Option<StreamId> {
        let state = lock(&self.state);
        if state.device != Some(device) {
            return None;
        }
        state.streams.get(name).copied()
    }

    fn copy_buffer_queue(
        &self,
        stream: StreamId,
        altered: Option<QueueAlteredCallback>,
    ) -> Result<Box<dyn BufferQueue>, StatusCode> {
        let mut state = lock(&self.state);
        if let Some(code) = state.queue_failure {
            return Err(code);
        }
        if !state.streams.values().any(|s| *s == stream) {
            return Err(status::BAD_OBJECT);
        }
        let mut owned = lock(&self.owned);
        if !owned.insert(stream) {
            return Err(status::QUEUE_BUSY);
        }
        drop(owned);

        let queue = Arc::new(SimulatedQueue::new(
            stream,
            constants::DEFAULT_QUEUE_CAPACITY,
            altered,
        ));
        state.queues.insert(stream, Arc::clone(&queue));
        Ok(Box::new(QueueHandle {
            queue,
            owned: Arc::clone(&self.owned),
        }))
    }

    fn start_stream(&self, device: DeviceId, stream: StreamId) -> Result<(), StatusCode> {
        let mut state = lock(&self.state);
        if let Some(code) = state.start_failure {
            return Err(code);
        }
        if state.device != Some(device) {
            return Err(status::BAD_OBJECT);
        }
        state.running.insert(stream);
        Ok(())
    }

    fn stop_stream(&self, device: DeviceId, stream: StreamId) -> Result<(), StatusCode> {
        let mut state = lock(&self.state);
        if state.device != Some(device) {
            return Err(status::BAD_OBJECT);
        }
        state.running.remove(&stream);
        Ok(())
    }
}

/// Simulated capture authorization
pub struct SimulatedAuthorization {
    statuses: Mutex<HashMap<MediaKind, AuthorizationStatus>>,
    grant: AtomicBool,
    requests: AtomicU64,
}

impl SimulatedAuthorization {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            grant: AtomicBool::new(true),
            requests: AtomicU64::new(0),
        }
    }

    pub fn set_status(&self, kind: MediaKind, status: AuthorizationStatus) {
        lock(&self.statuses).insert(kind, status);
    }

    /// Whether the simulated user grants access when prompted
    pub fn set_grants(&self, grant: bool) {
        self.grant.store(grant, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedAuthorization {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationProvider for SimulatedAuthorization {
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus {
        lock(&self.statuses).get(&kind).copied().unwrap_or_default()
    }

    fn request_access(&self, kind: MediaKind) -> BoxFuture<'static, Result<bool, PermissionError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.grant.load(Ordering::SeqCst);
        let mut statuses = lock(&self.statuses);
        let status = statuses.entry(kind).or_default();
        if *status == AuthorizationStatus::NotDetermined {
            *status = if granted {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
        }
        let authorized = *status == AuthorizationStatus::Authorized;
        Box::pin(async move { Ok(authorized) })
    }
}

/// Records which settings panes were opened
#[derive(Default)]
pub struct SimulatedSettings {
    opened: Mutex<Vec<SettingsPane>>,
}

impl SimulatedSettings {
    pub fn opened(&self) -> Vec<SettingsPane> {
        lock(&self.opened).clone()
    }
}

impl SystemSettings for SimulatedSettings {
    fn open(&self, pane: SettingsPane) -> Result<(), PermissionError> {
        info!(?pane, "Simulated settings pane opened");
        lock(&self.opened).push(pane);
        Ok(())
    }
}

/// Fixed process table
#[derive(Default)]
pub struct SimulatedProcesses {
    processes: Mutex<HashMap<i32, ProcessInfo>>,
}

impl SimulatedProcesses {
    pub fn register(&self, pid: i32, name: &str, bundle_id: Option<&str>) {
        lock(&self.processes).insert(
            pid,
            ProcessInfo {
                name: name.to_string(),
                bundle_id: bundle_id.map(str::to_string),
            },
        );
    }
}

impl ProcessResolver for SimulatedProcesses {
    fn resolve(&self, pid: i32) -> Option<ProcessInfo> {
        lock(&self.processes).get(&pid).cloned()
    }
}

/// The complete simulated operating system
pub struct SimulatedSystem {
    pub registry: Arc<SimulatedRegistry>,
    pub capture: Arc<SimulatedCaptureSystem>,
    pub authorization: Arc<SimulatedAuthorization>,
    pub settings: Arc<SimulatedSettings>,
    pub processes: Arc<SimulatedProcesses>,
    pub app_events: ApplicationEvents,
}

impl SimulatedSystem {
    pub fn new(config: &Config) -> Self {
        let capture = Arc::new(SimulatedCaptureSystem::new(config.camera.clone()));
        let registry = Arc::new(SimulatedRegistry::new(
            &config.extension_identifier,
            &config.bundled_version.to_string(),
            Arc::clone(&capture),
        ));
        Self {
            registry,
            capture,
            authorization: Arc::new(SimulatedAuthorization::new()),
            settings: Arc::new(SimulatedSettings::default()),
            processes: Arc::new(SimulatedProcesses::default()),
            app_events: ApplicationEvents::new(),
        }
    }

    /// Start with the bundled extension already installed and enabled
    pub fn with_installed_extension(config: &Config) -> Self {
        let system = Self::new(config);
        system.registry.enable_bundled_instance();
        system
    }

    /// The platform handles the host components are built from
    pub fn platform(&self) -> Platform {
        Platform {
            registry: self.registry.clone(),
            capture: self.capture.clone(),
            authorization: self.authorization.clone(),
            settings: self.settings.clone(),
            processes: self.processes.clone(),
            app_events: self.app_events.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{VideoFormat, VideoFrame};
    use std::time::Duration;

    fn sample(config: &Config) -> SampleBuffer {
        let format: VideoFormat = config.video_format();
        SampleBuffer {
            format,
            presentation_time: Duration::ZERO,
            frame: VideoFrame::filled(format, 0),
        }
    }

    #[test]
    fn test_queue_ownership_is_exclusive() {
        let config = Config::default();
        let system = SimulatedSystem::with_installed_extension(&config);
        let sink = system.capture.sink_stream().unwrap();

        let first = system.capture.copy_buffer_queue(sink, None).unwrap();
        assert_eq!(
            system.capture.copy_buffer_queue(sink, None).err(),
            Some(status::QUEUE_BUSY)
        );
        drop(first);
        assert!(system.capture.copy_buffer_queue(sink, None).is_ok());
    }

    #[test]
    fn test_unpublish_invalidates_queue() {
        let config = Config::default();
        let system = SimulatedSystem::with_installed_extension(&config);
        let sink = system.capture.sink_stream().unwrap();
        let queue = system.capture.copy_buffer_queue(sink, None).unwrap();

        assert!(queue.enqueue(sample(&config)).is_ok());
        system.capture.unpublish_device();
        assert_eq!(
            queue.enqueue(sample(&config)),
            Err(status::QUEUE_INVALIDATED)
        );
    }

    #[test]
    fn test_activation_replaces_older_instance() {
        let config = Config::default();
        let system = SimulatedSystem::new(&config);
        system.registry.set_instances(vec![ExtensionProperties::new(
            &config.extension_identifier,
            "0.0.1",
            ActivationState::Enabled,
        )]);

        system.registry.enable_bundled_instance();

        let instances = system.registry.instances();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].activation, ActivationState::Uninstalling);
        assert_eq!(instances[1].activation, ActivationState::Enabled);
        assert!(system.capture.is_published());
    }

    #[test]
    fn test_listeners_receive_property_changes() {
        let config = Config::default();
        let system = SimulatedSystem::with_installed_extension(&config);
        let source = system.capture.source_stream().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        system
            .capture
            .add_property_listener(
                source,
                PropertySelector::StreamingClients,
                Box::new(move |value| sink.lock().unwrap().push(value)),
            )
            .unwrap();
        system.capture.set_streaming_clients(&[10, 20]);

        assert_eq!(*seen.lock().unwrap(), vec!["10,20".to_string()]);
    }
}
