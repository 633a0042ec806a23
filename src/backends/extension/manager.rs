// SPDX-License-Identifier: GPL-3.0-only

//! Extension lifecycle manager
//!
//! Bridges the registry's callback based request API into awaitable results.
//! The registry is not reentrant, so every request goes through a single
//! slot: a request submitted while another one is pending waits until the
//! slot frees up.
//!
//! ```text
//!  request_activation ─┐
//!  request_deactivation┼─▶ slot (one pending request) ─▶ ExtensionRegistry
//!  current_state ──────┘          ▲                            │
//!                                 │ resolve                    │ callbacks
//!                                 │                            ▼
//!  delegate ◀── unsolicited ── event pump ◀──── RegistryCallbacks (any thread)
//! ```

use super::observer::{StateObservation, observation_for};
use super::state::{ExtensionState, derive_state};
use crate::config::Config;
use crate::errors::ExtensionError;
use crate::platform::{
    BundleVersion, ExtensionProperties, ExtensionRegistry, ExtensionRequest, Platform,
    RegistryCallbacks, RegistryEvent, RequestId, RequestKind, RequestResult,
};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Receives everything the lifecycle manager learns outside of a request
pub trait ExtensionManagerDelegate: Send + Sync {
    /// The extension state changed without anyone asking
    fn did_update_extension_state(&self, state: ExtensionState);

    fn did_fail_with_error(&self, error: ExtensionError);

    /// The registry replaces one installed instance with another
    fn replaces_extension(&self, existing: &ExtensionProperties, replacement: &ExtensionProperties);
}

/// What a resolved request carries
#[derive(Debug)]
enum Outcome {
    State(ExtensionState),
    Properties(Vec<ExtensionProperties>),
}

type Responder = oneshot::Sender<Result<Outcome, ExtensionError>>;

type Flight = Shared<BoxFuture<'static, Result<ExtensionState, ExtensionError>>>;

struct PendingRequest {
    request: ExtensionRequest,
    responder: Responder,
}

struct Slot {
    pending: Option<PendingRequest>,
    next_id: u64,
    /// Bumped whenever outstanding requests are canceled
    generation: u64,
    shut_down: bool,
    delegate: Option<Arc<dyn ExtensionManagerDelegate>>,
    activation: Option<Flight>,
    deactivation: Option<Flight>,
}

struct Inner {
    registry: Arc<dyn ExtensionRegistry>,
    identifier: String,
    bundled_version: BundleVersion,
    poll_interval: Duration,
    callbacks: RegistryCallbacks,
    observation: Box<dyn StateObservation>,
    slot: Mutex<Slot>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.observation.stop();
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(pump) = pump {
            pump.abort();
        }
    }
}

/// Serializes lifecycle requests for one camera extension
///
/// Cheap to clone; all clones share the same request slot.
#[derive(Clone)]
pub struct ExtensionLifecycleManager {
    inner: Arc<Inner>,
}

/// Non-owning handle to a lifecycle manager
#[derive(Clone)]
pub struct WeakLifecycleManager {
    inner: Weak<Inner>,
}

impl WeakLifecycleManager {
    pub fn upgrade(&self) -> Option<ExtensionLifecycleManager> {
        self.inner
            .upgrade()
            .map(|inner| ExtensionLifecycleManager { inner })
    }
}

impl ExtensionLifecycleManager {
    /// Create the manager and its event pump
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(platform: &Platform, config: &Config) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let callbacks = RegistryCallbacks::new(sender);
        let observation = observation_for(
            config.observation,
            platform.registry.clone(),
            &config.extension_identifier,
            callbacks.clone(),
            platform.app_events.clone(),
        );
        info!(
            identifier = %config.extension_identifier,
            bundled = %config.bundled_version,
            observation = observation.name(),
            "Creating extension lifecycle manager"
        );

        let inner = Arc::new(Inner {
            registry: platform.registry.clone(),
            identifier: config.extension_identifier.clone(),
            bundled_version: config.bundled_version.clone(),
            poll_interval: config.request_poll_interval(),
            callbacks,
            observation,
            slot: Mutex::new(Slot {
                pending: None,
                next_id: 1,
                generation: 0,
                shut_down: false,
                delegate: None,
                activation: None,
                deactivation: None,
            }),
            pump: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let pump = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                ExtensionLifecycleManager { inner }.handle_event(event);
            }
            debug!("Registry event pump finished");
        });
        *inner
            .pump
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(pump);

        Self { inner }
    }

    pub fn downgrade(&self) -> WeakLifecycleManager {
        WeakLifecycleManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    pub fn bundled_version(&self) -> &BundleVersion {
        &self.inner.bundled_version
    }

    /// Attach the delegate and start observing unsolicited state changes
    pub fn start(&self, delegate: Arc<dyn ExtensionManagerDelegate>) -> Result<(), ExtensionError> {
        {
            let mut slot = self.inner.slot();
            slot.delegate = Some(delegate);
            slot.shut_down = false;
        }
        self.inner.observation.start(self.downgrade())
    }

    /// Stop observing, detach the delegate and cancel outstanding requests
    ///
    /// Callers waiting for a request observe [`ExtensionError::Canceled`].
    pub fn stop(&self) {
        self.inner.observation.stop();
        let pending = {
            let mut slot = self.inner.slot();
            slot.delegate = None;
            slot.generation += 1;
            slot.activation = None;
            slot.deactivation = None;
            slot.pending.take()
        };
        if let Some(pending) = pending {
            info!(id = pending.request.id.0, kind = %pending.request.kind, "Canceling pending extension request");
        }
    }

    /// Like [`stop`](Self::stop), and reject every later request
    pub fn shutdown(&self) {
        self.inner.slot().shut_down = true;
        self.stop();
    }

    /// Query the registry and derive the current state
    pub async fn current_state(&self) -> Result<ExtensionState, ExtensionError> {
        let properties = self.extension_properties().await?;
        let state = derive_state(&properties, &self.inner.bundled_version);
        debug!(%state, instances = properties.len(), "Derived extension state");
        Ok(state)
    }

    /// Every installed instance of the extension
    pub async fn extension_properties(&self) -> Result<Vec<ExtensionProperties>, ExtensionError> {
        match self.submit(RequestKind::Properties).await? {
            Outcome::Properties(properties) => {
                for instance in &properties {
                    debug!(version = %instance.version_description(), "Found extension instance");
                }
                Ok(properties)
            }
            Outcome::State(_) => Err(ExtensionError::InconsistentUpdate),
        }
    }

    pub async fn installed_instance_count(&self) -> Result<usize, ExtensionError> {
        Ok(self.extension_properties().await?.len())
    }

    /// Install, update or re-enable the extension
    ///
    /// Concurrent callers share one request and all observe its result.
    pub async fn request_activation(&self) -> Result<ExtensionState, ExtensionError> {
        self.join_flight(RequestKind::Activation).await
    }

    /// Uninstall the extension
    ///
    /// Concurrent callers share one request and all observe its result.
    pub async fn request_deactivation(&self) -> Result<ExtensionState, ExtensionError> {
        self.join_flight(RequestKind::Deactivation).await
    }

    fn join_flight(&self, kind: RequestKind) -> Flight {
        let mut guard = self.inner.slot();
        let slot = &mut *guard;
        let existing = match kind {
            RequestKind::Activation => &mut slot.activation,
            _ => &mut slot.deactivation,
        };
        if let Some(flight) = existing {
            debug!(%kind, "Joining request already in flight");
            return flight.clone();
        }

        let generation = slot.generation;
        let manager = self.clone();
        let flight = async move {
            let result = match kind {
                RequestKind::Activation => manager.activate().await,
                _ => manager.deactivate().await,
            };
            manager.land_flight(kind, generation);
            result
        }
        .boxed()
        .shared();
        *existing = Some(flight.clone());
        flight
    }

    /// Clear the stored flight unless it was replaced after a `stop`
    fn land_flight(&self, kind: RequestKind, generation: u64) {
        let mut slot = self.inner.slot();
        if slot.generation != generation {
            return;
        }
        match kind {
            RequestKind::Activation => slot.activation = None,
            _ => slot.deactivation = None,
        }
    }

    async fn activate(&self) -> Result<ExtensionState, ExtensionError> {
        let state = self.current_state().await?;
        if !state.allows_installation() {
            info!(%state, "Activation is not available");
            return Err(ExtensionError::RequestUnavailableInState(Box::new(state)));
        }

        info!(%state, "Requesting extension activation");
        let mut result = self.submit_for_state(RequestKind::Activation).await?;
        if result == ExtensionState::Installed {
            // Completion is reported for enabled and disabled extensions alike
            result = self.current_state().await?;
        }

        if result.is_unexpected_after_activation() {
            warn!(%result, "Unexpected state after activation");
            return Err(ExtensionError::UnexpectedState(Box::new(result)));
        }
        Ok(result)
    }

    async fn deactivate(&self) -> Result<ExtensionState, ExtensionError> {
        let state = self.current_state().await?;
        if !state.allows_uninstallation() {
            info!(%state, "Deactivation is not available");
            return Err(ExtensionError::RequestUnavailableInState(Box::new(state)));
        }

        info!(%state, "Requesting extension deactivation");
        let result = self.submit_for_state(RequestKind::Deactivation).await?;
        if result.is_unexpected_after_deactivation() {
            warn!(%result, "Unexpected state after deactivation");
            return Err(ExtensionError::UnexpectedState(Box::new(result)));
        }
        Ok(result)
    }

    async fn submit_for_state(&self, kind: RequestKind) -> Result<ExtensionState, ExtensionError> {
        match self.submit(kind).await? {
            Outcome::State(ExtensionState::Error(e)) => Err(e),
            Outcome::State(ExtensionState::Unknown) => Err(ExtensionError::UnknownState),
            Outcome::State(state) => Ok(state),
            Outcome::Properties(_) => Err(ExtensionError::InconsistentUpdate),
        }
    }

    /// Wait for the slot, submit, and wait for the registry's answer
    async fn submit(&self, kind: RequestKind) -> Result<Outcome, ExtensionError> {
        let generation = self.inner.slot().generation;

        let (request, receiver) = loop {
            {
                let mut slot = self.inner.slot();
                if slot.shut_down || slot.generation != generation {
                    return Err(ExtensionError::Canceled);
                }
                if slot.pending.is_none() {
                    let request = ExtensionRequest {
                        id: RequestId(slot.next_id),
                        kind,
                        identifier: self.inner.identifier.clone(),
                    };
                    slot.next_id += 1;
                    let (responder, receiver) = oneshot::channel();
                    slot.pending = Some(PendingRequest {
                        request: request.clone(),
                        responder,
                    });
                    break (request, receiver);
                }
            }
            tokio::time::sleep(self.inner.poll_interval).await;
        };

        debug!(id = request.id.0, %kind, "Submitting extension request");
        self.inner
            .registry
            .submit(request, self.inner.callbacks.clone());

        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExtensionError::Canceled),
        }
    }

    /// Forward an informational state to the delegate
    pub fn report_state(&self, state: ExtensionState) {
        let delegate = self.inner.slot().delegate.clone();
        match delegate {
            Some(delegate) => delegate.did_update_extension_state(state),
            None => debug!(%state, "No delegate for extension state update"),
        }
    }

    /// Forward an error to the delegate
    pub fn report_error(&self, error: ExtensionError) {
        let delegate = self.inner.slot().delegate.clone();
        match delegate {
            Some(delegate) => delegate.did_fail_with_error(error),
            None => debug!(?error, "No delegate for extension error"),
        }
    }

    fn handle_event(&self, event: RegistryEvent) {
        match event {
            RegistryEvent::NeedsUserApproval(request) => {
                info!(id = request.id.0, "Extension request needs user approval");
                self.resolve(
                    &request,
                    Ok(Outcome::State(ExtensionState::AwaitingUserApproval)),
                );
            }
            RegistryEvent::Finished(request, result) => {
                info!(id = request.id.0, ?result, "Extension request finished");
                let outcome = finished_state(request.kind, result).map(Outcome::State);
                self.resolve(&request, outcome);
            }
            RegistryEvent::Failed(request, failure) => {
                warn!(id = request.id.0, ?failure, "Extension request failed");
                self.resolve(&request, Err(failure.into()));
            }
            RegistryEvent::FoundProperties(request, properties) => {
                let outcome = match request.kind {
                    RequestKind::Properties => Ok(Outcome::Properties(properties)),
                    _ => Err(ExtensionError::InconsistentUpdate),
                };
                self.resolve(&request, outcome);
            }
            RegistryEvent::Replacing {
                existing,
                replacement,
            } => {
                let delegate = self.inner.slot().delegate.clone();
                if let Some(delegate) = delegate {
                    delegate.replaces_extension(&existing, &replacement);
                }
            }
            RegistryEvent::WillBecomeEnabled { identifier } => {
                if self.is_own(&identifier) {
                    self.report_state(ExtensionState::Installed);
                }
            }
            RegistryEvent::WillBecomeDisabled { identifier } => {
                if self.is_own(&identifier) {
                    self.report_state(ExtensionState::AwaitingUserApproval);
                }
            }
            RegistryEvent::WillBecomeInactive { identifier } => {
                if self.is_own(&identifier) {
                    let manager = self.clone();
                    tokio::spawn(async move {
                        // Inactive is also reported for extensions that were
                        // just installed and still wait for approval
                        let state = match manager.current_state().await {
                            Ok(ExtensionState::AwaitingUserApproval) => {
                                ExtensionState::AwaitingUserApproval
                            }
                            Ok(_) => ExtensionState::Uninstalling,
                            Err(e) => {
                                debug!(?e, "Dropping inactive notice, state query failed");
                                return;
                            }
                        };
                        manager.report_state(state);
                    });
                }
            }
        }
    }

    fn is_own(&self, identifier: &str) -> bool {
        if identifier != self.inner.identifier {
            debug!(identifier, "Ignoring notification for another extension");
            return false;
        }
        true
    }

    /// Hand a registry answer to the waiting request, or to the delegate
    fn resolve(&self, request: &ExtensionRequest, outcome: Result<Outcome, ExtensionError>) {
        let pending = {
            let mut slot = self.inner.slot();
            match slot.pending.take() {
                Some(pending) if pending.request.id == request.id => Some(pending),
                Some(pending) => {
                    let expected = pending.request.id.0;
                    slot.pending = Some(pending);
                    drop(slot);
                    warn!(
                        id = request.id.0,
                        expected, "Dropping update for a request other than the pending one"
                    );
                    self.report_error(ExtensionError::NonCriticalInconsistentUpdate);
                    return;
                }
                None => None,
            }
        };

        match pending {
            Some(pending) => {
                if pending.responder.send(outcome).is_err() {
                    debug!(id = request.id.0, "Requester is gone");
                }
            }
            None => match outcome {
                Ok(Outcome::State(state)) => {
                    info!(%state, kind = %request.kind, "Unsolicited extension update");
                    self.report_state(state);
                }
                Ok(Outcome::Properties(_)) => {
                    self.report_error(ExtensionError::InconsistentUpdate);
                }
                Err(e) => {
                    error!(?e, kind = %request.kind, "Unsolicited extension failure");
                    self.report_error(e);
                }
            },
        }
    }
}

fn finished_state(kind: RequestKind, result: RequestResult) -> Result<ExtensionState, ExtensionError> {
    match (kind, result) {
        (_, RequestResult::WillCompleteAfterReboot) => Ok(ExtensionState::RequiresReboot),
        (RequestKind::Activation, RequestResult::Completed) => Ok(ExtensionState::Installed),
        (RequestKind::Deactivation, RequestResult::Completed) => Ok(ExtensionState::Uninstalling),
        (RequestKind::Properties, RequestResult::Completed) => {
            Err(ExtensionError::InconsistentUpdate)
        }
    }
}
