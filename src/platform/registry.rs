// SPDX-License-Identifier: GPL-3.0-only

//! System extension registry seam
//!
//! The registry is the operating system authority that installs, enables and
//! removes privileged extensions. Requests are submitted fire-and-forget; the
//! outcome arrives later through [`RegistryCallbacks`], possibly on a platform
//! callback thread.

use crate::errors::{ExtensionError, StatusCode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tokio::sync::mpsc;

/// Identity of one submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// The kind of a registry request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Activation,
    Deactivation,
    Properties,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Activation => write!(f, "activation"),
            RequestKind::Deactivation => write!(f, "deactivation"),
            RequestKind::Properties => write!(f, "properties"),
        }
    }
}

/// A request handed to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    /// Bundle identifier of the extension the request is about
    pub identifier: String,
}

/// Completion code of an activation or deactivation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResult {
    /// The request took effect
    Completed,
    /// The request takes effect after the next reboot
    WillCompleteAfterReboot,
}

/// Activation state the registry records for one installed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Enabled,
    Disabled,
    AwaitingUserApproval,
    Uninstalling,
}

/// Dotted numeric bundle version, e.g. `1.4.12`
///
/// Missing trailing components compare as zero, so `1.4` equals `1.4.0`.
#[derive(Debug, Clone, Default, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BundleVersion(Vec<u32>);

impl BundleVersion {
    /// Parse a version string, ignoring non-numeric suffixes of components
    pub fn parse(version: &str) -> Self {
        let components = version
            .trim()
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .collect();
        Self(components)
    }

    fn component(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl PartialEq for BundleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for BundleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for BundleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BundleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl From<String> for BundleVersion {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for BundleVersion {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<BundleVersion> for String {
    fn from(value: BundleVersion) -> Self {
        value.to_string()
    }
}

/// Properties of one installed extension instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionProperties {
    pub identifier: String,
    pub version: BundleVersion,
    pub short_version: String,
    pub activation: ActivationState,
}

impl ExtensionProperties {
    pub fn new(identifier: &str, version: &str, activation: ActivationState) -> Self {
        Self {
            identifier: identifier.to_string(),
            version: BundleVersion::parse(version),
            short_version: version.to_string(),
            activation,
        }
    }

    /// Human readable description used in logs
    pub fn version_description(&self) -> String {
        format!("{} ({:?})", self.version, self.activation)
    }
}

/// Failure reported by the registry for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryFailure {
    /// The user did not authorize the request
    AuthorizationRequired,
    /// Any other failure
    Other { code: StatusCode, message: String },
}

impl From<RegistryFailure> for ExtensionError {
    fn from(failure: RegistryFailure) -> Self {
        match failure {
            RegistryFailure::AuthorizationRequired => ExtensionError::AuthorizationRequired,
            RegistryFailure::Other { code, message } => {
                ExtensionError::RequestFailed { code, message }
            }
        }
    }
}

/// Everything the registry can report back
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// The request is parked until the user approves the extension
    NeedsUserApproval(ExtensionRequest),
    /// The request finished with a completion code
    Finished(ExtensionRequest, RequestResult),
    /// The request failed
    Failed(ExtensionRequest, RegistryFailure),
    /// Answer to a properties request
    FoundProperties(ExtensionRequest, Vec<ExtensionProperties>),
    /// The registry replaces an installed instance with another one
    Replacing {
        existing: ExtensionProperties,
        replacement: ExtensionProperties,
    },
    /// Push notification: the extension was approved and will run
    WillBecomeEnabled { identifier: String },
    /// Push notification: the extension was disabled or is installed disabled
    WillBecomeDisabled { identifier: String },
    /// Push notification: the extension was deactivated and will be removed
    WillBecomeInactive { identifier: String },
}

/// Callback handle given to the registry
///
/// Cheap to clone and callable from any thread; every call is handed off to
/// the owning lifecycle manager's serialized context.
#[derive(Debug, Clone)]
pub struct RegistryCallbacks {
    sender: mpsc::UnboundedSender<RegistryEvent>,
}

impl RegistryCallbacks {
    pub fn new(sender: mpsc::UnboundedSender<RegistryEvent>) -> Self {
        Self { sender }
    }

    /// Deliver an event; events sent after the manager is gone are dropped
    pub fn send(&self, event: RegistryEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Registry event dropped, lifecycle manager is gone");
        }
    }

    pub fn needs_user_approval(&self, request: &ExtensionRequest) {
        self.send(RegistryEvent::NeedsUserApproval(request.clone()));
    }

    pub fn finished(&self, request: &ExtensionRequest, result: RequestResult) {
        self.send(RegistryEvent::Finished(request.clone(), result));
    }

    pub fn failed(&self, request: &ExtensionRequest, failure: RegistryFailure) {
        self.send(RegistryEvent::Failed(request.clone(), failure));
    }

    pub fn found_properties(&self, request: &ExtensionRequest, properties: Vec<ExtensionProperties>) {
        self.send(RegistryEvent::FoundProperties(request.clone(), properties));
    }
}

/// The operating system's extension management facility
pub trait ExtensionRegistry: Send + Sync {
    /// Submit a request; the outcome is reported through `callbacks`
    ///
    /// Implementations are not required to be reentrant: callers must not
    /// have more than one request in flight.
    fn submit(&self, request: ExtensionRequest, callbacks: RegistryCallbacks);

    /// Whether the registry can push state change notifications
    fn supports_push_notifications(&self) -> bool;

    /// Start pushing state change notifications for `identifier`
    fn start_observing(
        &self,
        identifier: &str,
        callbacks: RegistryCallbacks,
    ) -> Result<(), ExtensionError>;

    /// Stop pushing state change notifications for `identifier`
    fn stop_observing(&self, identifier: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(BundleVersion::parse("1.2.10") > BundleVersion::parse("1.2.9"));
        assert!(BundleVersion::parse("2") > BundleVersion::parse("1.99.99"));
        assert_eq!(BundleVersion::parse("1.4"), BundleVersion::parse("1.4.0"));
        assert!(BundleVersion::parse("1.4.1") > BundleVersion::parse("1.4"));
    }

    #[test]
    fn test_version_tolerates_suffixes() {
        assert_eq!(BundleVersion::parse("3.1b2"), BundleVersion::parse("3.1"));
        assert_eq!(BundleVersion::parse("").to_string(), "0");
    }

    #[test]
    fn test_failure_conversion() {
        let err: ExtensionError = RegistryFailure::AuthorizationRequired.into();
        assert_eq!(err, ExtensionError::AuthorizationRequired);

        let err: ExtensionError = RegistryFailure::Other {
            code: 4,
            message: "missing entitlement".into(),
        }
        .into();
        assert!(matches!(err, ExtensionError::RequestFailed { code: 4, .. }));
    }
}
