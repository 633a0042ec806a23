// SPDX-License-Identifier: GPL-3.0-only

//! Extension state model
//!
//! The registry only knows four activation flags per installed instance.
//! [`derive_state`] turns a list of instances into one [`ExtensionState`].

use crate::errors::ExtensionError;
use crate::platform::{ActivationState, BundleVersion, ExtensionProperties};
use std::cmp::Ordering;
use std::fmt;

/// Lifecycle state of the camera extension
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtensionState {
    #[default]
    Unknown,
    NotInstalled,
    AwaitingUserApproval,
    Installing,
    Installed,
    Disabled,
    RequiresReboot,
    NeedsUpdate,
    Uninstalling,
    Error(ExtensionError),
}

impl ExtensionState {
    /// States an activation request may be submitted in
    pub fn allows_installation(&self) -> bool {
        matches!(
            self,
            ExtensionState::AwaitingUserApproval
                | ExtensionState::Disabled
                | ExtensionState::Error(_)
                | ExtensionState::NeedsUpdate
                | ExtensionState::NotInstalled
                | ExtensionState::Uninstalling
                | ExtensionState::Unknown
        )
    }

    /// States a deactivation request may be submitted in
    pub fn allows_uninstallation(&self) -> bool {
        matches!(
            self,
            ExtensionState::Installing | ExtensionState::Installed | ExtensionState::RequiresReboot
        )
    }

    /// Results that make no sense right after an activation request
    pub fn is_unexpected_after_activation(&self) -> bool {
        matches!(
            self,
            ExtensionState::Unknown | ExtensionState::Uninstalling | ExtensionState::NotInstalled
        )
    }

    /// Results that make no sense right after a deactivation request
    pub fn is_unexpected_after_deactivation(&self) -> bool {
        matches!(
            self,
            ExtensionState::AwaitingUserApproval
                | ExtensionState::Disabled
                | ExtensionState::Unknown
                | ExtensionState::NeedsUpdate
                | ExtensionState::Installing
                | ExtensionState::Installed
        )
    }

    pub fn error(&self) -> Option<&ExtensionError> {
        match self {
            ExtensionState::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Stable identifier used in analytics payloads
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionState::Unknown => "unknown",
            ExtensionState::NotInstalled => "not_installed",
            ExtensionState::AwaitingUserApproval => "awaiting_user_approval",
            ExtensionState::Installing => "installing",
            ExtensionState::Installed => "installed",
            ExtensionState::Disabled => "disabled",
            ExtensionState::RequiresReboot => "requires_reboot",
            ExtensionState::NeedsUpdate => "needs_update",
            ExtensionState::Uninstalling => "uninstalling",
            ExtensionState::Error(_) => "error",
        }
    }
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionState::Error(e) => write!(f, "error ({e})"),
            other => write!(f, "{}", other.name().replace('_', " ")),
        }
    }
}

fn activation_rank(activation: ActivationState) -> u8 {
    match activation {
        ActivationState::Enabled => 3,
        ActivationState::AwaitingUserApproval => 2,
        ActivationState::Disabled => 1,
        ActivationState::Uninstalling => 0,
    }
}

fn relevance(a: &ExtensionProperties, b: &ExtensionProperties, bundled: &BundleVersion) -> Ordering {
    let live = |p: &ExtensionProperties| p.activation != ActivationState::Uninstalling;
    let current = |p: &ExtensionProperties| p.version >= *bundled;

    live(a)
        .cmp(&live(b))
        .then_with(|| current(a).cmp(&current(b)))
        .then_with(|| activation_rank(a.activation).cmp(&activation_rank(b.activation)))
        .then_with(|| a.version.cmp(&b.version))
}

/// Pick the instance that describes the extension's state best
///
/// Instances being uninstalled rank last. Among the others, an instance at
/// or above the bundled version wins over an older one, then enabled wins
/// over awaiting approval over disabled, then the higher version wins.
pub fn most_relevant<'a>(
    instances: &'a [ExtensionProperties],
    bundled: &BundleVersion,
) -> Option<&'a ExtensionProperties> {
    instances.iter().max_by(|a, b| relevance(a, b, bundled))
}

/// Derive the extension state from every installed instance
pub fn derive_state(instances: &[ExtensionProperties], bundled: &BundleVersion) -> ExtensionState {
    let Some(instance) = most_relevant(instances, bundled) else {
        return ExtensionState::NotInstalled;
    };

    match instance.activation {
        ActivationState::Enabled if instance.version < *bundled => ExtensionState::NeedsUpdate,
        ActivationState::Enabled => ExtensionState::Installed,
        ActivationState::Disabled => ExtensionState::Disabled,
        ActivationState::AwaitingUserApproval => ExtensionState::AwaitingUserApproval,
        ActivationState::Uninstalling => ExtensionState::Uninstalling,
    }
}
