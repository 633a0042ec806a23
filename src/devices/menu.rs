// SPDX-License-Identifier: GPL-3.0-only

//! Menu item policy for the extension actions

use crate::backends::extension::ExtensionState;
use serde::Serialize;

/// The parts of a menu item the policy controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub title: String,
    pub hidden: bool,
    pub enabled: bool,
}

fn enables_activation(state: &ExtensionState) -> bool {
    !matches!(
        state,
        ExtensionState::Unknown | ExtensionState::Installing | ExtensionState::Installed
    )
}

fn enables_deactivation(state: &ExtensionState) -> bool {
    matches!(
        state,
        ExtensionState::Installing
            | ExtensionState::Installed
            | ExtensionState::AwaitingUserApproval
            | ExtensionState::Disabled
            | ExtensionState::NeedsUpdate
            | ExtensionState::RequiresReboot
    )
}

/// Update the install/approve/update item; returns whether it is enabled
///
/// The title is left alone in states where the item is hidden.
pub fn update_activation_menu_item(
    state: &ExtensionState,
    product_name: &str,
    item: &mut MenuItem,
) -> bool {
    let title = match state {
        ExtensionState::Unknown | ExtensionState::Installing | ExtensionState::Installed => None,
        ExtensionState::NotInstalled | ExtensionState::Uninstalling | ExtensionState::Error(_) => {
            Some(format!("Install {product_name}…"))
        }
        ExtensionState::AwaitingUserApproval | ExtensionState::Disabled => {
            Some(format!("Approve {product_name}…"))
        }
        ExtensionState::NeedsUpdate => Some(format!("Update {product_name}…")),
        ExtensionState::RequiresReboot => Some(format!("Reboot to use {product_name}…")),
    };
    if let Some(title) = title {
        item.title = title;
    }

    let enabled = enables_activation(state);
    item.hidden = !enabled;
    item.enabled = enabled;
    enabled
}

/// Update the uninstall item; returns whether it is enabled
pub fn update_deactivation_menu_item(
    state: &ExtensionState,
    product_name: &str,
    item: &mut MenuItem,
) -> bool {
    let enabled = enables_deactivation(state);
    if enabled {
        item.title = format!("Uninstall {product_name}…");
    }
    item.hidden = !enabled;
    item.enabled = enabled;
    enabled
}
