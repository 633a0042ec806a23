// SPDX-License-Identifier: GPL-3.0-only

//! Camera extension lifecycle
//!
//! - [`state`]: the derived [`ExtensionState`] and instance relevance
//! - [`manager`]: request serialization against the extension registry
//! - [`observer`]: unsolicited change observation and the approval watchdog

pub mod manager;
pub mod observer;
pub mod state;

pub use manager::{ExtensionLifecycleManager, ExtensionManagerDelegate, WeakLifecycleManager};
pub use observer::{
    ForegroundObservation, NotificationWatchdog, PushObservation, StateObservation,
};
pub use state::{ExtensionState, derive_state, most_relevant};
