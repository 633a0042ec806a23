// SPDX-License-Identifier: GPL-3.0-only

//! Re-emits driver log messages through `tracing`

use crate::constants::{EXTENSION_LOG_TARGET, THROTTLED_LOG_MESSAGE};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Default)]
struct ThrottleState {
    last_emitted: Option<Instant>,
    suppressed: u64,
}

/// Outcome of offering one message to the throttle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relayed {
    /// Emit the message, mentioning how many were suppressed before it
    Emit { suppressed: u64 },
    /// Drop the message
    Suppressed,
}

/// Relays driver log messages, throttling the noisy buffer retry message
pub struct ExtensionLogRelay {
    interval: Duration,
    state: Mutex<ThrottleState>,
}

impl ExtensionLogRelay {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Decide whether `message` is emitted at `now`
    pub fn offer(&self, message: &str, now: Instant) -> Relayed {
        if !message.contains(THROTTLED_LOG_MESSAGE) {
            return Relayed::Emit { suppressed: 0 };
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let due = state
            .last_emitted
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            let suppressed = std::mem::take(&mut state.suppressed);
            state.last_emitted = Some(now);
            Relayed::Emit { suppressed }
        } else {
            state.suppressed += 1;
            Relayed::Suppressed
        }
    }

    /// Emit `message` under the extension's log target unless throttled
    pub fn relay(&self, message: &str) {
        match self.offer(message, Instant::now()) {
            Relayed::Emit { suppressed: 0 } => {
                info!(target: EXTENSION_LOG_TARGET, "{message}");
            }
            Relayed::Emit { suppressed } => {
                info!(target: EXTENSION_LOG_TARGET, suppressed, "{message} (repeated {suppressed} times)");
            }
            Relayed::Suppressed => {}
        }
    }
}
