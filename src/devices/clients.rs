// SPDX-License-Identifier: GPL-3.0-only

//! Streaming client bookkeeping

use crate::constants::UNRESOLVED_APPLICATION_NAME;
use crate::platform::ProcessResolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An external process pulling frames from the virtual camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingClient {
    pub pid: i32,
    pub app_name: String,
    pub bundle_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl StreamingClient {
    /// Describe `pid`, falling back to a generic name if it cannot be resolved
    pub fn resolve(pid: i32, resolver: &dyn ProcessResolver, connected_at: DateTime<Utc>) -> Self {
        match resolver.resolve(pid) {
            Some(info) => Self {
                pid,
                app_name: info.name,
                bundle_id: info.bundle_id,
                connected_at,
            },
            None => Self {
                pid,
                app_name: UNRESOLVED_APPLICATION_NAME.to_string(),
                bundle_id: None,
                connected_at,
            },
        }
    }

    /// The host process itself, used for synthetic notifications
    pub fn host(resolver: &dyn ProcessResolver) -> Self {
        let pid = std::process::id() as i32;
        let mut client = Self::resolve(pid, resolver, Utc::now());
        if client.bundle_id.is_none() && client.app_name == UNRESOLVED_APPLICATION_NAME {
            client.app_name = env!("CARGO_PKG_NAME").to_string();
        }
        client
    }

    /// JSON payload handed to collaborators
    pub fn details_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A change in the set of streaming clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected {
        client: StreamingClient,
        /// The first client of a previously empty set
        is_first: bool,
    },
    Disconnected {
        client: StreamingClient,
        /// The last client, leaving the set empty
        is_last: bool,
    },
}

impl ClientEvent {
    pub fn client(&self) -> &StreamingClient {
        match self {
            ClientEvent::Connected { client, .. } | ClientEvent::Disconnected { client, .. } => {
                client
            }
        }
    }
}

/// The tracked set of streaming clients
///
/// Always rebuilt from the driver's latest snapshot: clients still present
/// keep their position and details, new ones are appended in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct ClientTracker {
    clients: Vec<StreamingClient>,
}

impl ClientTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clients(&self) -> &[StreamingClient] {
        &self.clients
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Apply a snapshot of process identifiers, returning what changed
    ///
    /// Disconnects are reported before connects.
    pub fn update(
        &mut self,
        pids: &[i32],
        resolver: &dyn ProcessResolver,
        now: DateTime<Utc>,
    ) -> Vec<ClientEvent> {
        let mut seen = HashSet::new();
        let snapshot: Vec<i32> = pids.iter().copied().filter(|pid| seen.insert(*pid)).collect();
        let was_empty = self.clients.is_empty();

        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.clients)
            .into_iter()
            .partition(|client| snapshot.contains(&client.pid));
        let added: Vec<StreamingClient> = snapshot
            .iter()
            .filter(|pid| !kept.iter().any(|client| client.pid == **pid))
            .map(|pid| StreamingClient::resolve(*pid, resolver, now))
            .collect();

        let mut events = Vec::with_capacity(removed.len() + added.len());
        let removed_count = removed.len();
        for (index, client) in removed.into_iter().enumerate() {
            events.push(ClientEvent::Disconnected {
                client,
                is_last: snapshot.is_empty() && index + 1 == removed_count,
            });
        }
        for (index, client) in added.iter().enumerate() {
            events.push(ClientEvent::Connected {
                client: client.clone(),
                is_first: was_empty && index == 0,
            });
        }

        self.clients = kept;
        self.clients.extend(added);
        events
    }

    /// Connect notifications replaying the current set
    pub fn replay_connected(&self) -> Vec<ClientEvent> {
        self.clients
            .iter()
            .enumerate()
            .map(|(index, client)| ClientEvent::Connected {
                client: client.clone(),
                is_first: index == 0,
            })
            .collect()
    }

    /// Disconnect notifications replaying the current set
    pub fn replay_disconnected(&self) -> Vec<ClientEvent> {
        let count = self.clients.len();
        self.clients
            .iter()
            .enumerate()
            .map(|(index, client)| ClientEvent::Disconnected {
                client: client.clone(),
                is_last: index + 1 == count,
            })
            .collect()
    }

    /// Forget every client, returning disconnect notifications for them
    pub fn clear(&mut self) -> Vec<ClientEvent> {
        let events = self.replay_disconnected();
        self.clients.clear();
        events
    }
}
