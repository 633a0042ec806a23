// SPDX-License-Identifier: GPL-3.0-only

//! Typed decoders over the driver's string properties

use super::property_listener::PropertyListener;
use crate::constants::{LOG_MESSAGES_SEPARATOR, STREAMING_CLIENTS_SEPARATOR};
use crate::errors::ListenerError;
use crate::platform::{PropertySelector, PropertySource, StreamId};
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Parse the streaming clients property into process identifiers
///
/// Segments that are not process identifiers are dropped.
pub fn parse_streaming_clients(value: &str) -> Vec<i32> {
    value
        .split(STREAMING_CLIENTS_SEPARATOR)
        .filter_map(|segment| segment.trim().parse().ok())
        .collect()
}

/// Split the log property into individual messages
pub fn split_log_messages(value: &str) -> Vec<String> {
    value
        .split(LOG_MESSAGES_SEPARATOR)
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn runtime_handle(runtime: Option<Handle>) -> Result<Handle, ListenerError> {
    match runtime {
        Some(handle) => Ok(handle),
        None => Handle::try_current().map_err(|_| ListenerError::NoRuntime),
    }
}

/// Delivers the process identifiers of the driver's streaming clients
///
/// The handler is called with the full snapshot on construction and after
/// every change, in order, on the given runtime (the current one by default).
pub struct StreamingClientsListener {
    task: JoinHandle<()>,
}

impl StreamingClientsListener {
    pub fn new<F>(
        source: Arc<dyn PropertySource>,
        stream: StreamId,
        handler: F,
        runtime: Option<Handle>,
    ) -> Result<Self, ListenerError>
    where
        F: Fn(Vec<i32>) + Send + Sync + 'static,
    {
        let runtime = runtime_handle(runtime)?;
        let listener = PropertyListener::new(source, stream, PropertySelector::StreamingClients)?;

        let task = runtime.spawn(async move {
            let values = listener.into_values();
            futures::pin_mut!(values);
            while let Some(value) = values.next().await {
                let pids = parse_streaming_clients(&value);
                debug!(?pids, "Streaming clients changed");
                handler(pids);
            }
        });

        Ok(Self { task })
    }
}

impl Drop for StreamingClientsListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Delivers log messages bulk-pushed by the driver
///
/// The value present at construction is stale and never delivered.
pub struct LogListener {
    task: JoinHandle<()>,
}

impl LogListener {
    pub fn new<F>(
        source: Arc<dyn PropertySource>,
        stream: StreamId,
        handler: F,
        runtime: Option<Handle>,
    ) -> Result<Self, ListenerError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let runtime = runtime_handle(runtime)?;
        let listener = PropertyListener::new(source, stream, PropertySelector::Log)?;

        let task = runtime.spawn(async move {
            let values = listener.into_values().skip(1);
            futures::pin_mut!(values);
            while let Some(value) = values.next().await {
                for message in split_log_messages(&value) {
                    handler(message);
                }
            }
        });

        Ok(Self { task })
    }
}

impl Drop for LogListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
