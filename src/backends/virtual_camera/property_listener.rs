// SPDX-License-Identifier: GPL-3.0-only

//! Observable property subscription
//!
//! A [`PropertyListener`] registers one native change callback for one
//! property of one stream. The callback runs on a platform thread and only
//! forwards the raw value into a channel; consumers read the initial value
//! followed by every change, in arrival order, from [`PropertyListener::into_values`].

use crate::errors::ListenerError;
use crate::platform::{ListenerToken, PropertySelector, PropertySource, StreamId};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct PropertyListener {
    source: Arc<dyn PropertySource>,
    stream: StreamId,
    selector: PropertySelector,
    token: ListenerToken,
    initial: String,
    receiver: mpsc::UnboundedReceiver<String>,
}

impl PropertyListener {
    /// Register the change callback and read the current value
    ///
    /// Fails with [`ListenerError::RegistrationFailed`] if the platform
    /// refuses the registration or the initial read.
    pub fn new(
        source: Arc<dyn PropertySource>,
        stream: StreamId,
        selector: PropertySelector,
    ) -> Result<Self, ListenerError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let token = source
            .add_property_listener(
                stream,
                selector,
                Box::new(move |value| {
                    // Receiver gone means the listener is being torn down
                    let _ = sender.send(value);
                }),
            )
            .map_err(|code| {
                warn!(stream = stream.0, %selector, code, "Property listener registration failed");
                ListenerError::RegistrationFailed(code)
            })?;

        let initial = match source.read_property(stream, selector) {
            Ok(value) => value,
            Err(code) => {
                source.remove_property_listener(token);
                warn!(stream = stream.0, %selector, code, "Initial property read failed");
                return Err(ListenerError::RegistrationFailed(code));
            }
        };

        debug!(stream = stream.0, %selector, "Property listener registered");

        Ok(Self {
            source,
            stream,
            selector,
            token,
            initial,
            receiver,
        })
    }

    /// The value read at construction
    pub fn initial_value(&self) -> &str {
        &self.initial
    }

    pub fn selector(&self) -> PropertySelector {
        self.selector
    }

    /// Stream of the initial value followed by every change
    ///
    /// The listener stays registered for as long as the stream is alive.
    pub fn into_values(mut self) -> impl Stream<Item = String> + Send + 'static {
        async_stream::stream! {
            yield std::mem::take(&mut self.initial);
            while let Some(value) = self.receiver.recv().await {
                yield value;
            }
        }
    }
}

impl Drop for PropertyListener {
    fn drop(&mut self) {
        self.source.remove_property_listener(self.token);
        debug!(stream = self.stream.0, selector = %self.selector, "Property listener removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::constants::status;
    use crate::platform::simulated::SimulatedSystem;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_initial_value_then_changes() {
        let config = Config::default();
        let system = SimulatedSystem::with_installed_extension(&config);
        let source = system.capture.source_stream().unwrap();
        system.capture.set_streaming_clients(&[7]);

        let listener = PropertyListener::new(
            system.capture.clone(),
            source,
            PropertySelector::StreamingClients,
        )
        .unwrap();
        assert_eq!(listener.initial_value(), "7");

        let values = listener.into_values();
        futures::pin_mut!(values);
        system.capture.set_streaming_clients(&[7, 8]);
        system.capture.set_streaming_clients(&[]);

        assert_eq!(values.next().await.as_deref(), Some("7"));
        assert_eq!(values.next().await.as_deref(), Some("7,8"));
        assert_eq!(values.next().await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_registration_failure() {
        let config = Config::default();
        let system = SimulatedSystem::with_installed_extension(&config);
        let source = system.capture.source_stream().unwrap();
        system
            .capture
            .fail_listener_registration(Some(status::BAD_OBJECT));

        let result = PropertyListener::new(system.capture.clone(), source, PropertySelector::Log);
        assert!(matches!(
            result,
            Err(ListenerError::RegistrationFailed(status::BAD_OBJECT))
        ));
        assert_eq!(system.capture.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_listener() {
        let config = Config::default();
        let system = SimulatedSystem::with_installed_extension(&config);
        let source = system.capture.source_stream().unwrap();

        let listener =
            PropertyListener::new(system.capture.clone(), source, PropertySelector::Log).unwrap();
        assert_eq!(system.capture.listener_count(), 1);
        drop(listener);
        assert_eq!(system.capture.listener_count(), 0);
    }
}
