// SPDX-License-Identifier: GPL-3.0-only

//! Capture permission helpers

use crate::errors::PermissionError;
use crate::platform::{
    AuthorizationProvider, AuthorizationStatus, MediaKind, SettingsPane, SystemSettings,
};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Notified whenever a helper observes a different authorization status
pub trait PermissionDelegate: Send + Sync {
    fn authorization_changed(
        &self,
        kind: MediaKind,
        from: AuthorizationStatus,
        to: AuthorizationStatus,
    );
}

/// Tracks and requests authorization for one media kind
pub struct PermissionHelper {
    kind: MediaKind,
    provider: Arc<dyn AuthorizationProvider>,
    settings: Arc<dyn SystemSettings>,
    last_status: Mutex<AuthorizationStatus>,
    delegate: Mutex<Option<Arc<dyn PermissionDelegate>>>,
}

impl PermissionHelper {
    pub fn new(
        kind: MediaKind,
        provider: Arc<dyn AuthorizationProvider>,
        settings: Arc<dyn SystemSettings>,
    ) -> Self {
        let last_status = provider.authorization_status(kind);
        Self {
            kind,
            provider,
            settings,
            last_status: Mutex::new(last_status),
            delegate: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn PermissionDelegate>>) {
        *self
            .delegate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delegate;
    }

    /// Current status; notifies the delegate if it changed since last seen
    pub fn current_authorization_status(&self) -> AuthorizationStatus {
        let status = self.provider.authorization_status(self.kind);
        let previous = std::mem::replace(
            &mut *self
                .last_status
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            status,
        );

        if previous != status {
            info!(kind = %self.kind, from = %previous, to = %status, "Authorization changed");
            let delegate = self
                .delegate
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            if let Some(delegate) = delegate {
                delegate.authorization_changed(self.kind, previous, status);
            }
        }
        status
    }

    /// Ask for access
    ///
    /// Prompts if the status is not determined yet. A denied status cannot
    /// be changed by prompting, so the matching settings pane is opened
    /// instead.
    pub async fn request_authorization(&self) -> Result<AuthorizationStatus, PermissionError> {
        match self.current_authorization_status() {
            AuthorizationStatus::NotDetermined => {
                info!(kind = %self.kind, "Requesting capture authorization");
                let granted = self.provider.request_access(self.kind).await?;
                info!(kind = %self.kind, granted, "Capture authorization answered");
                Ok(self.current_authorization_status())
            }
            AuthorizationStatus::Denied => {
                info!(kind = %self.kind, "Authorization denied, opening settings");
                self.settings.open(SettingsPane::for_media(self.kind))?;
                Ok(AuthorizationStatus::Denied)
            }
            AuthorizationStatus::Restricted => {
                warn!(kind = %self.kind, "Authorization is restricted");
                Ok(AuthorizationStatus::Restricted)
            }
            AuthorizationStatus::Authorized => Ok(AuthorizationStatus::Authorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{SimulatedAuthorization, SimulatedSettings};

    struct Recorder(Mutex<Vec<(AuthorizationStatus, AuthorizationStatus)>>);

    impl PermissionDelegate for Recorder {
        fn authorization_changed(
            &self,
            _kind: MediaKind,
            from: AuthorizationStatus,
            to: AuthorizationStatus,
        ) {
            self.0.lock().unwrap().push((from, to));
        }
    }

    #[tokio::test]
    async fn test_prompt_when_not_determined() {
        let provider = Arc::new(SimulatedAuthorization::new());
        let settings = Arc::new(SimulatedSettings::default());
        let helper = PermissionHelper::new(MediaKind::Video, provider.clone(), settings.clone());
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        helper.set_delegate(Some(recorder.clone()));

        assert_eq!(
            helper.request_authorization().await,
            Ok(AuthorizationStatus::Authorized)
        );
        assert_eq!(provider.request_count(), 1);
        assert!(settings.opened().is_empty());
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![(
                AuthorizationStatus::NotDetermined,
                AuthorizationStatus::Authorized
            )]
        );
    }

    #[tokio::test]
    async fn test_denied_opens_settings() {
        let provider = Arc::new(SimulatedAuthorization::new());
        provider.set_status(MediaKind::Audio, AuthorizationStatus::Denied);
        let settings = Arc::new(SimulatedSettings::default());
        let helper = PermissionHelper::new(MediaKind::Audio, provider.clone(), settings.clone());

        assert_eq!(
            helper.request_authorization().await,
            Ok(AuthorizationStatus::Denied)
        );
        assert_eq!(provider.request_count(), 0);
        assert_eq!(settings.opened(), vec![SettingsPane::MicrophonePrivacy]);
    }
}
