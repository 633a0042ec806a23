// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the device manager against the simulated system

mod common;

use common::{Note, eventually, manager, test_config, wait_for_state};
use std::time::Duration;
use vcam_host::backends::extension::ExtensionState;
use vcam_host::constants::status;
use vcam_host::devices::MenuItem;
use vcam_host::devices::analytics;
use vcam_host::platform::simulated::{ResponsePolicy, SimulatedSystem};
use vcam_host::platform::{
    ActivationState, AppActivity, AuthorizationStatus, ExtensionProperties, MediaKind,
    RegistryEvent, RegistryFailure, RequestKind, RequestResult, SettingsPane, VideoFrame,
};
use vcam_host::{AppError, ConnectorError, ExtensionError};

fn host_pid() -> i32 {
    std::process::id() as i32
}

#[tokio::test]
async fn test_installed_extension_connects_on_start() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, delegate) = manager(&system, config.clone());

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);
    let sink = manager.frame_sink();
    assert!(eventually(|| sink.is_connected()).await);
    assert!(system.capture.is_streaming());

    assert_eq!(delegate.states(), vec![ExtensionState::Installed]);
    assert!(
        delegate
            .events()
            .contains(&analytics::STATE_CHANGED.to_string())
    );

    let frame = VideoFrame::filled(config.video_format(), 0x10);
    sink.enqueue(&frame).unwrap();
    assert_eq!(system.capture.sink_queue().unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeated_state_is_not_reported_twice() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, delegate) = manager(&system, config.clone());

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);

    let queried = system.registry.submitted_count(RequestKind::Properties);
    system.registry.emit(RegistryEvent::WillBecomeEnabled {
        identifier: config.extension_identifier.clone(),
    });
    assert!(eventually(|| system.registry.submitted_count(RequestKind::Properties) > queried).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(delegate.states(), vec![ExtensionState::Installed]);
}

#[tokio::test]
async fn test_activation_rejected_when_installed() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);

    let result = manager.activate_camera_extension().await;
    assert_eq!(
        result,
        Err(AppError::Extension(ExtensionError::RequestUnavailableInState(
            Box::new(ExtensionState::Installed)
        )))
    );
    assert_eq!(system.registry.submitted_count(RequestKind::Activation), 0);
    assert_eq!(manager.state(), ExtensionState::Installed);
}

#[tokio::test]
async fn test_activation_rejected_while_installing() {
    let mut config = test_config();
    config.device_retry.attempts = 500;
    let system = SimulatedSystem::new(&config);
    system.registry.set_publishes_device(false);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert_eq!(manager.state(), ExtensionState::NotInstalled);
    assert_eq!(
        manager.activate_camera_extension().await,
        Ok(ExtensionState::Installed)
    );
    assert!(wait_for_state(&manager, ExtensionState::Installing).await);

    let result = manager.activate_camera_extension().await;
    assert!(matches!(
        result,
        Err(AppError::Extension(
            ExtensionError::RequestUnavailableInState(_)
        ))
    ));
    assert_eq!(system.registry.submitted_count(RequestKind::Activation), 1);

    // The device showing up ends the retry loop
    system.capture.publish_device();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);
    assert!(eventually(|| manager.frame_sink().is_connected()).await);
}

#[tokio::test]
async fn test_concurrent_activations_submit_once() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system.registry.set_activation_policy(ResponsePolicy::Manual);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert_eq!(manager.state(), ExtensionState::NotInstalled);

    let first = tokio::spawn({
        let manager = manager.clone();
        async move { manager.activate_camera_extension().await }
    });
    let second = tokio::spawn({
        let manager = manager.clone();
        async move { manager.activate_camera_extension().await }
    });

    assert!(eventually(|| system.registry.parked_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        system
            .registry
            .finish_parked(RequestKind::Activation, RequestResult::Completed)
    );

    assert_eq!(first.await.unwrap(), Ok(ExtensionState::Installed));
    assert_eq!(second.await.unwrap(), Ok(ExtensionState::Installed));
    assert_eq!(system.registry.submitted_count(RequestKind::Activation), 1);
    assert_eq!(
        delegate
            .events()
            .iter()
            .filter(|name| *name == analytics::INSTALLATION_ATTEMPTED)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_streaming_client_notifications() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    system.processes.register(10, "Meeting", Some("com.example.meeting"));
    system.processes.register(11, "Recorder", None);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(eventually(|| manager.frame_sink().is_connected()).await);

    // Without clients the producer is told the camera is unused
    manager.start_virtual_camera_producer().await.unwrap();
    assert_eq!(
        delegate.client_notes(),
        vec![Note::Disconnected(host_pid(), true)]
    );

    system.capture.set_streaming_clients(&[10, 11]);
    assert!(delegate.wait_until(|notes| delegate_clients(notes) == 3).await);
    system.capture.set_streaming_clients(&[11]);
    assert!(delegate.wait_until(|notes| delegate_clients(notes) == 4).await);
    system.capture.set_streaming_clients(&[]);
    assert!(delegate.wait_until(|notes| delegate_clients(notes) == 5).await);

    assert_eq!(
        delegate.client_notes(),
        vec![
            Note::Disconnected(host_pid(), true),
            Note::Connected(10, true),
            Note::Connected(11, false),
            Note::Disconnected(10, false),
            Note::Disconnected(11, true),
        ]
    );
    assert!(manager.streaming_clients().is_empty());
}

fn delegate_clients(notes: &[Note]) -> usize {
    notes
        .iter()
        .filter(|note| matches!(note, Note::Connected(..) | Note::Disconnected(..)))
        .count()
}

#[tokio::test]
async fn test_clients_replayed_to_producer() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(eventually(|| manager.frame_sink().is_connected()).await);

    system.capture.set_streaming_clients(&[20, 21]);
    assert!(eventually(|| manager.streaming_clients().len() == 2).await);
    assert!(delegate.client_notes().is_empty());

    manager.start_virtual_camera_producer().await.unwrap();
    manager.start_virtual_camera_producer().await.unwrap();
    manager.stop_virtual_camera_producer().await.unwrap();
    manager.stop_virtual_camera_producer().await.unwrap();

    assert_eq!(
        delegate.client_notes(),
        vec![
            Note::Connected(20, true),
            Note::Connected(21, false),
            Note::Disconnected(20, false),
            Note::Disconnected(21, true),
        ]
    );
    let pids: Vec<i32> = manager.streaming_clients().iter().map(|c| c.pid).collect();
    assert_eq!(pids, vec![20, 21]);
}

#[tokio::test]
async fn test_producer_start_between_snapshots() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(eventually(|| manager.frame_sink().is_connected()).await);

    system.capture.set_streaming_clients(&[1]);
    assert!(eventually(|| manager.streaming_clients().len() == 1).await);
    system.capture.set_streaming_clients(&[1, 2]);
    assert!(eventually(|| manager.streaming_clients().len() == 2).await);

    manager.start_virtual_camera_producer().await.unwrap();
    system.capture.set_streaming_clients(&[]);
    assert!(delegate.wait_until(|notes| delegate_clients(notes) == 4).await);

    assert_eq!(
        delegate.client_notes(),
        vec![
            Note::Connected(1, true),
            Note::Connected(2, false),
            Note::Disconnected(1, false),
            Note::Disconnected(2, true),
        ]
    );
}

#[tokio::test]
async fn test_teardown_disconnects_clients() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(eventually(|| manager.frame_sink().is_connected()).await);
    manager.start_virtual_camera_producer().await.unwrap();
    system.capture.set_streaming_clients(&[30]);
    assert!(delegate.wait_until(|notes| notes.contains(&Note::Connected(30, true))).await);

    manager.stop_devices().await.unwrap();
    assert_eq!(manager.state(), ExtensionState::Unknown);
    assert!(!manager.frame_sink().is_connected());
    assert!(!system.capture.is_streaming());
    assert_eq!(delegate.count(&Note::Disconnected(30, true)), 1);
    assert!(manager.streaming_clients().is_empty());
}

#[tokio::test]
async fn test_device_timeout_requires_reboot_once() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system.registry.set_publishes_device(false);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    manager.activate_camera_extension().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::RequiresReboot).await);
    assert_eq!(delegate.count(&Note::Reboot), 1);

    // Reaching the same conclusion again does not prompt again
    manager.stop_devices().await.unwrap();
    manager.start_devices().await.unwrap();
    assert!(
        delegate
            .wait_until(|_| delegate
                .states()
                .iter()
                .filter(|state| **state == ExtensionState::RequiresReboot)
                .count()
                == 2)
            .await
    );
    assert_eq!(delegate.count(&Note::Reboot), 1);

    // Uninstalling resets the prompt
    assert_eq!(
        manager.deactivate_camera_extension().await,
        Ok(ExtensionState::Uninstalling)
    );
    assert!(wait_for_state(&manager, ExtensionState::Uninstalling).await);
    system.registry.reboot();
    manager.stop_devices().await.unwrap();
    manager.start_devices().await.unwrap();
    assert_eq!(manager.state(), ExtensionState::NotInstalled);

    manager.activate_camera_extension().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::RequiresReboot).await);
    assert_eq!(delegate.count(&Note::Reboot), 2);
}

#[tokio::test]
async fn test_second_instance_requires_reboot() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let mut instances = system.registry.instances();
    instances.push(ExtensionProperties::new(
        &config.extension_identifier,
        "0.0.1",
        ActivationState::Uninstalling,
    ));
    system.registry.set_instances(instances);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::RequiresReboot).await);
    assert_eq!(
        delegate.states(),
        vec![ExtensionState::Installed, ExtensionState::RequiresReboot]
    );
    assert_eq!(delegate.count(&Note::Reboot), 1);
    assert!(!manager.frame_sink().is_connected());
}

#[tokio::test]
async fn test_reenabled_extension_requires_reboot() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, delegate) = manager(&system, config.clone());

    manager.start_devices().await.unwrap();
    assert!(eventually(|| manager.frame_sink().is_connected()).await);

    system.registry.disable();
    assert!(wait_for_state(&manager, ExtensionState::Disabled).await);
    assert!(eventually(|| !manager.frame_sink().is_connected()).await);

    // The user enables it again in the system settings
    system.registry.set_instances(vec![ExtensionProperties::new(
        &config.extension_identifier,
        &config.bundled_version.to_string(),
        ActivationState::Enabled,
    )]);
    system.capture.publish_device();
    system.registry.emit(RegistryEvent::WillBecomeEnabled {
        identifier: config.extension_identifier.clone(),
    });

    assert!(wait_for_state(&manager, ExtensionState::RequiresReboot).await);
    let states = delegate.states();
    let disabled = states
        .iter()
        .position(|state| *state == ExtensionState::Disabled)
        .unwrap();
    assert_eq!(
        states[disabled + 1..],
        [ExtensionState::Installed, ExtensionState::RequiresReboot]
    );
    assert_eq!(delegate.count(&Note::Reboot), 1);
    assert!(!manager.frame_sink().is_connected());
}

#[tokio::test]
async fn test_uninstall_cancels_device_wait() {
    let mut config = test_config();
    config.device_retry.attempts = 20;
    config.device_retry.interval_ms = 20;
    let system = SimulatedSystem::new(&config);
    system.registry.set_publishes_device(false);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    manager.activate_camera_extension().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::Installing).await);

    assert_eq!(
        manager.deactivate_camera_extension().await,
        Ok(ExtensionState::Uninstalling)
    );
    assert!(wait_for_state(&manager, ExtensionState::Uninstalling).await);

    // Outlive the whole retry budget
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(manager.state(), ExtensionState::Uninstalling);
    assert!(!delegate.states().contains(&ExtensionState::RequiresReboot));
    assert_eq!(delegate.count(&Note::Reboot), 0);
}

#[tokio::test]
async fn test_activation_in_requires_reboot_asks_for_reboot() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system
        .registry
        .set_activation_policy(ResponsePolicy::RequireReboot);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert_eq!(
        manager.activate_camera_extension().await,
        Ok(ExtensionState::RequiresReboot)
    );
    assert!(wait_for_state(&manager, ExtensionState::RequiresReboot).await);
    assert_eq!(delegate.count(&Note::Reboot), 1);

    assert_eq!(
        manager.activate_camera_extension().await,
        Ok(ExtensionState::RequiresReboot)
    );
    assert_eq!(delegate.count(&Note::Reboot), 2);
    assert_eq!(system.registry.submitted_count(RequestKind::Activation), 1);
}

#[tokio::test]
async fn test_outdated_extension_is_updated() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system.registry.set_instances(vec![ExtensionProperties::new(
        &config.extension_identifier,
        "0.0.1",
        ActivationState::Enabled,
    )]);
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::RequiresReboot).await);

    let states = delegate.states();
    assert_eq!(states.first(), Some(&ExtensionState::NeedsUpdate));
    assert!(states.contains(&ExtensionState::Installed));
    assert_eq!(system.registry.submitted_count(RequestKind::Activation), 1);
    assert_eq!(delegate.count(&Note::Reboot), 1);
}

#[tokio::test]
async fn test_activation_failure_is_reported() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system
        .registry
        .set_activation_policy(ResponsePolicy::Fail(RegistryFailure::Other {
            code: 4,
            message: "validation failed".to_string(),
        }));
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    let expected = ExtensionError::RequestFailed {
        code: 4,
        message: "validation failed".to_string(),
    };
    assert_eq!(
        manager.activate_camera_extension().await,
        Err(AppError::Extension(expected.clone()))
    );
    assert_eq!(manager.state(), ExtensionState::Error(expected.clone()));
    assert_eq!(delegate.count(&Note::Error(expected)), 1);
    assert!(
        delegate
            .events()
            .contains(&analytics::INSTALLATION_FAILED.to_string())
    );
}

#[tokio::test]
async fn test_declined_deactivation_keeps_state() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    system
        .registry
        .set_deactivation_policy(ResponsePolicy::Fail(RegistryFailure::AuthorizationRequired));
    let (manager, delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);

    assert_eq!(
        manager.deactivate_camera_extension().await,
        Err(AppError::Extension(ExtensionError::AuthorizationRequired))
    );
    assert_eq!(manager.state(), ExtensionState::Installed);
    assert!(
        !delegate
            .events()
            .contains(&analytics::DEINSTALLATION_FAILED.to_string())
    );
}

#[tokio::test]
async fn test_approval_connects_without_request() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system
        .registry
        .set_activation_policy(ResponsePolicy::NeedsApproval);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert_eq!(
        manager.activate_camera_extension().await,
        Ok(ExtensionState::AwaitingUserApproval)
    );
    assert!(wait_for_state(&manager, ExtensionState::AwaitingUserApproval).await);

    system.registry.approve();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);
    assert!(eventually(|| manager.frame_sink().is_connected()).await);
}

#[tokio::test]
async fn test_watchdog_opens_settings_without_dialog() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system
        .registry
        .set_activation_policy(ResponsePolicy::NeedsApproval);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    manager.activate_camera_extension().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::AwaitingUserApproval).await);
    assert!(system.settings.opened().is_empty());

    manager.activate_camera_extension().await.unwrap();
    assert!(
        eventually(|| system
            .settings
            .opened()
            .contains(&SettingsPane::ExtensionApproval))
        .await
    );
}

#[tokio::test]
async fn test_watchdog_armed_once_while_pending() {
    let mut config = test_config();
    config.watchdog_window_ms = 300;
    let system = SimulatedSystem::new(&config);
    system
        .registry
        .set_activation_policy(ResponsePolicy::NeedsApproval);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    manager.activate_camera_extension().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::AwaitingUserApproval).await);

    manager.activate_camera_extension().await.unwrap();
    manager.activate_camera_extension().await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        system.settings.opened(),
        vec![SettingsPane::ExtensionApproval]
    );

    // An expired watchdog can be armed again
    manager.activate_camera_extension().await.unwrap();
    assert!(eventually(|| system.settings.opened().len() == 2).await);
}

#[tokio::test]
async fn test_watchdog_satisfied_by_dialog() {
    let mut config = test_config();
    config.watchdog_window_ms = 300;
    let system = SimulatedSystem::new(&config);
    system
        .registry
        .set_activation_policy(ResponsePolicy::NeedsApproval);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    manager.activate_camera_extension().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::AwaitingUserApproval).await);

    manager.activate_camera_extension().await.unwrap();
    system.app_events.emit(AppActivity::KeyWindowResigned);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(system.settings.opened().is_empty());
}

#[tokio::test]
async fn test_foreground_observation_notices_disable() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    system.registry.set_push_notifications(false);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    assert!(eventually(|| manager.frame_sink().is_connected()).await);

    system.app_events.emit(AppActivity::ResignedActive);
    tokio::time::sleep(Duration::from_millis(50)).await;
    system.registry.disable();
    system.app_events.emit(AppActivity::BecameActive);
    assert!(wait_for_state(&manager, ExtensionState::Disabled).await);
    assert!(eventually(|| !manager.frame_sink().is_connected()).await);
}

#[tokio::test]
async fn test_enqueue_on_invalidated_queue() {
    let config = test_config();
    let first = SimulatedSystem::with_installed_extension(&config);
    let second = SimulatedSystem::with_installed_extension(&config);
    let (first_manager, _) = manager(&first, config.clone());
    let (second_manager, _) = manager(&second, config.clone());

    first_manager.start_devices().await.unwrap();
    second_manager.start_devices().await.unwrap();
    let first_sink = first_manager.frame_sink();
    let second_sink = second_manager.frame_sink();
    assert!(eventually(|| first_sink.is_connected() && second_sink.is_connected()).await);

    first.capture.sink_queue().unwrap().invalidate();
    let frame = VideoFrame::filled(config.video_format(), 0x20);
    assert_eq!(
        first_sink.enqueue(&frame),
        Err(ConnectorError::EnqueueFailed(status::QUEUE_INVALIDATED))
    );
    assert_eq!(second_sink.enqueue(&frame), Ok(()));
    assert_eq!(second.capture.sink_queue().unwrap().len(), 1);
}

#[tokio::test]
async fn test_enqueue_without_connector() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    let (manager, _delegate) = manager(&system, config.clone());

    let frame = VideoFrame::filled(config.video_format(), 0);
    assert_eq!(
        manager.frame_sink().enqueue(&frame),
        Err(ConnectorError::NotConnected)
    );
}

#[tokio::test]
async fn test_stop_cancels_pending_activation() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    system.registry.set_activation_policy(ResponsePolicy::Manual);
    let (manager, _delegate) = manager(&system, config);

    manager.start_devices().await.unwrap();
    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.activate_camera_extension().await }
    });
    assert!(eventually(|| system.registry.parked_count() == 1).await);

    manager.stop_devices().await.unwrap();
    assert_eq!(
        pending.await.unwrap(),
        Err(AppError::Extension(ExtensionError::Canceled))
    );
    assert_eq!(manager.state(), ExtensionState::Unknown);
}

#[tokio::test]
async fn test_permissions_and_info() {
    let config = test_config();
    let system = SimulatedSystem::new(&config);
    let (manager, delegate) = manager(&system, config);

    manager.request_permissions(&[MediaKind::Video]).await;
    assert_eq!(system.authorization.request_count(), 1);
    assert_eq!(
        delegate.count(&Note::Authorization(
            MediaKind::Video,
            AuthorizationStatus::NotDetermined,
            AuthorizationStatus::Authorized
        )),
        1
    );

    let info = manager.info();
    assert_eq!(info.camera_permission_status, "authorized");
    assert_eq!(info.microphone_permission_status, "not determined");
    assert_eq!(info.virtual_camera_status, "unknown");

    // Granting access after a denial requires a relaunch
    system
        .authorization
        .set_status(MediaKind::Audio, AuthorizationStatus::Denied);
    manager.info();
    system
        .authorization
        .set_status(MediaKind::Audio, AuthorizationStatus::Authorized);
    manager.info();
    assert_eq!(delegate.count(&Note::Relaunch), 1);
}

#[tokio::test]
async fn test_menu_items_follow_state() {
    let config = test_config();
    let system = SimulatedSystem::with_installed_extension(&config);
    let (manager, _delegate) = manager(&system, config.clone());

    let mut activation = MenuItem::default();
    let mut deactivation = MenuItem::default();
    assert!(!manager.update_camera_extension_activation_menu_item(&mut activation));

    manager.start_devices().await.unwrap();
    assert!(wait_for_state(&manager, ExtensionState::Installed).await);

    assert!(!manager.update_camera_extension_activation_menu_item(&mut activation));
    assert!(activation.hidden);
    assert!(manager.update_camera_extension_deactivation_menu_item(&mut deactivation));
    assert_eq!(
        deactivation.title,
        format!("Uninstall {}…", config.product_name)
    );
}
