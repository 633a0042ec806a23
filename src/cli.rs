// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the virtual camera host
//!
//! This module provides command-line functionality for:
//! - Running an install, stream and uninstall cycle against the simulated system
//! - Showing the extension menu items for a given state
//! - Printing the effective configuration

use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use vcam_host::backends::extension::ExtensionState;
use vcam_host::devices::analytics::AnalyticsEvent;
use vcam_host::devices::{DeviceManager, DeviceManagerDelegate, MenuItem, StreamingClient};
use vcam_host::devices::{update_activation_menu_item, update_deactivation_menu_item};
use vcam_host::platform::simulated::SimulatedSystem;
use vcam_host::platform::{AuthorizationStatus, MediaKind, VideoFrame};
use vcam_host::{Config, ExtensionError};

/// Load the configuration from `path`, or the default location
pub fn load_config(path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load(&path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

/// Print the effective configuration as JSON
pub fn print_config(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn parse_state(name: &str) -> Option<ExtensionState> {
    let state = match name.replace('-', "_").as_str() {
        "unknown" => ExtensionState::Unknown,
        "not_installed" => ExtensionState::NotInstalled,
        "awaiting_user_approval" => ExtensionState::AwaitingUserApproval,
        "installing" => ExtensionState::Installing,
        "installed" => ExtensionState::Installed,
        "disabled" => ExtensionState::Disabled,
        "requires_reboot" => ExtensionState::RequiresReboot,
        "needs_update" => ExtensionState::NeedsUpdate,
        "uninstalling" => ExtensionState::Uninstalling,
        "error" => ExtensionState::Error(ExtensionError::UnknownState),
        _ => return None,
    };
    Some(state)
}

/// Show both extension menu items for `state`
pub fn show_menu(state: &str, path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let state = parse_state(state).ok_or_else(|| format!("Unknown extension state: {state}"))?;

    let mut activation = MenuItem::default();
    let mut deactivation = MenuItem::default();
    update_activation_menu_item(&state, &config.product_name, &mut activation);
    update_deactivation_menu_item(&state, &config.product_name, &mut deactivation);

    println!("State: {state}");
    for (label, item) in [("Activation", &activation), ("Deactivation", &deactivation)] {
        if item.hidden {
            println!("  {label}: hidden");
        } else {
            println!("  {label}: \"{}\" (enabled: {})", item.title, item.enabled);
        }
    }
    Ok(())
}

/// Prints every notification the device manager sends
struct PrintingDelegate;

fn stamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

impl DeviceManagerDelegate for PrintingDelegate {
    fn requests_reboot(&self) {
        println!("[{}] Reboot requested", stamp());
    }

    fn requests_relaunch(&self) {
        println!("[{}] Relaunch requested", stamp());
    }

    fn streaming_client_connected(&self, client: &StreamingClient, is_first: bool) {
        println!(
            "[{}] Client connected: {} (pid {}, first: {is_first})",
            stamp(),
            client.app_name,
            client.pid
        );
    }

    fn streaming_client_disconnected(&self, client: &StreamingClient, is_last: bool) {
        println!(
            "[{}] Client disconnected: {} (pid {}, last: {is_last})",
            stamp(),
            client.app_name,
            client.pid
        );
    }

    fn did_update_extension_state(&self, state: &ExtensionState) {
        println!("[{}] Extension state: {state}", stamp());
    }

    fn did_fail_with_error(&self, error: &ExtensionError) {
        println!("[{}] Extension error: {error}", stamp());
    }

    fn did_record_event(&self, event: &AnalyticsEvent) {
        let properties = serde_json::to_string(&event.properties).unwrap_or_default();
        println!("[{}] Analytics: {} {properties}", stamp(), event.name);
    }

    fn authorization_changed(
        &self,
        kind: MediaKind,
        from: AuthorizationStatus,
        to: AuthorizationStatus,
    ) {
        println!("[{}] {kind} authorization: {from} -> {to}", stamp());
    }
}

async fn wait_for_state(
    receiver: &mut watch::Receiver<ExtensionState>,
    wanted: impl Fn(&ExtensionState) -> bool,
) -> Result<ExtensionState, Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(10);
    let state = tokio::time::timeout(timeout, receiver.wait_for(|state| wanted(state)))
        .await
        .map_err(|_| "Timed out waiting for the extension state")??
        .clone();
    Ok(state)
}

/// Install the extension, stream frames to a client and uninstall again
pub fn simulate(path: Option<PathBuf>, frames: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_simulation(config, frames))
}

async fn run_simulation(config: Config, frames: u32) -> Result<(), Box<dyn std::error::Error>> {
    let system = SimulatedSystem::new(&config);
    let manager = DeviceManager::new(system.platform(), config.clone(), Arc::new(PrintingDelegate));
    let mut states = manager.subscribe_state();

    manager.start_devices().await?;
    manager
        .request_permissions(&[MediaKind::Video, MediaKind::Audio])
        .await;
    println!("Info: {}", serde_json::to_string(&manager.info())?);

    println!("Activating...");
    manager.activate_camera_extension().await?;
    wait_for_state(&mut states, |state| *state == ExtensionState::Installed).await?;

    let sink = manager.frame_sink();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !sink.is_connected() {
        if tokio::time::Instant::now() > deadline {
            return Err("Virtual camera did not connect".into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    manager.start_virtual_camera_producer().await?;
    system
        .processes
        .register(4242, "Video Call", Some("com.example.video-call"));
    system.capture.set_streaming_clients(&[4242]);

    let frame = VideoFrame::filled(config.video_format(), 0x80);
    let mut delivered = 0;
    for _ in 0..frames {
        sink.enqueue(&frame)?;
        if let Some(queue) = system.capture.sink_queue()
            && queue.dequeue().is_some()
        {
            delivered += 1;
        }
        tokio::time::sleep(Duration::from_secs(1) / config.camera.frame_rate.max(1)).await;
    }
    println!("Delivered {delivered} of {frames} frames");

    system.capture.set_streaming_clients(&[]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.stop_virtual_camera_producer().await?;

    println!("Deactivating...");
    let state = manager.deactivate_camera_extension().await?;
    println!("Deactivation finished: {state}");

    manager.stop_devices().await?;
    Ok(())
}
