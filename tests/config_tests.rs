// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use std::time::Duration;
use vcam_host::Config;
use vcam_host::config::ObservationMode;
use vcam_host::platform::BundleVersion;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert!(!config.extension_identifier.is_empty());
    assert!(!config.product_name.is_empty());
    assert_eq!(config.observation, ObservationMode::Auto);
    assert_eq!(
        config.bundled_version,
        BundleVersion::parse(env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_connector_configuration_matches_camera() {
    let config = Config::default();
    let connector = config.device_connector_configuration();

    assert_eq!(connector.device_uuid(), config.camera.device_uuid);
    assert_eq!(connector.source_stream_name(), config.camera.source_stream_name);
    assert_eq!(connector.sink_stream_name(), config.camera.sink_stream_name);
    assert_eq!(connector.format(), config.video_format());
}

#[test]
fn test_stream_names_differ() {
    let config = Config::default();
    assert_ne!(
        config.camera.source_stream_name, config.camera.sink_stream_name,
        "Producer and consumer streams must be distinct"
    );
}

#[test]
fn test_durations() {
    let config = Config {
        request_poll_interval_ms: 0,
        watchdog_window_ms: 250,
        log_throttle_secs: 5,
        ..Config::default()
    };
    // A zero poll interval would spin
    assert_eq!(config.request_poll_interval(), Duration::from_millis(1));
    assert_eq!(config.watchdog_window(), Duration::from_millis(250));
    assert_eq!(config.log_throttle_interval(), Duration::from_secs(5));
}

#[test]
fn test_json_round_trip_keeps_values() {
    let config = Config {
        product_name: "Studio Cam".to_string(),
        observation: ObservationMode::Foreground,
        ..Config::default()
    };
    let json = config.to_json().unwrap();
    assert!(json.contains("\"foreground\""));
    let parsed: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}
