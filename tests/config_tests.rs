// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use edgecam::Config;
use std::path::PathBuf;

/// Per-test scratch file under the system temp dir
fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("edgecam-test-{}", std::process::id()))
        .join(name)
}

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(config.preferred_capture.width, 1280);
    assert_eq!(config.preferred_capture.height, 720);
    assert_eq!(config.fps_window_ms, 1000);
    assert!(
        !config.force_software_render,
        "GPU rendering should be the default"
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_round_trips_through_file() {
    let path = scratch_path("roundtrip/config.json");
    let mut config = Config::default();
    config.render_fps = 30;
    config.force_software_render = true;

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_missing_fields_use_defaults() {
    let path = scratch_path("partial.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "capture_fps": 15 }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.capture_fps, 15);
    assert_eq!(loaded.render_fps, Config::default().render_fps);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_malformed_file_falls_back_to_defaults() {
    let path = scratch_path("broken.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
    assert_eq!(Config::load_or_default(&path), Config::default());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_missing_file_is_defaults() {
    let path = scratch_path("does-not-exist.json");
    assert_eq!(Config::load_or_default(&path), Config::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    let mut config = Config::default();
    config.edge_low_threshold = 200.0;
    config.edge_high_threshold = 100.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.render_fps = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.viewport.width = 0;
    assert!(config.validate().is_err());
}
