// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use edgecam::constants::{self, quad, timing};
use std::time::Duration;

#[test]
fn test_buffer_sizes() {
    // Planar 4:2:0 is 1.5 bytes per pixel, RGBA is 4
    assert_eq!(constants::planar_420_size(640, 480), 460_800);
    assert_eq!(constants::planar_420_size(1280, 720), 1_382_400);
    assert_eq!(constants::rgba_size(1280, 720), 3_686_400);
    assert_eq!(constants::rgba_size(0, 720), 0);
}

#[test]
fn test_fps_window_is_one_second() {
    assert_eq!(constants::FPS_WINDOW, Duration::from_secs(1));
}

#[test]
fn test_quad_spans_viewport() {
    assert_eq!(quad::POSITIONS.len() as u32, quad::VERTEX_COUNT);
    assert_eq!(quad::TEX_COORDS.len() as u32, quad::VERTEX_COUNT);

    for [x, y] in quad::POSITIONS {
        assert_eq!(x.abs(), 1.0);
        assert_eq!(y.abs(), 1.0);
    }
    // Bottom-left vertex samples the last texture row
    assert_eq!(quad::TEX_COORDS[0], [0.0, 1.0]);
}

#[test]
fn test_render_interval() {
    let interval = timing::interval_for_fps(timing::DEFAULT_RENDER_FPS);
    assert!(interval > Duration::from_millis(16));
    assert!(interval < Duration::from_millis(17));
}
