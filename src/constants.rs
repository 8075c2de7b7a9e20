// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture size the source tries to get closest to (by pixel area)
pub const PREFERRED_CAPTURE_WIDTH: u32 = 1280;
pub const PREFERRED_CAPTURE_HEIGHT: u32 = 720;

/// Length of the rolling window used for throughput measurements
pub const FPS_WINDOW: Duration = Duration::from_millis(1_000);

/// Bytes per pixel of processed (RGBA) frames
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Size in bytes of a planar 4:2:0 buffer (luma plane plus half-size chroma)
pub fn planar_420_size(width: u32, height: u32) -> usize {
    let luma = width as usize * height as usize;
    luma + luma / 2
}

/// Size in bytes of an RGBA buffer
pub fn rgba_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * RGBA_BYTES_PER_PIXEL
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Default frame rate of the synthetic capture device
    pub const DEFAULT_CAPTURE_FPS: u32 = 30;

    /// Default tick rate of the display loop (one tick per vsync at 60 Hz)
    pub const DEFAULT_RENDER_FPS: u32 = 60;

    /// How long a capture session waits for a frame before the worker
    /// re-checks its stop signal
    pub const FRAME_POLL_TIMEOUT: Duration = Duration::from_millis(100);

    /// Interval between stats lines printed by `edgecam run`
    pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(1);

    /// Tick interval for a given rate (rate 0 is treated as 1)
    pub fn interval_for_fps(fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }
}

/// Full-screen quad drawn as a 4-vertex triangle strip
pub mod quad {
    /// Vertex positions, 2 floats each, spanning the whole -1..1 viewport
    pub const POSITIONS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

    /// Texture coordinates, flipped vertically so row 0 of the frame is at the top
    pub const TEX_COORDS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

    /// Number of vertices in the strip
    pub const VERTEX_COUNT: u32 = 4;
}

/// Edge detector defaults
pub mod edges {
    /// Gradient magnitude below which a pixel is never an edge
    pub const DEFAULT_LOW_THRESHOLD: f32 = 80.0;
    /// Gradient magnitude above which a pixel is always an edge
    pub const DEFAULT_HIGH_THRESHOLD: f32 = 160.0;
}
