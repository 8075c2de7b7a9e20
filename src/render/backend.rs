// SPDX-License-Identifier: GPL-3.0-only

//! Drawing backend seam
//!
//! A backend owns one program (vertex + fragment stage), one frame texture and
//! the target it draws into. [`FrameRenderer`](super::FrameRenderer) drives it
//! once per tick:
//!
//! ```text
//! begin_frame ─┬─────────────────────────────────┬─ end_frame
//!              └─ upload_texture ─ draw_quad ────┘
//! ```

use crate::errors::RenderError;

/// Column-major 4x4 matrix
pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub trait GraphicsBackend: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Compile and link the program, then allocate the frame texture with
    /// linear filtering and clamp-to-edge wrapping
    ///
    /// Failures here are fatal to the renderer.
    fn init(&mut self) -> Result<(), RenderError>;

    /// Model-view-projection applied to the quad
    fn set_projection(&mut self, mvp: Mat4);

    /// Start a frame and clear the target to opaque black
    fn begin_frame(&mut self);

    /// Replace the frame texture contents, resizing it if needed
    fn upload_texture(&mut self, width: u32, height: u32, rgba: &[u8])
    -> Result<(), RenderError>;

    /// Draw the textured full-viewport quad as a 4-vertex triangle strip
    fn draw_quad(&mut self) -> Result<(), RenderError>;

    /// Finish the frame and hand it to the target
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Free the frame texture
    fn release_texture(&mut self);
}

/// Column-major orthographic projection, as `glOrtho` builds it
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rl = right - left;
    let tb = top - bottom;
    let fnr = far - near;
    [
        [2.0 / rl, 0.0, 0.0, 0.0],
        [0.0, 2.0 / tb, 0.0, 0.0],
        [0.0, 0.0, -2.0 / fnr, 0.0],
        [
            -(right + left) / rl,
            -(top + bottom) / tb,
            -(far + near) / fnr,
            1.0,
        ],
    ]
}

/// Multiply a column-major matrix by (x, y, 0, 1) and return clip-space x, y
pub fn transform_point(m: &Mat4, x: f32, y: f32) -> (f32, f32) {
    let cx = m[0][0] * x + m[1][0] * y + m[3][0];
    let cy = m[0][1] * x + m[1][1] * y + m[3][1];
    let cw = m[0][3] * x + m[1][3] * y + m[3][3];
    if cw.abs() > f32::EPSILON {
        (cx / cw, cy / cw)
    } else {
        (cx, cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_ortho_keeps_clip_space() {
        let m = orthographic(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        assert_eq!(transform_point(&m, -1.0, -1.0), (-1.0, -1.0));
        assert_eq!(transform_point(&m, 1.0, 1.0), (1.0, 1.0));
        assert_eq!(m[2][2], -1.0);
    }

    #[test]
    fn test_ortho_maps_bounds_to_clip_space() {
        let m = orthographic(0.0, 640.0, 0.0, 480.0, -1.0, 1.0);
        let close = |(x, y): (f32, f32), (ex, ey): (f32, f32)| {
            (x - ex).abs() < 1e-5 && (y - ey).abs() < 1e-5
        };
        assert!(close(transform_point(&m, 0.0, 0.0), (-1.0, -1.0)));
        assert!(close(transform_point(&m, 640.0, 480.0), (1.0, 1.0)));
        assert!(close(transform_point(&m, 320.0, 240.0), (0.0, 0.0)));
    }
}
