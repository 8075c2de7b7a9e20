// SPDX-License-Identifier: GPL-3.0-only

//! Display stage
//!
//! [`FrameRenderer`] owns the frame texture (through a [`GraphicsBackend`]) and
//! the CPU staging buffer. It is driven entirely from one thread, the render
//! loop in [`render_loop`], which posts frames into it between ticks.
//!
//! ```text
//! Created ──surface created──▶ Ready ──frame size──▶ Sized ──first draw──▶ Rendering
//!    ▲                           │                    │  ▲                    │
//!    │                           └────────────────────┴──┴── frame size ──────┘
//!    └──────────────────────── surface destroyed ──▶ Destroyed
//! ```

pub mod backend;
pub mod render_loop;
pub mod software;
pub mod wgpu_backend;

pub use backend::{GraphicsBackend, Mat4, orthographic};
pub use render_loop::{DisplayHandle, FpsCallback, RenderLoop};
pub use software::SoftwareBackend;
pub use wgpu_backend::WgpuBackend;

use crate::constants::rgba_size;
use crate::errors::RenderError;
use crate::fps::FpsWindow;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Renderer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// No program, no texture
    Created,
    /// Program linked, texture allocated
    Ready,
    /// Projection configured for a frame size
    Sized { width: u32, height: u32 },
    /// At least one frame drawn
    Rendering { width: u32, height: u32 },
    /// Texture released; draws are no-ops
    Destroyed,
}

impl RendererState {
    /// Whether the surface exists and draws do real work
    pub fn is_live(&self) -> bool {
        !matches!(self, RendererState::Created | RendererState::Destroyed)
    }
}

/// CPU copy of the latest processed frame
///
/// The backing storage is only reallocated when the byte length changes.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    has_frame: bool,
    allocations: usize,
}

impl StagingBuffer {
    /// Copy `bytes` in; returns true when storage had to be reallocated
    pub fn store(&mut self, bytes: &[u8], width: u32, height: u32) -> bool {
        let reallocated = self.data.len() != bytes.len();
        if reallocated {
            // Fresh allocation so a stale buffer is never reused across sizes
            self.data = vec![0; bytes.len()];
            self.allocations += 1;
        }
        self.data.copy_from_slice(bytes);
        self.width = width;
        self.height = height;
        self.has_frame = true;
        reallocated
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_frame(&self) -> bool {
        self.has_frame
    }

    /// Current backing capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// How many times storage has been (re)allocated
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

pub struct FrameRenderer {
    backend: Box<dyn GraphicsBackend>,
    state: RendererState,
    staging: StagingBuffer,
    display_fps: FpsWindow,
}

impl FrameRenderer {
    pub fn new(backend: Box<dyn GraphicsBackend>) -> Self {
        Self::with_fps_window(backend, crate::constants::FPS_WINDOW)
    }

    pub fn with_fps_window(backend: Box<dyn GraphicsBackend>, window: Duration) -> Self {
        Self {
            backend,
            state: RendererState::Created,
            staging: StagingBuffer::default(),
            display_fps: FpsWindow::new(window),
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Most recent display rate
    pub fn display_fps(&self) -> f32 {
        self.display_fps.fps()
    }

    /// Compile and link the program and allocate the texture
    ///
    /// An error here means nothing can ever be drawn; callers should abort.
    pub fn on_surface_created(&mut self) -> Result<(), RenderError> {
        if self.state.is_live() {
            debug!(state = ?self.state, "Surface already created");
            return Ok(());
        }
        self.backend.init()?;
        self.state = RendererState::Ready;
        info!(backend = self.backend.name(), "Renderer ready");
        Ok(())
    }

    /// Configure the projection for frames of `width` x `height`
    ///
    /// The quad always spans the whole -1..1 viewport, so the projection is
    /// the same for every size.
    pub fn set_frame_size(&mut self, width: u32, height: u32) {
        if !self.state.is_live() {
            debug!(state = ?self.state, width, height, "No surface, ignoring frame size");
            return;
        }
        self.backend
            .set_projection(orthographic(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0));
        self.state = RendererState::Sized { width, height };
        info!(width, height, "Renderer sized");
    }

    /// Stage a processed RGBA frame for the next draw
    ///
    /// Zero-sized or short frames are rejected and the previous frame stays.
    pub fn update_frame(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<(), RenderError> {
        let expected = rgba_size(width, height);
        if expected == 0 || rgba.len() != expected {
            return Err(RenderError::InvalidFrame(format!(
                "{}x{} frame with {} bytes (expected {})",
                width,
                height,
                rgba.len(),
                expected
            )));
        }
        if self.staging.store(rgba, width, height) {
            debug!(width, height, bytes = rgba.len(), "Staging buffer reallocated");
        }
        Ok(())
    }

    /// Draw one tick
    ///
    /// Returns the display rate when a frame was drawn, `None` when the
    /// surface is gone, no frame has arrived yet, or the frame was skipped.
    pub fn draw_frame(&mut self, now: Instant) -> Option<f32> {
        if !self.state.is_live() {
            return None;
        }

        self.backend.begin_frame();
        if !self.staging.has_frame() {
            self.finish_frame();
            return None;
        }

        let (width, height) = self.staging.dimensions();
        if let Err(e) = self.backend.upload_texture(width, height, self.staging.data()) {
            warn!(error = %e, "Skipping draw");
            self.finish_frame();
            return None;
        }
        if let Err(e) = self.backend.draw_quad() {
            warn!(error = %e, "Skipping draw");
            self.finish_frame();
            return None;
        }
        if !self.finish_frame() {
            return None;
        }

        if let RendererState::Ready | RendererState::Sized { .. } = self.state {
            self.state = RendererState::Rendering { width, height };
        }
        Some(self.display_fps.record(now))
    }

    fn finish_frame(&mut self) -> bool {
        match self.backend.end_frame() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to finish frame");
                false
            }
        }
    }

    /// Release the texture; later draws do nothing until a new surface
    pub fn on_surface_destroyed(&mut self) {
        if !self.state.is_live() {
            debug!(state = ?self.state, "No surface to destroy");
            return;
        }
        self.backend.release_texture();
        self.state = RendererState::Destroyed;
        self.display_fps.clear();
        info!("Renderer surface destroyed");
    }
}
