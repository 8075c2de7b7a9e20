// SPDX-License-Identifier: GPL-3.0-only

//! CPU framebuffer backend
//!
//! Does the same work as the GPU path with nearest-neighbour sampling. Used
//! on hosts without a graphics adapter and in tests, where the framebuffer can
//! be inspected directly.

use super::backend::{GraphicsBackend, IDENTITY, Mat4, transform_point};
use crate::constants::{RGBA_BYTES_PER_PIXEL, quad};
use crate::errors::RenderError;
use tracing::debug;

const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];

struct Texture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

pub struct SoftwareBackend {
    width: u32,
    height: u32,
    framebuffer: Vec<u8>,
    texture: Option<Texture>,
    projection: Mat4,
    in_frame: bool,
    frames_presented: u64,
}

impl SoftwareBackend {
    /// Backend drawing into a `width` x `height` framebuffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            framebuffer: vec![0; width as usize * height as usize * RGBA_BYTES_PER_PIXEL],
            texture: None,
            projection: IDENTITY,
            in_frame: false,
            frames_presented: 0,
        }
    }

    /// RGBA contents of the last presented frame
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Pixel rectangle covered by the projected quad, as (x0, y0, x1, y1) in
    /// NDC with y pointing up
    fn quad_bounds(&self) -> (f32, f32, f32, f32) {
        let mut bounds = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for [x, y] in quad::POSITIONS {
            let (nx, ny) = transform_point(&self.projection, x, y);
            bounds.0 = bounds.0.min(nx);
            bounds.1 = bounds.1.min(ny);
            bounds.2 = bounds.2.max(nx);
            bounds.3 = bounds.3.max(ny);
        }
        bounds
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn init(&mut self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::DeviceCreation(format!(
                "framebuffer {}x{} is empty",
                self.width, self.height
            )));
        }
        self.texture = Some(Texture {
            width: 1,
            height: 1,
            data: CLEAR_COLOR.to_vec(),
        });
        debug!(width = self.width, height = self.height, "Software backend ready");
        Ok(())
    }

    fn set_projection(&mut self, mvp: Mat4) {
        self.projection = mvp;
    }

    fn begin_frame(&mut self) {
        for px in self.framebuffer.chunks_exact_mut(RGBA_BYTES_PER_PIXEL) {
            px.copy_from_slice(&CLEAR_COLOR);
        }
        self.in_frame = true;
    }

    fn upload_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        let expected = width as usize * height as usize * RGBA_BYTES_PER_PIXEL;
        if width == 0 || height == 0 || rgba.len() < expected {
            return Err(RenderError::InvalidFrame(format!(
                "{}x{} upload with {} bytes",
                width,
                height,
                rgba.len()
            )));
        }
        let texture = self.texture.as_mut().ok_or(RenderError::SurfaceLost)?;
        if texture.width != width || texture.height != height {
            texture.width = width;
            texture.height = height;
            texture.data = vec![0; expected];
        }
        texture.data.copy_from_slice(&rgba[..expected]);
        Ok(())
    }

    fn draw_quad(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::InvalidFrame("draw outside a frame".to_string()));
        }
        let texture = self.texture.as_ref().ok_or(RenderError::SurfaceLost)?;
        let (x0, y0, x1, y1) = self.quad_bounds();
        if x1 <= x0 || y1 <= y0 {
            return Ok(());
        }

        let (fw, fh) = (self.width as usize, self.height as usize);
        let (tw, th) = (texture.width as usize, texture.height as usize);
        for py in 0..fh {
            let ndc_y = 1.0 - 2.0 * (py as f32 + 0.5) / fh as f32;
            if ndc_y < y0 || ndc_y > y1 {
                continue;
            }
            // Texture row 0 sits at the top of the quad
            let v = (y1 - ndc_y) / (y1 - y0);
            let ty = ((v * th as f32) as usize).min(th - 1);
            for px in 0..fw {
                let ndc_x = 2.0 * (px as f32 + 0.5) / fw as f32 - 1.0;
                if ndc_x < x0 || ndc_x > x1 {
                    continue;
                }
                let u = (ndc_x - x0) / (x1 - x0);
                let tx = ((u * tw as f32) as usize).min(tw - 1);

                let src = (ty * tw + tx) * RGBA_BYTES_PER_PIXEL;
                let dst = (py * fw + px) * RGBA_BYTES_PER_PIXEL;
                self.framebuffer[dst..dst + RGBA_BYTES_PER_PIXEL]
                    .copy_from_slice(&texture.data[src..src + RGBA_BYTES_PER_PIXEL]);
            }
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.in_frame = false;
        self.frames_presented += 1;
        Ok(())
    }

    fn release_texture(&mut self) {
        if self.texture.take().is_some() {
            debug!("Software texture released");
        }
    }
}
