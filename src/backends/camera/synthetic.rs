// SPDX-License-Identifier: GPL-3.0-only

//! Built-in test pattern camera
//!
//! Produces frames the way a phone sensor hands them out: a luma plane with
//! padded rows followed by one interleaved V/U chroma plane (pixel stride 2),
//! so downstream code never gets to assume tight packing.

use super::types::*;
use super::{CameraBackend, CaptureSession};
use crate::constants::timing;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Row padding added to both planes, in bytes
const ROW_PADDING: usize = 32;

/// Sizes every synthetic device advertises
pub const SYNTHETIC_SIZES: [FrameSize; 3] = [
    FrameSize::new(640, 480),
    FrameSize::new(1280, 720),
    FrameSize::new(1920, 1080),
];

/// Camera backend backed by a generated moving pattern
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    fps: u32,
    sizes: Vec<FrameSize>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(timing::DEFAULT_CAPTURE_FPS)
    }
}

impl SyntheticBackend {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            sizes: SYNTHETIC_SIZES.to_vec(),
        }
    }

    /// Override the advertised sizes
    pub fn with_sizes(mut self, sizes: Vec<FrameSize>) -> Self {
        self.sizes = sizes;
        self
    }
}

impl CameraBackend for SyntheticBackend {
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        Ok(vec![
            CameraDevice {
                id: "synthetic:0".to_string(),
                name: "Synthetic Front Camera".to_string(),
                facing: LensFacing::Front,
            },
            CameraDevice {
                id: "synthetic:1".to_string(),
                name: "Synthetic Rear Camera".to_string(),
                facing: LensFacing::Back,
            },
        ])
    }

    fn supported_sizes(&self, device: &CameraDevice) -> BackendResult<Vec<FrameSize>> {
        if !device.id.starts_with("synthetic:") {
            return Err(BackendError::DeviceNotFound(device.id.clone()));
        }
        Ok(self.sizes.clone())
    }

    fn open(
        &self,
        device: &CameraDevice,
        size: FrameSize,
    ) -> BackendResult<Box<dyn CaptureSession>> {
        if !self.supported_sizes(device)?.contains(&size) {
            return Err(BackendError::ConfigurationFailed(format!(
                "{} does not support {}",
                device.name, size
            )));
        }
        if size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(BackendError::ConfigurationFailed(format!(
                "odd capture size {}",
                size
            )));
        }

        info!(device = %device.name, %size, fps = self.fps, "Opening synthetic camera");
        Ok(Box::new(SyntheticSession::new(size, self.fps)))
    }
}

/// Open synthetic capture session
struct SyntheticSession {
    size: FrameSize,
    interval: Duration,
    started: Instant,
    next_deadline: Instant,
    frame_index: u64,
    closed: bool,
}

impl SyntheticSession {
    fn new(size: FrameSize, fps: u32) -> Self {
        let now = Instant::now();
        Self {
            size,
            interval: timing::interval_for_fps(fps),
            started: now,
            next_deadline: now,
            frame_index: 0,
            closed: false,
        }
    }

    fn render_pattern(&self) -> RawFrame {
        let width = self.size.width as usize;
        let height = self.size.height as usize;
        let stride = width + ROW_PADDING;
        let chroma_offset = stride * height;
        let chroma_rows = height / 2;

        // Padding bytes are left at 0xEE so a converter that ignores strides shows it
        let mut data = vec![0xEEu8; chroma_offset + stride * chroma_rows];

        // Diagonal bars that drift one pixel per frame, with a bright box
        let shift = self.frame_index as usize;
        let box_x = (shift * 4) % width.max(1);
        let box_size = (height / 6).max(2);
        for row in 0..height {
            let line = &mut data[row * stride..row * stride + width];
            for (col, px) in line.iter_mut().enumerate() {
                let bar = ((col + row + shift) / 32) % 2 == 0;
                let in_box = col >= box_x
                    && col < box_x + box_size
                    && row >= height / 3
                    && row < height / 3 + box_size;
                *px = if in_box {
                    235
                } else if bar {
                    180
                } else {
                    40
                };
            }
        }

        // V then U, one pair per 2x2 luma block
        for row in 0..chroma_rows {
            let start = chroma_offset + row * stride;
            let line = &mut data[start..start + width];
            for (pair, vu) in line.chunks_exact_mut(2).enumerate() {
                vu[0] = (128 + (row * 64 / chroma_rows.max(1)) as i32 - 32) as u8;
                vu[1] = (128 + (pair * 64 / (width / 2).max(1)) as i32 - 32) as u8;
            }
        }

        let timestamp_ns = self.next_deadline.duration_since(self.started).as_nanos() as u64;
        RawFrame::semi_planar_vu(
            Arc::from(data),
            self.size.width,
            self.size.height,
            stride,
            chroma_offset,
            stride,
            timestamp_ns,
        )
    }
}

impl CaptureSession for SyntheticSession {
    fn size(&self) -> FrameSize {
        self.size
    }

    fn next_frame(&mut self, timeout: Duration) -> BackendResult<Option<RawFrame>> {
        if self.closed {
            return Err(BackendError::Disconnected);
        }

        let now = Instant::now();
        if self.next_deadline > now {
            let wait = self.next_deadline - now;
            if wait > timeout {
                thread::sleep(timeout);
                return Ok(None);
            }
            thread::sleep(wait);
        }

        let frame = self.render_pattern();
        self.frame_index += 1;
        // Don't try to catch up after a stall; pace from whichever is later
        self.next_deadline = (self.next_deadline + self.interval).max(Instant::now());
        Ok(Some(frame))
    }

    fn close(&mut self) -> BackendResult<()> {
        if !self.closed {
            debug!(size = %self.size, frames = self.frame_index, "Closing synthetic camera");
            self.closed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rear(backend: &SyntheticBackend) -> CameraDevice {
        backend
            .enumerate_cameras()
            .unwrap()
            .into_iter()
            .find(|c| c.facing == LensFacing::Back)
            .unwrap()
    }

    #[test]
    fn test_enumerates_front_and_rear() {
        let backend = SyntheticBackend::default();
        let cameras = backend.enumerate_cameras().unwrap();
        assert_eq!(cameras.len(), 2);
        assert!(cameras.iter().any(|c| c.facing == LensFacing::Front));
        assert!(cameras.iter().any(|c| c.facing == LensFacing::Back));
    }

    #[test]
    fn test_frames_are_padded_and_semi_planar() {
        let backend = SyntheticBackend::new(1000);
        let device = rear(&backend);
        let mut session = backend.open(&device, FrameSize::new(640, 480)).unwrap();

        let frame = session
            .next_frame(Duration::from_secs(1))
            .unwrap()
            .expect("frame");
        assert_eq!(frame.size(), FrameSize::new(640, 480));
        assert_eq!(frame.format, PixelFormat::Yuv420);
        assert_eq!(frame.y_plane.row_stride, 640 + ROW_PADDING);
        assert_eq!(frame.u_plane.pixel_stride, 2);
        assert_eq!(frame.u_plane.offset, frame.v_plane.offset + 1);
        assert_eq!(frame.data.len(), (640 + ROW_PADDING) * (480 + 240));
        // Row padding is never real image data
        assert_eq!(frame.data[640], 0xEE);
    }

    #[test]
    fn test_timestamps_increase() {
        let backend = SyntheticBackend::new(1000);
        let device = rear(&backend);
        let mut session = backend.open(&device, FrameSize::new(640, 480)).unwrap();

        let a = session.next_frame(Duration::from_secs(1)).unwrap().unwrap();
        let b = session.next_frame(Duration::from_secs(1)).unwrap().unwrap();
        assert!(b.timestamp_ns > a.timestamp_ns);
    }

    #[test]
    fn test_unsupported_size_is_configuration_error() {
        let backend = SyntheticBackend::default();
        let device = rear(&backend);
        let result = backend.open(&device, FrameSize::new(320, 240));
        assert!(matches!(result, Err(BackendError::ConfigurationFailed(_))));
    }

    #[test]
    fn test_closed_session_reports_disconnect() {
        let backend = SyntheticBackend::new(1000);
        let device = rear(&backend);
        let mut session = backend.open(&device, FrameSize::new(640, 480)).unwrap();
        session.close().unwrap();
        assert_eq!(
            session.next_frame(Duration::from_millis(10)).unwrap_err(),
            BackendError::Disconnected
        );
    }
}
