// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which way a camera points relative to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LensFacing {
    /// Faces the user (selfie camera)
    Front,
    /// Faces away from the user
    Back,
    /// Externally attached camera
    External,
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Backend-specific identifier used to open the device
    pub id: String,
    pub name: String,
    pub facing: LensFacing,
}

/// Capture size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel area, widened so 4K-and-up sizes can't overflow
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Flexible YUV 4:2:0: one luma plane plus two chroma planes, each described
    /// by its own offset, row stride and pixel stride. Chroma planes with a
    /// pixel stride of 2 that overlap by one byte are semi-planar.
    Yuv420,
    /// Packed JPEG bitstream (not convertible here)
    Jpeg,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
}

impl PixelFormat {
    /// Check if this format is a YUV format
    pub fn is_yuv(&self) -> bool {
        matches!(self, Self::Yuv420)
    }
}

/// Location of one image plane inside a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneLayout {
    /// Offset of the plane's first sample, in bytes
    pub offset: usize,
    /// Distance between the starts of consecutive rows (may include padding)
    pub row_stride: usize,
    /// Distance between consecutive samples in a row
    pub pixel_stride: usize,
}

impl PlaneLayout {
    pub fn new(offset: usize, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            offset,
            row_stride,
            pixel_stride,
        }
    }

    /// Index of sample (`col`, `row`) in the plane's coordinate space
    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        self.offset + row * self.row_stride + col * self.pixel_stride
    }
}

/// A single frame as delivered by the capture device
///
/// Immutable once produced. `data` is reference counted so the capture
/// worker can hand it over without copying; the device's own storage is never
/// referenced after the frame is built.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// All planes, contiguous or not, live in this buffer
    pub data: Arc<[u8]>,
    /// Luma plane
    pub y_plane: PlaneLayout,
    /// Chroma planes (Cb and Cr). Half resolution in both directions.
    pub u_plane: PlaneLayout,
    pub v_plane: PlaneLayout,
    /// Capture timestamp, monotonic nanoseconds
    pub timestamp_ns: u64,
}

impl RawFrame {
    /// Build a semi-planar frame whose chroma plane stores V before U (NV21 order)
    ///
    /// The luma plane starts at 0 with `y_stride` bytes per row; the chroma plane
    /// starts at `chroma_offset` with `chroma_stride` bytes per row.
    pub fn semi_planar_vu(
        data: Arc<[u8]>,
        width: u32,
        height: u32,
        y_stride: usize,
        chroma_offset: usize,
        chroma_stride: usize,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Yuv420,
            data,
            y_plane: PlaneLayout::new(0, y_stride, 1),
            u_plane: PlaneLayout::new(chroma_offset + 1, chroma_stride, 2),
            v_plane: PlaneLayout::new(chroma_offset, chroma_stride, 2),
            timestamp_ns,
        }
    }

    /// Build a semi-planar frame whose chroma plane stores U before V (NV12 order)
    pub fn semi_planar_uv(
        data: Arc<[u8]>,
        width: u32,
        height: u32,
        y_stride: usize,
        chroma_offset: usize,
        chroma_stride: usize,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Yuv420,
            data,
            y_plane: PlaneLayout::new(0, y_stride, 1),
            u_plane: PlaneLayout::new(chroma_offset, chroma_stride, 2),
            v_plane: PlaneLayout::new(chroma_offset + 1, chroma_stride, 2),
            timestamp_ns,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// No usable camera device
    DeviceNotFound(String),
    /// Device exists but could not be opened or enumerated
    AccessFailed(String),
    /// Capture session could not be configured
    ConfigurationFailed(String),
    /// Device went away while capturing
    Disconnected,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::AccessFailed(msg) => write!(f, "Camera access error: {}", msg),
            BackendError::ConfigurationFailed(msg) => {
                write!(f, "Failed to configure camera session: {}", msg)
            }
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semi_planar_vu_layout() {
        let data: Arc<[u8]> = Arc::from(vec![0u8; 24].as_slice());
        let frame = RawFrame::semi_planar_vu(data, 4, 4, 4, 16, 4, 0);
        assert_eq!(frame.v_plane.index(0, 0), 16);
        assert_eq!(frame.u_plane.index(0, 0), 17);
        assert_eq!(frame.u_plane.index(1, 1), 17 + 4 + 2);
    }

    #[test]
    fn test_frame_size_area_does_not_overflow() {
        let size = FrameSize::new(u32::MAX, 2);
        assert_eq!(size.area(), u32::MAX as u64 * 2);
        assert_eq!(FrameSize::new(1280, 720).to_string(), "1280x720");
    }
}
