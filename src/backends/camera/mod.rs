// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  FramePipeline      │
//! └──────────┬──────────┘
//!            │ start / pause / resume / stop
//!            ▼
//! ┌─────────────────────┐
//! │    FrameSource      │  ← Lifecycle, device + size selection, worker thread
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Enumeration, opening sessions
//! └──────────┬──────────┘
//!            │
//!            ▼
//!      ┌───────────┐
//!      │ Synthetic │  ← Built-in test pattern device
//!      └───────────┘
//! ```

pub mod frame_loop;
pub mod source;
pub mod synthetic;
pub mod types;

pub use source::{FrameCallback, FrameSource, SourceState};
pub use synthetic::SyntheticBackend;
pub use types::*;

use std::time::Duration;

/// Camera backend trait
///
/// Implementations wrap a platform camera stack. Every method may be called
/// from the capture worker thread, so backends must be shareable.
pub trait CameraBackend: Send + Sync {
    /// Enumerate available cameras
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>>;

    /// Capture sizes the device supports for flexible YUV 4:2:0 output
    fn supported_sizes(&self, device: &CameraDevice) -> BackendResult<Vec<FrameSize>>;

    /// Open the device and configure a capture session at `size`
    fn open(
        &self,
        device: &CameraDevice,
        size: FrameSize,
    ) -> BackendResult<Box<dyn CaptureSession>>;
}

/// An open, configured capture session
pub trait CaptureSession: Send {
    /// Size frames are delivered at
    fn size(&self) -> FrameSize;

    /// Wait up to `timeout` for the next frame
    ///
    /// `Ok(None)` means no frame arrived in time. The returned frame owns its
    /// bytes; the session is free to reuse its own buffers afterwards.
    fn next_frame(&mut self, timeout: Duration) -> BackendResult<Option<RawFrame>>;

    /// Release the device
    fn close(&mut self) -> BackendResult<()>;
}

/// Pick the first rear-facing camera
pub fn select_rear_camera(cameras: &[CameraDevice]) -> Option<&CameraDevice> {
    cameras.iter().find(|c| c.facing == LensFacing::Back)
}

/// Choose the supported size whose pixel area is closest to `preferred`
///
/// Ties keep the earliest candidate. Returns `None` for an empty list.
pub fn select_capture_size(available: &[FrameSize], preferred: FrameSize) -> Option<FrameSize> {
    let target = preferred.area();
    let mut best: Option<(FrameSize, u64)> = None;
    for option in available {
        let diff = option.area().abs_diff(target);
        match best {
            Some((_, min_diff)) if diff >= min_diff => {}
            _ => best = Some((*option, diff)),
        }
    }
    best.map(|(size, _)| size)
}
