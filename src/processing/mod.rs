// SPDX-License-Identifier: MPL-2.0

//! Processing stage
//!
//! [`ProcessingBridge`] is the only way frames reach a [`FrameProcessor`]. It
//! tracks which resolution the processor is sized for, validates buffer sizes
//! on both sides of the call and measures throughput over a rolling window.
//!
//! Calls are synchronous and must be serialized by the caller; the pipeline
//! runs them inline on the capture worker.

pub mod edge_detector;

pub use edge_detector::EdgeDetector;

use crate::constants::{planar_420_size, rgba_size};
use crate::errors::ProcessingError;
use crate::fps::FpsWindow;
use crate::media::ConvertedFrame;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Opaque image-processing routine
///
/// Implementations hold per-resolution resources between `allocate` and
/// `free`. The bridge guarantees `process` is only called with frames matching
/// the last `allocate`.
pub trait FrameProcessor: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Size internal resources for `width` x `height` frames
    fn allocate(&mut self, width: u32, height: u32) -> Result<(), ProcessingError>;

    /// Turn an NV21 frame into RGBA, writing exactly `width * height * 4` bytes
    fn process(&mut self, input: &ConvertedFrame, output: &mut [u8])
    -> Result<(), ProcessingError>;

    /// Drop per-resolution resources
    fn free(&mut self);
}

/// Processor output, interleaved 8-bit RGBA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub timestamp_ns: u64,
}

/// Which resolution, if any, the processor is currently sized for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready { width: u32, height: u32 },
}

impl SessionState {
    /// Whether the session matches `width` x `height`
    pub fn matches(&self, width: u32, height: u32) -> bool {
        matches!(*self, SessionState::Ready { width: w, height: h } if w == width && h == height)
    }
}

pub struct ProcessingBridge {
    processor: Box<dyn FrameProcessor>,
    session: SessionState,
    throughput: FpsWindow,
}

impl ProcessingBridge {
    pub fn new(processor: Box<dyn FrameProcessor>) -> Self {
        Self::with_fps_window(processor, crate::constants::FPS_WINDOW)
    }

    pub fn with_fps_window(processor: Box<dyn FrameProcessor>, window: Duration) -> Self {
        Self {
            processor,
            session: SessionState::Uninitialized,
            throughput: FpsWindow::new(window),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    /// Size the processing session for `width` x `height`
    ///
    /// A call at the current resolution does nothing. A new resolution frees
    /// the old session first.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<(), ProcessingError> {
        if self.session.matches(width, height) {
            debug!(width, height, "Processing session already sized, skipping");
            return Ok(());
        }
        if width == 0 || height == 0 {
            return Err(ProcessingError::Failed(format!(
                "cannot size a session for {}x{}",
                width, height
            )));
        }

        if let SessionState::Ready {
            width: old_w,
            height: old_h,
        } = self.session
        {
            info!(old_w, old_h, width, height, "Resolution changed, reinitializing processor");
            self.processor.free();
            self.session = SessionState::Uninitialized;
        }

        self.processor.allocate(width, height)?;
        self.session = SessionState::Ready { width, height };
        self.throughput.clear();
        info!(processor = self.processor.name(), width, height, "Processing session ready");
        Ok(())
    }

    /// Run the processor on one frame, blocking until it returns
    pub fn process_frame(
        &mut self,
        frame: &ConvertedFrame,
    ) -> Result<ProcessedFrame, ProcessingError> {
        let SessionState::Ready { width, height } = self.session else {
            return Err(ProcessingError::NotInitialized);
        };
        if frame.width != width || frame.height != height {
            return Err(ProcessingError::ResolutionMismatch {
                session: (width, height),
                frame: (frame.width, frame.height),
            });
        }
        let expected = planar_420_size(width, height);
        if frame.data.len() != expected {
            return Err(ProcessingError::InputSizeMismatch {
                expected,
                actual: frame.data.len(),
            });
        }

        let mut output = vec![0u8; rgba_size(width, height)];
        self.processor.process(frame, &mut output)?;

        let fps = self.throughput.record(Instant::now());
        debug!(fps, "Processed frame");

        Ok(ProcessedFrame {
            width,
            height,
            data: output,
            timestamp_ns: frame.timestamp_ns,
        })
    }

    /// Most recent processing rate over the rolling window
    pub fn last_throughput(&self) -> f32 {
        self.throughput.fps()
    }

    /// Free the processing session
    ///
    /// Does nothing when no session exists.
    pub fn release(&mut self) {
        match self.session {
            SessionState::Uninitialized => {
                debug!("No processing session to release");
            }
            SessionState::Ready { width, height } => {
                self.processor.free();
                self.session = SessionState::Uninitialized;
                self.throughput.clear();
                info!(width, height, "Processing session released");
            }
        }
    }
}

impl Drop for ProcessingBridge {
    fn drop(&mut self) {
        if self.session != SessionState::Uninitialized {
            warn!("Processing bridge dropped with a live session, releasing");
            self.release();
        }
    }
}
