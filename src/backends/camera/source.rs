// SPDX-License-Identifier: GPL-3.0-only

//! Frame source lifecycle
//!
//! Owns the capture device through a [`CaptureLoopController`]. Device
//! selection, opening and closing all happen on the capture worker; the
//! thread calling `start`/`pause`/`stop` only spawns and joins it.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use super::{CameraBackend, CaptureSession, select_capture_size, select_rear_camera};
use crate::constants::timing::FRAME_POLL_TIMEOUT;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback invoked on the capture worker for every delivered frame
pub type FrameCallback = Arc<dyn Fn(RawFrame) + Send + Sync>;

/// Lifecycle state of a [`FrameSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Never started
    Idle,
    /// Worker spawned
    Running,
    /// Device released, may resume
    Paused,
    /// Terminal
    Stopped,
}

pub struct FrameSource {
    backend: Arc<dyn CameraBackend>,
    preferred: FrameSize,
    callback: Option<FrameCallback>,
    state: SourceState,
    controller: Option<CaptureLoopController>,
}

impl FrameSource {
    pub fn new(backend: Arc<dyn CameraBackend>, preferred: FrameSize) -> Self {
        Self {
            backend,
            preferred,
            callback: None,
            state: SourceState::Idle,
            controller: None,
        }
    }

    /// Register the frame callback, replacing any previous one
    ///
    /// Takes effect on the next `start`/`resume`.
    pub fn set_frame_callback(&mut self, callback: FrameCallback) {
        self.callback = Some(callback);
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Whether the capture worker is alive
    ///
    /// False after a device or configuration failure even though the state
    /// still reads `Running`.
    pub fn is_capturing(&self) -> bool {
        self.controller
            .as_ref()
            .map(CaptureLoopController::is_running)
            .unwrap_or(false)
    }

    /// Open the rear camera and begin delivering frames
    ///
    /// Device failures are logged on the worker and leave the source idle; a
    /// later `start` tries again.
    pub fn start(&mut self) {
        match self.state {
            SourceState::Stopped => {
                warn!("Frame source was stopped, ignoring start");
                return;
            }
            SourceState::Running if self.is_capturing() => {
                debug!("Frame source already running");
                return;
            }
            _ => {}
        }

        // Reap a worker that exited on its own (device error, disconnect)
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
        }

        let backend = Arc::clone(&self.backend);
        let preferred = self.preferred;
        let callback = self.callback.clone();
        if callback.is_none() {
            warn!("Frame source started without a frame callback; frames will be dropped");
        }

        let controller = CaptureLoopController::start_with_init(
            "frame-source",
            move || open_rear_session(backend.as_ref(), preferred),
            move |session: &mut Box<dyn CaptureSession>| {
                match session.next_frame(FRAME_POLL_TIMEOUT) {
                    Ok(Some(frame)) => {
                        if let Some(callback) = &callback {
                            callback(frame);
                        }
                        LoopAction::Continue
                    }
                    Ok(None) => LoopAction::Continue,
                    Err(e) => {
                        warn!(error = %e, "Capture failed, stopping frame source");
                        LoopAction::Stop
                    }
                }
            },
            |mut session: Box<dyn CaptureSession>| {
                if let Err(e) = session.close() {
                    warn!(error = %e, "Failed to close capture session");
                }
            },
        );

        self.controller = Some(controller);
        self.state = SourceState::Running;
    }

    /// Release the device; no frames are delivered until `resume`
    pub fn pause(&mut self) {
        if self.state != SourceState::Running {
            debug!(state = ?self.state, "Frame source not running, nothing to pause");
            return;
        }
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
        }
        self.state = SourceState::Paused;
        info!("Frame source paused");
    }

    pub fn resume(&mut self) {
        self.start();
    }

    /// Release the device for good
    ///
    /// Once this returns the frame callback is never invoked again.
    pub fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
        }
        if self.state != SourceState::Stopped {
            info!("Frame source stopped");
        }
        self.state = SourceState::Stopped;
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
        }
    }
}

/// Pick the rear camera, choose its capture size and open it
fn open_rear_session(
    backend: &dyn CameraBackend,
    preferred: FrameSize,
) -> BackendResult<Box<dyn CaptureSession>> {
    let cameras = backend.enumerate_cameras()?;
    let device = select_rear_camera(&cameras)
        .ok_or_else(|| BackendError::DeviceNotFound("no rear-facing camera".to_string()))?;

    let sizes = backend.supported_sizes(device)?;
    let size = select_capture_size(&sizes, preferred).ok_or_else(|| {
        BackendError::ConfigurationFailed(format!("{} reports no capture sizes", device.name))
    })?;

    info!(device = %device.name, %size, %preferred, "Selected capture size");
    backend.open(device, size)
}
