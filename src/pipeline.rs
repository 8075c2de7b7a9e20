// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipeline orchestration
//!
//! Wires the pieces together:
//!
//! ```text
//! FrameSource ──RawFrame──▶ convert ──ConvertedFrame──▶ ProcessingBridge
//!  (capture worker)                                            │
//!                                                      ProcessedFrame
//!                                                              ▼
//!                                     DisplayHandle ──▶ render thread
//! ```
//!
//! Conversion and processing run inline in the frame callback, so they are
//! serialized by the capture worker. The only hand-off between threads is the
//! display's single-frame slot.
//!
//! Host lifecycle events map onto the stages: `resume` starts capture and
//! drawing, `pause` releases the camera and stops drawing, `destroy` stops
//! everything and frees the processing session.

use crate::backends::camera::{
    CameraBackend, FrameCallback, FrameSize, FrameSource, RawFrame, SourceState,
};
use crate::constants::{self, FPS_WINDOW};
use crate::media;
use crate::processing::{FrameProcessor, ProcessedFrame, ProcessingBridge, SessionState};
use crate::render::{DisplayHandle, RenderLoop};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Throughput and resolution, reported after every processed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStats {
    pub processing_fps: f32,
    pub width: u32,
    pub height: u32,
}

pub type StatsCallback = Arc<dyn Fn(PipelineStats) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Capture size to get closest to
    pub preferred_capture: FrameSize,
    /// Rolling window for processing throughput
    pub fps_window: Duration,
    /// Keep a copy of the last processed frame for snapshots
    pub retain_last_frame: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            preferred_capture: FrameSize::new(
                constants::PREFERRED_CAPTURE_WIDTH,
                constants::PREFERRED_CAPTURE_HEIGHT,
            ),
            fps_window: FPS_WINDOW,
            retain_last_frame: false,
        }
    }
}

/// Host lifecycle as seen by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Running,
    Paused,
    Destroyed,
}

/// Everything the frame callback needs, shared with the capture worker
struct FrameContext {
    bridge: Mutex<ProcessingBridge>,
    display: DisplayHandle,
    stats: Option<StatsCallback>,
    last_frame: Option<Mutex<Option<ProcessedFrame>>>,
}

impl FrameContext {
    /// Convert, process and post one frame; failures drop just this frame
    fn handle_frame(&self, raw: RawFrame) {
        let Some(converted) = media::convert(&raw) else {
            return;
        };
        // Only the converted copy travels further
        drop(raw);

        let (width, height) = (converted.width, converted.height);
        let mut bridge = match self.bridge.lock() {
            Ok(bridge) => bridge,
            Err(e) => {
                warn!(error = %e, "Processing bridge lock poisoned, dropping frame");
                return;
            }
        };

        if !bridge.session_state().matches(width, height) {
            if let Err(e) = bridge.initialize(width, height) {
                warn!(error = %e, width, height, "Failed to initialize processing session");
                return;
            }
            // The display hears about the new size before its first frame
            self.display.set_target_resolution(width, height);
        }

        let processed = match bridge.process_frame(&converted) {
            Ok(processed) => processed,
            Err(e) => {
                warn!(error = %e, "Processing failed, dropping frame");
                return;
            }
        };
        let processing_fps = bridge.last_throughput();
        drop(bridge);

        if let Some(slot) = &self.last_frame {
            match slot.lock() {
                Ok(mut last) => *last = Some(processed.clone()),
                Err(e) => debug!(error = %e, "Snapshot slot poisoned"),
            }
        }
        self.display.update_frame(processed);

        if let Some(stats) = &self.stats {
            stats(PipelineStats {
                processing_fps,
                width,
                height,
            });
        }
    }
}

pub struct FramePipeline {
    source: FrameSource,
    render_loop: RenderLoop,
    context: Arc<FrameContext>,
    state: PipelineState,
}

impl FramePipeline {
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        processor: Box<dyn FrameProcessor>,
        render_loop: RenderLoop,
        options: PipelineOptions,
        stats: Option<StatsCallback>,
    ) -> Self {
        let context = Arc::new(FrameContext {
            bridge: Mutex::new(ProcessingBridge::with_fps_window(
                processor,
                options.fps_window,
            )),
            display: render_loop.handle(),
            stats,
            last_frame: options.retain_last_frame.then(|| Mutex::new(None)),
        });

        let mut source = FrameSource::new(camera, options.preferred_capture);
        let callback_context = Arc::clone(&context);
        let callback: FrameCallback = Arc::new(move |frame| callback_context.handle_frame(frame));
        source.set_frame_callback(callback);

        Self {
            source,
            render_loop,
            context,
            state: PipelineState::Created,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn source_state(&self) -> SourceState {
        self.source.state()
    }

    /// Host resumed: start (or restart) capture and drawing
    pub fn resume(&mut self) {
        if self.state == PipelineState::Destroyed {
            warn!("Pipeline destroyed, ignoring resume");
            return;
        }
        self.render_loop.resume();
        self.source.start();
        self.state = PipelineState::Running;
        info!("Pipeline running");
    }

    /// Host paused: release the camera and stop drawing
    pub fn pause(&mut self) {
        if self.state != PipelineState::Running {
            debug!(state = ?self.state, "Pipeline not running, nothing to pause");
            return;
        }
        self.source.pause();
        self.render_loop.pause();
        self.state = PipelineState::Paused;
        info!("Pipeline paused");
    }

    /// Host destroyed: stop capture, free the processing session, stop drawing
    pub fn destroy(&mut self) {
        if self.state == PipelineState::Destroyed {
            return;
        }
        self.source.stop();
        match self.context.bridge.lock() {
            Ok(mut bridge) => bridge.release(),
            Err(e) => warn!(error = %e, "Processing bridge lock poisoned, skipping release"),
        }
        self.render_loop.stop();
        self.state = PipelineState::Destroyed;
        info!("Pipeline destroyed");
    }

    /// Latest processing throughput
    pub fn processing_fps(&self) -> f32 {
        self.context
            .bridge
            .lock()
            .map(|bridge| bridge.last_throughput())
            .unwrap_or(0.0)
    }

    /// Latest display rate
    pub fn display_fps(&self) -> f32 {
        self.context.display.display_fps()
    }

    pub fn session_state(&self) -> SessionState {
        self.context
            .bridge
            .lock()
            .map(|bridge| bridge.session_state())
            .unwrap_or(SessionState::Uninitialized)
    }

    /// Copy of the last processed frame, if retention is enabled
    pub fn last_frame(&self) -> Option<ProcessedFrame> {
        let slot = self.context.last_frame.as_ref()?;
        slot.lock().ok().and_then(|last| last.clone())
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::SyntheticBackend;
    use crate::processing::EdgeDetector;
    use crate::render::{SoftwareBackend, render_loop::RenderLoopConfig};
    use std::thread;

    fn pipeline(stats: Option<StatsCallback>) -> FramePipeline {
        let render_loop = RenderLoop::start(
            Box::new(SoftwareBackend::new(64, 36)),
            RenderLoopConfig {
                fps: 120,
                fps_window: FPS_WINDOW,
            },
            None,
        )
        .unwrap();
        FramePipeline::new(
            Arc::new(SyntheticBackend::new(60).with_sizes(vec![FrameSize::new(320, 240)])),
            Box::new(EdgeDetector::default()),
            render_loop,
            PipelineOptions {
                retain_last_frame: true,
                ..Default::default()
            },
            stats,
        )
    }

    #[test]
    fn test_lifecycle_maps_to_stages() {
        let mut pipeline = pipeline(None);
        assert_eq!(pipeline.state(), PipelineState::Created);

        pipeline.resume();
        assert_eq!(pipeline.source_state(), SourceState::Running);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(
            pipeline.session_state(),
            SessionState::Ready {
                width: 320,
                height: 240
            }
        );

        pipeline.pause();
        assert_eq!(pipeline.source_state(), SourceState::Paused);

        pipeline.resume();
        assert_eq!(pipeline.state(), PipelineState::Running);

        pipeline.destroy();
        assert_eq!(pipeline.source_state(), SourceState::Stopped);
        assert_eq!(pipeline.session_state(), SessionState::Uninitialized);

        // Destroy is terminal
        pipeline.resume();
        assert_eq!(pipeline.state(), PipelineState::Destroyed);
    }

    #[test]
    fn test_stats_and_snapshot() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut pipeline = pipeline(Some(Arc::new(move |stats: PipelineStats| {
            seen_clone.lock().unwrap().push(stats);
        })));

        pipeline.resume();
        thread::sleep(Duration::from_millis(250));
        pipeline.destroy();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|s| s.width == 320 && s.height == 240));
        assert!(seen.iter().all(|s| s.processing_fps >= 0.0));

        let snapshot = pipeline.last_frame().expect("snapshot retained");
        assert_eq!(snapshot.data.len(), 320 * 240 * 4);
    }
}
