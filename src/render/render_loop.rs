// SPDX-License-Identifier: GPL-3.0-only

//! Render thread
//!
//! The renderer lives on its own thread and ticks at a fixed rate whether or
//! not new frames arrive. Producers talk to it through a [`DisplayHandle`],
//! which drops frames into a single slot: a newer frame replaces one the
//! render thread has not picked up yet, so there is never a backlog.
//!
//! Resolution changes share the slot's lock and are applied before the frame
//! that follows them.

use super::{FrameRenderer, GraphicsBackend};
use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::constants::{FPS_WINDOW, timing};
use crate::errors::RenderError;
use crate::processing::ProcessedFrame;
use futures::channel::oneshot;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outward display-rate callback, invoked on the render thread after each draw
pub type FpsCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Builds the drawing backend on the render thread
pub type BackendFactory =
    Box<dyn FnOnce() -> Result<Box<dyn GraphicsBackend>, RenderError> + Send>;

/// Render loop settings
#[derive(Debug, Clone, Copy)]
pub struct RenderLoopConfig {
    /// Ticks per second
    pub fps: u32,
    /// Rolling window for the display rate
    pub fps_window: Duration,
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            fps: timing::DEFAULT_RENDER_FPS,
            fps_window: FPS_WINDOW,
        }
    }
}

/// Work posted to the render thread, picked up once per tick
#[derive(Default)]
struct Pending {
    resolution: Option<(u32, u32)>,
    frame: Option<ProcessedFrame>,
}

struct Shared {
    pending: Mutex<Pending>,
    paused: AtomicBool,
    /// Last display rate, as f32 bits
    display_fps: AtomicU32,
    /// Frames replaced in the slot before the render thread saw them
    dropped: AtomicU32,
}

impl Shared {
    /// Move pending work into the renderer, resolution first
    fn apply_pending(&self, renderer: &mut FrameRenderer) {
        let pending = match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(e) => {
                warn!(error = %e, "Pending frame slot poisoned, skipping");
                return;
            }
        };

        if let Some((width, height)) = pending.resolution {
            renderer.set_frame_size(width, height);
        }
        if let Some(frame) = pending.frame {
            if let Err(e) = renderer.update_frame(&frame.data, frame.width, frame.height) {
                warn!(error = %e, "Dropping frame");
            }
        }
    }
}

/// Cheap, cloneable handle for posting work to the render thread
#[derive(Clone)]
pub struct DisplayHandle {
    shared: Arc<Shared>,
}

impl DisplayHandle {
    /// Replace the pending frame with `frame`
    pub fn update_frame(&self, frame: ProcessedFrame) {
        match self.shared.pending.lock() {
            Ok(mut pending) => {
                if pending.frame.replace(frame).is_some() {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => warn!(error = %e, "Pending frame slot poisoned, dropping frame"),
        }
    }

    /// Announce the size of frames that follow
    pub fn set_target_resolution(&self, width: u32, height: u32) {
        match self.shared.pending.lock() {
            Ok(mut pending) => pending.resolution = Some((width, height)),
            Err(e) => warn!(error = %e, "Pending frame slot poisoned, dropping resolution"),
        }
    }

    /// Most recent display rate
    pub fn display_fps(&self) -> f32 {
        f32::from_bits(self.shared.display_fps.load(Ordering::Relaxed))
    }

    /// Frames overwritten before they were drawn
    pub fn dropped_frames(&self) -> u32 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// State owned by the render thread
struct RenderThread {
    renderer: FrameRenderer,
    interval: Duration,
    next_tick: Instant,
}

pub struct RenderLoop {
    controller: CaptureLoopController,
    shared: Arc<Shared>,
}

impl RenderLoop {
    /// Start the render thread with an already built backend
    pub fn start(
        backend: Box<dyn GraphicsBackend>,
        config: RenderLoopConfig,
        on_fps: Option<FpsCallback>,
    ) -> Result<Self, RenderError> {
        let factory: BackendFactory =
            Box::new(move || -> Result<Box<dyn GraphicsBackend>, RenderError> { Ok(backend) });
        Self::start_with(factory, config, on_fps)
    }

    /// Start the render thread, building the backend on it
    ///
    /// Blocks until the surface is created. Backend or program failures are
    /// returned here and no thread is left running.
    pub fn start_with(
        factory: BackendFactory,
        config: RenderLoopConfig,
        on_fps: Option<FpsCallback>,
    ) -> Result<Self, RenderError> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            paused: AtomicBool::new(false),
            display_fps: AtomicU32::new(0.0f32.to_bits()),
            dropped: AtomicU32::new(0),
        });

        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), RenderError>>();
        let interval = timing::interval_for_fps(config.fps);
        let window = config.fps_window;
        let loop_shared = Arc::clone(&shared);

        let controller = CaptureLoopController::start_with_init(
            "render-loop",
            move || {
                let created = factory().and_then(|backend| {
                    let mut renderer = FrameRenderer::with_fps_window(backend, window);
                    renderer.on_surface_created().map(|()| renderer)
                });
                match created {
                    Ok(renderer) => {
                        let _ = ready_tx.send(Ok(()));
                        Ok(RenderThread {
                            renderer,
                            interval,
                            next_tick: Instant::now(),
                        })
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.clone()));
                        Err(e)
                    }
                }
            },
            move |state: &mut RenderThread| {
                let now = Instant::now();
                if state.next_tick > now {
                    thread::sleep(state.next_tick - now);
                }
                // Pace from whichever is later so a stall doesn't cause a burst
                state.next_tick = (state.next_tick + state.interval).max(Instant::now());

                if loop_shared.paused.load(Ordering::SeqCst) {
                    return LoopAction::Continue;
                }

                loop_shared.apply_pending(&mut state.renderer);
                if let Some(fps) = state.renderer.draw_frame(Instant::now()) {
                    loop_shared
                        .display_fps
                        .store(fps.to_bits(), Ordering::Relaxed);
                    if let Some(callback) = &on_fps {
                        callback(fps);
                    }
                }
                LoopAction::Continue
            },
            |mut state: RenderThread| {
                state.renderer.on_surface_destroyed();
                debug!("Render thread torn down");
            },
        );

        match pollster::block_on(ready_rx) {
            Ok(Ok(())) => {
                info!(fps = config.fps, "Render loop started");
                Ok(Self { controller, shared })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RenderError::DeviceCreation(
                "render thread exited before creating its surface".to_string(),
            )),
        }
    }

    pub fn handle(&self) -> DisplayHandle {
        DisplayHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop ticking; posted frames keep overwriting the slot
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        debug!("Render loop paused");
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        debug!("Render loop resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Destroy the surface and join the render thread
    pub fn stop(&mut self) {
        if self.controller.is_running() {
            info!("Stopping render loop");
        }
        self.controller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SoftwareBackend;
    use std::sync::atomic::AtomicUsize;

    fn fast_config() -> RenderLoopConfig {
        RenderLoopConfig {
            fps: 200,
            fps_window: FPS_WINDOW,
        }
    }

    fn frame(width: u32, height: u32) -> ProcessedFrame {
        ProcessedFrame {
            width,
            height,
            data: vec![0u8; (width * height * 4) as usize],
            timestamp_ns: 0,
        }
    }

    #[test]
    fn test_fps_callback_fires_after_first_frame() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let callback: FpsCallback = Arc::new(move |fps| {
            assert!(fps >= 0.0);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut render_loop = RenderLoop::start(
            Box::new(SoftwareBackend::new(16, 16)),
            fast_config(),
            Some(callback),
        )
        .unwrap();

        // Nothing to draw yet
        thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let handle = render_loop.handle();
        handle.set_target_resolution(4, 4);
        handle.update_frame(frame(4, 4));
        thread::sleep(Duration::from_millis(60));
        render_loop.stop();

        assert!(calls.load(Ordering::SeqCst) > 1);
        assert!(handle.display_fps() > 0.0);
    }

    #[test]
    fn test_init_failure_is_returned() {
        let result = RenderLoop::start_with(
            Box::new(|| -> Result<Box<dyn GraphicsBackend>, RenderError> {
                Err(RenderError::ShaderCompilation("bad token".into()))
            }),
            fast_config(),
            None,
        );
        assert_eq!(
            result.err(),
            Some(RenderError::ShaderCompilation("bad token".into()))
        );
    }

    #[test]
    fn test_pending_slot_keeps_latest_frame() {
        let mut render_loop = RenderLoop::start(
            Box::new(SoftwareBackend::new(4, 4)),
            RenderLoopConfig {
                fps: 1,
                fps_window: FPS_WINDOW,
            },
            None,
        )
        .unwrap();
        // The first tick runs right away; the next one is a second out
        thread::sleep(Duration::from_millis(20));
        render_loop.pause();

        let handle = render_loop.handle();
        handle.update_frame(frame(2, 2));
        handle.update_frame(frame(4, 4));
        handle.update_frame(frame(2, 2));
        assert_eq!(handle.dropped_frames(), 2);
        render_loop.stop();
        assert!(!render_loop.is_running());
    }

    #[test]
    fn test_paused_loop_does_not_draw() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let mut render_loop = RenderLoop::start(
            Box::new(SoftwareBackend::new(4, 4)),
            fast_config(),
            Some(Arc::new(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
        render_loop.pause();
        // Let any in-flight tick finish
        thread::sleep(Duration::from_millis(20));
        let before = calls.load(Ordering::SeqCst);

        render_loop.handle().update_frame(frame(2, 2));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(calls.load(Ordering::SeqCst), before);

        render_loop.resume();
        thread::sleep(Duration::from_millis(40));
        render_loop.stop();
        assert!(calls.load(Ordering::SeqCst) > before);
    }
}
