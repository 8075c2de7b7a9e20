// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! A capture loop owns one worker thread. The worker opens its device in an
//! init step, runs one step per frame until told to stop, and always runs the
//! teardown step on the way out so the device is released on the worker that
//! opened it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::start_with_init(
///     "camera-capture",
///     || backend.open(&device, size),
///     |session| match session.next_frame(timeout) {
///         Ok(Some(frame)) => { deliver(frame); LoopAction::Continue }
///         Ok(None) => LoopAction::Continue,
///         Err(_) => LoopAction::Stop,
///     },
///     |mut session| { let _ = session.close(); },
/// );
///
/// // Later, stop the loop; returns once the worker has exited
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a loop without per-thread state
    ///
    /// The closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the controller's `stop()` method is called.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok::<(), String>(()), move |_| loop_fn(), |_| {})
    }

    /// Start a capture loop with initialization and teardown
    ///
    /// `init_fn` runs once on the worker. If it fails the error is logged and
    /// the worker exits without calling `loop_fn` or `teardown_fn`. Otherwise
    /// `teardown_fn` receives the state after the loop ends, whatever the reason.
    pub fn start_with_init<S, E, I, F, T>(
        name: &str,
        init_fn: I,
        mut loop_fn: F,
        teardown_fn: T,
    ) -> Self
    where
        S: 'static,
        E: std::fmt::Display + 'static,
        I: FnOnce() -> Result<S, E> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
        T: FnOnce(S) + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let spawn_result = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Capture loop thread started, initializing...");

                let mut state = match init_fn() {
                    Ok(s) => {
                        debug!(name = %name_clone, "Initialization successful");
                        s
                    }
                    Err(e) => {
                        warn!(name = %name_clone, error = %e, "Initialization failed");
                        return;
                    }
                };

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    match loop_fn(&mut state) {
                        LoopAction::Continue => {}
                        LoopAction::Stop => {
                            debug!(name = %name_clone, "Loop requested stop");
                            break;
                        }
                    }
                }

                teardown_fn(state);
                info!(name = %name_clone, "Capture loop thread exiting");
            });

        let thread_handle = match spawn_result {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(name = %name, error = %e, "Failed to spawn capture thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Get a clone of the stop signal for external use
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    ///
    /// After this returns the loop body will never run again.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopping from inside the loop body; the loop exits on its next check
                warn!(name = %self.name, "Capture loop stopped from its own thread");
                return;
            }
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}
