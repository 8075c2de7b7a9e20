// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the frame pipeline stages

use edgecam::backends::camera::{FrameSize, RawFrame, select_capture_size};
use edgecam::errors::{ProcessingError, RenderError};
use edgecam::media::{self, ConvertedFrame};
use edgecam::processing::{FrameProcessor, ProcessingBridge, SessionState};
use edgecam::render::render_loop::RenderLoopConfig;
use edgecam::render::{FrameRenderer, GraphicsBackend, Mat4, RenderLoop, SoftwareBackend};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Processor that writes an all-zero image
struct ZeroProcessor;

impl FrameProcessor for ZeroProcessor {
    fn name(&self) -> &str {
        "zero"
    }

    fn allocate(&mut self, _width: u32, _height: u32) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn process(
        &mut self,
        _input: &ConvertedFrame,
        output: &mut [u8],
    ) -> Result<(), ProcessingError> {
        output.fill(0);
        Ok(())
    }

    fn free(&mut self) {}
}

/// Semi-planar VU frame with padded rows, like a real sensor
fn padded_frame(width: u32, height: u32, padding: usize) -> RawFrame {
    let stride = width as usize + padding;
    let luma = stride * height as usize;
    let chroma = stride * (height as usize / 2);
    let data: Vec<u8> = (0..luma + chroma).map(|i| (i % 251) as u8).collect();
    RawFrame::semi_planar_vu(data.into(), width, height, stride, luma, stride, 7)
}

#[test]
fn test_720p_frame_flows_to_the_display() {
    let raw = padded_frame(1280, 720, 64);

    let converted = media::convert(&raw).expect("valid frame converts");
    assert_eq!(converted.data.len(), 1_382_400);
    assert_eq!(converted.timestamp_ns, 7);

    let mut bridge = ProcessingBridge::new(Box::new(ZeroProcessor));
    bridge.initialize(1280, 720).unwrap();
    let processed = bridge.process_frame(&converted).unwrap();
    assert_eq!(processed.data.len(), 3_686_400);
    assert!(bridge.last_throughput() >= 0.0);

    let mut renderer = FrameRenderer::new(Box::new(SoftwareBackend::new(320, 180)));
    renderer.on_surface_created().unwrap();
    renderer.set_frame_size(processed.width, processed.height);
    renderer
        .update_frame(&processed.data, processed.width, processed.height)
        .unwrap();

    let fps = renderer.draw_frame(Instant::now()).expect("frame drawn");
    assert!(fps >= 0.0);
}

#[test]
fn test_processing_rejects_frames_after_resolution_change() {
    let mut bridge = ProcessingBridge::new(Box::new(ZeroProcessor));
    bridge.initialize(64, 48).unwrap();

    let other = media::convert(&padded_frame(32, 24, 0)).unwrap();
    assert!(matches!(
        bridge.process_frame(&other),
        Err(ProcessingError::ResolutionMismatch { .. })
    ));

    bridge.initialize(32, 24).unwrap();
    assert_eq!(
        bridge.session_state(),
        SessionState::Ready {
            width: 32,
            height: 24
        }
    );
    assert!(bridge.process_frame(&other).is_ok());
}

/// Backend that only records the order of calls
struct CallLog {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl GraphicsBackend for CallLog {
    fn name(&self) -> &'static str {
        "call-log"
    }

    fn init(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn set_projection(&mut self, _mvp: Mat4) {
        self.calls.lock().unwrap().push("projection");
    }

    fn begin_frame(&mut self) {}

    fn upload_texture(&mut self, _width: u32, _height: u32, _rgba: &[u8]) -> Result<(), RenderError> {
        self.calls.lock().unwrap().push("upload");
        Ok(())
    }

    fn draw_quad(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn release_texture(&mut self) {}
}

#[test]
fn test_resolution_reaches_renderer_before_first_upload() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut render_loop = RenderLoop::start(
        Box::new(CallLog {
            calls: Arc::clone(&calls),
        }),
        RenderLoopConfig {
            fps: 200,
            ..Default::default()
        },
        None,
    )
    .unwrap();

    let handle = render_loop.handle();
    let mut bridge = ProcessingBridge::new(Box::new(ZeroProcessor));
    bridge.initialize(16, 8).unwrap();
    let processed = bridge
        .process_frame(&media::convert(&padded_frame(16, 8, 0)).unwrap())
        .unwrap();

    // Same order the pipeline uses
    handle.set_target_resolution(16, 8);
    handle.update_frame(processed);
    thread::sleep(Duration::from_millis(50));
    render_loop.stop();

    let calls = calls.lock().unwrap();
    let first_upload = calls.iter().position(|c| *c == "upload").expect("uploaded");
    let projection = calls
        .iter()
        .position(|c| *c == "projection")
        .expect("projection set");
    assert!(projection < first_upload);
}

#[test]
fn test_capture_size_selection() {
    let sizes = [
        FrameSize::new(640, 480),
        FrameSize::new(1280, 720),
        FrameSize::new(1920, 1080),
    ];

    // Exact match wins
    assert_eq!(
        select_capture_size(&sizes, FrameSize::new(1280, 720)),
        Some(FrameSize::new(1280, 720))
    );
    // 1024x768 (786,432 px) is closer to 921,600 than to 307,200
    assert_eq!(
        select_capture_size(&sizes, FrameSize::new(1024, 768)),
        Some(FrameSize::new(1280, 720))
    );
    // The chosen size never loses to another on area distance
    let preferred = FrameSize::new(800, 800);
    let chosen = select_capture_size(&sizes, preferred).unwrap();
    assert!(
        sizes
            .iter()
            .all(|s| chosen.area().abs_diff(preferred.area()) <= s.area().abs_diff(preferred.area()))
    );
    assert_eq!(select_capture_size(&[], preferred), None);
}
