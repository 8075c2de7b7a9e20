// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Running the live pipeline headlessly
//! - Inspecting and saving the configuration

use chrono::Local;
use edgecam::backends::camera::{
    CameraBackend, FrameSize, SyntheticBackend, select_capture_size, select_rear_camera,
};
use edgecam::constants::timing;
use edgecam::errors::RenderError;
use edgecam::processing::{EdgeDetector, ProcessedFrame};
use edgecam::render::render_loop::{BackendFactory, RenderLoopConfig};
use edgecam::render::{GraphicsBackend, RenderLoop, SoftwareBackend, WgpuBackend};
use edgecam::{AppError, Config, FramePipeline, PipelineOptions, PipelineStats};
use futures::channel::mpsc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        // An explicit file must be readable
        Some(path) => Ok(Config::load_from(path)?),
        None => Ok(Config::load()),
    }
}

fn preferred_size(config: &Config) -> FrameSize {
    FrameSize::new(
        config.preferred_capture.width,
        config.preferred_capture.height,
    )
}

/// List all available cameras
pub fn list_cameras(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = SyntheticBackend::new(config.capture_fps);
    let cameras = backend.enumerate_cameras()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    let rear_id = select_rear_camera(&cameras).map(|c| c.id.clone());
    let preferred = preferred_size(config);

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let marker = if Some(&camera.id) == rear_id.as_ref() {
            " (selected)"
        } else {
            ""
        };
        println!("  [{}] {} - {}{}", index, camera.name, camera.facing, marker);

        let sizes = backend.supported_sizes(camera)?;
        let chosen = select_capture_size(&sizes, preferred);
        let size_strs: Vec<String> = sizes
            .iter()
            .map(|s| {
                if Some(*s) == chosen {
                    format!("{}*", s)
                } else {
                    s.to_string()
                }
            })
            .collect();
        println!("      Sizes: {}", size_strs.join(", "));
        println!();
    }
    println!("* closest to the preferred size {}", preferred);

    Ok(())
}

/// Print the effective config, optionally writing it back
pub fn show_config(
    config: &Config,
    path: Option<&Path>,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        let saved = match path {
            Some(path) => {
                config.save_to(path)?;
                path.to_path_buf()
            }
            None => config.save()?,
        };
        println!("Config saved: {}", saved.display());
    } else if let Some(path) = path.map(Path::to_path_buf).or_else(Config::default_path) {
        println!("Config file: {}", path.display());
    }
    Ok(())
}

/// Build the drawing backend on the render thread
///
/// Falls back to the CPU backend when no GPU device can be created. Program
/// compile and link failures happen later, in the renderer, and stay fatal.
fn display_backend(config: &Config, force_software: bool) -> BackendFactory {
    let (width, height) = (config.viewport.width, config.viewport.height);
    let software = force_software || config.force_software_render;

    Box::new(move || -> Result<Box<dyn GraphicsBackend>, RenderError> {
        if software {
            info!(width, height, "Using software display backend");
            return Ok(Box::new(SoftwareBackend::new(width, height)));
        }
        match WgpuBackend::create(width, height) {
            Ok(backend) => Ok(Box::new(backend)),
            Err(e) => {
                warn!(error = %e, "GPU unavailable, falling back to software display");
                Ok(Box::new(SoftwareBackend::new(width, height)))
            }
        }
    })
}

/// Run the live pipeline until the duration passes or Ctrl+C
pub fn run(
    config: &Config,
    duration: Option<u64>,
    force_software: bool,
    snapshot: Option<Option<PathBuf>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let render_loop = RenderLoop::start_with(
        display_backend(config, force_software),
        RenderLoopConfig {
            fps: config.render_fps,
            fps_window: config.fps_window(),
        },
        None,
    )
    .map_err(AppError::from)?;

    let (stats_tx, mut stats_rx) = mpsc::unbounded::<PipelineStats>();
    let mut pipeline = FramePipeline::new(
        Arc::new(SyntheticBackend::new(config.capture_fps)),
        Box::new(EdgeDetector::new(
            config.edge_low_threshold,
            config.edge_high_threshold,
        )),
        render_loop,
        PipelineOptions {
            preferred_capture: preferred_size(config),
            fps_window: config.fps_window(),
            retain_last_frame: snapshot.is_some(),
        },
        Some(Arc::new(move |stats| {
            let _ = stats_tx.unbounded_send(stats);
        })),
    );

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Running... (press Ctrl+C to stop)");
    pipeline.resume();

    let start = Instant::now();
    let target_duration = duration.map(Duration::from_secs);
    let mut last_log = Instant::now();
    let mut latest: Option<PipelineStats> = None;
    let mut resolution: Option<(u32, u32)> = None;

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        if target_duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }

        while let Ok(stats) = stats_rx.try_recv() {
            if resolution != Some((stats.width, stats.height)) {
                resolution = Some((stats.width, stats.height));
                println!("Resolution: {}x{}", stats.width, stats.height);
            }
            latest = Some(stats);
        }

        if last_log.elapsed() >= timing::STATS_LOG_INTERVAL {
            last_log = Instant::now();
            if let Some(stats) = latest {
                info!(
                    processing_fps = stats.processing_fps,
                    display_fps = pipeline.display_fps(),
                    width = stats.width,
                    height = stats.height,
                    "Pipeline throughput"
                );
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    pipeline.pause();
    let last_frame = pipeline.last_frame();
    pipeline.destroy();

    if let Some(requested) = snapshot {
        let frame = last_frame.ok_or("No frame was processed, nothing to save")?;
        let path = save_snapshot(frame, requested)?;
        println!("Snapshot saved: {}", path.display());
    }

    Ok(())
}

/// Write a processed frame as PNG
fn save_snapshot(
    frame: ProcessedFrame,
    requested: Option<PathBuf>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = match requested {
        Some(path) if path.is_dir() => path.join(snapshot_file_name()),
        Some(path) => path,
        None => get_default_snapshot_dir().join(snapshot_file_name()),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Encoding runs off the calling thread like any other blocking save
    let rt = tokio::runtime::Runtime::new()?;
    let save_path = path.clone();
    rt.block_on(async move {
        tokio::task::spawn_blocking(move || -> Result<(), AppError> {
            let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.data)
                .ok_or_else(|| AppError::Other("Frame buffer does not match its size".into()))?;
            image.save(&save_path)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Other(format!("Snapshot task error: {}", e)))?
    })?;

    Ok(path)
}

fn snapshot_file_name() -> String {
    format!("edges_{}.png", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Default folder name for saving snapshots
const DEFAULT_SAVE_FOLDER: &str = "Edgecam";

/// Get default snapshot directory
fn get_default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
