// SPDX-License-Identifier: MPL-2.0

//! Edgecam - live camera edge detection
//!
//! This library provides a real-time frame pipeline: frames are captured on a
//! worker thread, repacked from the sensor's flexible YUV layout into NV21,
//! run through an image processor and drawn continuously by a render thread
//! that always shows the latest result.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction and the frame source lifecycle
//! - [`media`]: Pixel format conversion
//! - [`processing`]: Processing boundary and the edge detector
//! - [`render`]: Frame renderer, drawing backends and the render thread
//! - [`pipeline`]: Orchestration and host lifecycle mapping
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let render_loop = RenderLoop::start(
//!     Box::new(SoftwareBackend::new(1280, 720)),
//!     RenderLoopConfig::default(),
//!     None,
//! )?;
//! let mut pipeline = FramePipeline::new(
//!     Arc::new(SyntheticBackend::default()),
//!     Box::new(EdgeDetector::default()),
//!     render_loop,
//!     PipelineOptions::default(),
//!     None,
//! );
//! pipeline.resume();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod fps;
pub mod gpu;
pub mod media;
pub mod pipeline;
pub mod processing;
pub mod render;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipeline::{FramePipeline, PipelineOptions, PipelineStats};
