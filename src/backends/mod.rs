// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying capture method:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Frame Pipeline              │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │   FrameSource    │──│ CameraBackend   │  │
//! │  │ (worker thread)  │  │ (Synthetic, ..) │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera backend with device enumeration and frame capture

pub mod camera;
