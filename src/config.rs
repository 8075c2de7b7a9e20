// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON under the user's config directory. A missing file means
//! defaults; a malformed one is logged and replaced by defaults in memory.

use crate::constants::{self, edges, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Application directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "edgecam";
const CONFIG_FILE_NAME: &str = "config.json";

/// Width and height pair used for capture and viewport sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSetting {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture size the source tries to match (closest pixel area wins)
    pub preferred_capture: SizeSetting,
    /// Frame rate of the synthetic capture device
    pub capture_fps: u32,
    /// Tick rate of the display loop
    pub render_fps: u32,
    /// Rolling window for throughput measurements, in milliseconds
    pub fps_window_ms: u64,
    /// Size of the offscreen drawing surface
    pub viewport: SizeSetting,
    /// Edge detector hysteresis thresholds (gradient magnitude, 0-1442)
    pub edge_low_threshold: f32,
    pub edge_high_threshold: f32,
    /// Skip the GPU and draw with the CPU framebuffer backend
    pub force_software_render: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_capture: SizeSetting {
                width: constants::PREFERRED_CAPTURE_WIDTH,
                height: constants::PREFERRED_CAPTURE_HEIGHT,
            },
            capture_fps: timing::DEFAULT_CAPTURE_FPS,
            render_fps: timing::DEFAULT_RENDER_FPS,
            fps_window_ms: constants::FPS_WINDOW.as_millis() as u64,
            viewport: SizeSetting {
                width: constants::PREFERRED_CAPTURE_WIDTH,
                height: constants::PREFERRED_CAPTURE_HEIGHT,
            },
            edge_low_threshold: edges::DEFAULT_LOW_THRESHOLD,
            edge_high_threshold: edges::DEFAULT_HIGH_THRESHOLD,
            force_software_render: false,
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`; missing or malformed files yield defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }

    /// Load from `path`, reporting any read or parse failure
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("No config directory available".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.preferred_capture.width == 0 || self.preferred_capture.height == 0 {
            return Err(AppError::Config(
                "preferred_capture must be non-zero".to_string(),
            ));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(AppError::Config("viewport must be non-zero".to_string()));
        }
        if self.capture_fps == 0 || self.render_fps == 0 {
            return Err(AppError::Config("frame rates must be non-zero".to_string()));
        }
        if self.edge_low_threshold > self.edge_high_threshold {
            return Err(AppError::Config(format!(
                "edge_low_threshold ({}) exceeds edge_high_threshold ({})",
                self.edge_low_threshold, self.edge_high_threshold
            )));
        }
        Ok(())
    }

    /// Rolling window length as a Duration
    pub fn fps_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fps_window_ms.max(1))
    }
}
