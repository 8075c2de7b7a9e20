// SPDX-License-Identifier: MPL-2.0

//! Error types for the frame pipeline
//!
//! Capture and processing errors are contained where they happen (logged, frame
//! dropped). Only renderer initialization failures travel up to the host.

use std::fmt;

pub use crate::backends::camera::types::BackendError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture backend errors
    Camera(BackendError),
    /// Processing stage errors
    Processing(ProcessingError),
    /// Display stage errors
    Render(RenderError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised at the processing boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// `process_frame` called before any session was initialized
    NotInitialized,
    /// Input buffer length does not match the planar 4:2:0 size for its dimensions
    InputSizeMismatch { expected: usize, actual: usize },
    /// Frame dimensions differ from the active session
    ResolutionMismatch {
        session: (u32, u32),
        frame: (u32, u32),
    },
    /// The processing routine itself failed
    Failed(String),
}

/// Errors raised by the display stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Vertex or fragment program failed to compile
    ShaderCompilation(String),
    /// Program failed to link into a pipeline
    ProgramLink(String),
    /// No graphics adapter could be found
    AdapterUnavailable(String),
    /// Device creation failed
    DeviceCreation(String),
    /// Frame cannot be drawn (zero sized, short buffer)
    InvalidFrame(String),
    /// Operation needs a surface that no longer exists
    SurfaceLost,
}

impl RenderError {
    /// Whether the renderer can never draw after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::ShaderCompilation(_)
                | RenderError::ProgramLink(_)
                | RenderError::AdapterUnavailable(_)
                | RenderError::DeviceCreation(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Processing(e) => write!(f, "Processing error: {}", e),
            AppError::Render(e) => write!(f, "Render error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingError::NotInitialized => write!(f, "Processing session not initialized"),
            ProcessingError::InputSizeMismatch { expected, actual } => write!(
                f,
                "Input buffer is {} bytes, expected {}",
                actual, expected
            ),
            ProcessingError::ResolutionMismatch { session, frame } => write!(
                f,
                "Frame is {}x{} but session is {}x{}",
                frame.0, frame.1, session.0, session.1
            ),
            ProcessingError::Failed(msg) => write!(f, "Processing failed: {}", msg),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ShaderCompilation(msg) => write!(f, "Could not compile shader: {}", msg),
            RenderError::ProgramLink(msg) => write!(f, "Error linking program: {}", msg),
            RenderError::AdapterUnavailable(msg) => write!(f, "No graphics adapter: {}", msg),
            RenderError::DeviceCreation(msg) => write!(f, "Failed to create device: {}", msg),
            RenderError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            RenderError::SurfaceLost => write!(f, "Drawing surface is gone"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ProcessingError {}
impl std::error::Error for RenderError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err)
    }
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        AppError::Processing(err)
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_errors_are_fatal() {
        assert!(RenderError::ShaderCompilation("x".into()).is_fatal());
        assert!(RenderError::ProgramLink("x".into()).is_fatal());
        assert!(!RenderError::InvalidFrame("zero size".into()).is_fatal());
        assert!(!RenderError::SurfaceLost.is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err: AppError = RenderError::ProgramLink("missing entry point".into()).into();
        assert_eq!(
            err.to_string(),
            "Render error: Error linking program: missing entry point"
        );

        let err = ProcessingError::InputSizeMismatch {
            expected: 6,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Input buffer is 4 bytes, expected 6");
    }
}
