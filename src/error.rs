//! Error types for Markdown Preview
//!
//! This module defines the error types used throughout the pipeline.
//! Only [`RenderError`] ever reaches the display surface; everything the
//! renderer can recover from is recorded as a [`Degradation`] instead.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::markdown::export::ExportError;

/// Top-level error type encompassing all error categories
#[derive(Error, Debug)]
pub enum AppError {
    /// Catastrophic render failures
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Document export errors
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Preview controller errors
    #[error(transparent)]
    Preview(#[from] PreviewError),
}

/// Render failures that must be surfaced to the shell.
///
/// Malformed Markdown never produces one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer itself failed (panicked) while producing output
    #[error("Renderer failed: {0}")]
    Internal(String),

    /// The background worker running the render was lost
    #[error("Render worker failed: {0}")]
    WorkerFailed(String),
}

/// Recoverable rendering problems. Recorded on the render result and
/// logged, never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Degradation {
    /// A fenced code block was never closed and ran to end of input
    UnterminatedFence { line: usize },

    /// Input bytes were not valid UTF-8 and were decoded lossily
    InvalidUtf8,

    /// A code block named a language the highlighter does not know
    HighlightFallback { language: String },

    /// The sanitizer removed elements from the output
    SanitizationStrip { removed_tags: usize },

    /// Nesting went past `depth`; deeper levels were merged into their parent
    NestingFlattened { line: usize, depth: usize },
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error loading configuration file
    #[error("Could not load configuration: {path}")]
    LoadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error saving configuration
    #[error("Could not save configuration: {path}")]
    SaveError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing configuration
    #[error("Invalid configuration format: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Configuration directory error
    #[error("Could not access configuration directory")]
    DirectoryError,
}

/// Preview controller errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreviewError {
    /// The controller task is gone; events can no longer be delivered
    #[error("Preview controller has shut down")]
    Closed,

    /// Timers and render workers need a tokio runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for renders
pub type RenderOutcome<T> = Result<T, RenderError>;

impl RenderError {
    /// Create a user-friendly message for the non-fatal notice the shell shows
    pub fn user_message(&self) -> String {
        match self {
            RenderError::Internal(_) => {
                "The preview could not be updated. Showing the last successful render.".to_string()
            }
            RenderError::WorkerFailed(_) => {
                "The preview worker stopped unexpectedly. Showing the last successful render."
                    .to_string()
            }
        }
    }
}

impl ConfigError {
    /// Create a user-friendly error message suitable for display in dialogs
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::LoadError { .. } | ConfigError::ParseError(_) => {
                "Preview settings could not be read. Defaults are being used.".to_string()
            }
            ConfigError::SaveError { .. } => {
                "Preview settings could not be saved. Check disk space and permissions.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
