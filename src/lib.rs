//! Markdown Preview
//!
//! Live Markdown-to-HTML preview pipeline: edits are debounced, rendered
//! on a worker with syntax highlighting and optional sanitization, and
//! handed to a display surface together with the current zoom.

pub mod config;
pub mod error;
pub mod markdown;
pub mod preview;

pub use config::{PreviewConfig, RenderOptions, ZoomChange, ZoomLevel};
pub use error::{AppError, Degradation, RenderError};
pub use markdown::{render, MarkdownRenderer, RenderResult, TagPolicy};
pub use preview::{DisplaySurface, PreviewController, PreviewHandle};
