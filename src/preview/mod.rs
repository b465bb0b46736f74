//! Live preview orchestration
//!
//! - Debounce scheduling of renders
//! - The preview controller actor and its display surface interface

pub mod controller;
pub mod scheduler;

pub use controller::{
    DisplaySurface, PreviewController, PreviewHandle, PreviewSnapshot, PreviewState,
    RenderVerdict, SourceText,
};
pub use scheduler::{DebounceScheduler, Timer, TokioTimer};
