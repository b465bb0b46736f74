//! Markdown module for Markdown Preview
//!
//! Handles turning Markdown source into display-ready HTML:
//! - Input text cleaning
//! - Parsing into a document tree
//! - Code block syntax highlighting
//! - HTML serialization and sanitization
//! - Standalone HTML export

pub mod clean;
pub mod document;
pub mod export;
pub mod highlight;
pub mod html;
pub mod render;
pub mod sanitize;

pub use clean::{clean_html, clean_text};
pub use document::{Document, OutlineEntry};
pub use export::{
    export_html, export_html_file, export_to_file, suggest_output_path, ExportError,
    ExportFormat, ExportResult, HtmlExportOptions,
};
pub use highlight::{highlight, stylesheet, SyntaxHighlighter};
pub use html::{escape_html, toc_html};
pub use render::{render, MarkdownRenderer, RenderBackend, RenderResult};
pub use sanitize::{sanitize, TagPolicy};
