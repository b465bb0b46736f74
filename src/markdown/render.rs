//! Markdown rendering pipeline
//!
//! Turns source text into display-ready HTML:
//! - Cleans the input text
//! - Parses it into a document tree
//! - Serializes the tree, highlighting fenced code
//! - Optionally sanitizes the result against a [`TagPolicy`]
//!
//! Rendering is referentially transparent: the same text and options
//! always give byte-identical HTML. Malformed Markdown never fails; the
//! only error is a renderer panic, reported as [`RenderError::Internal`].

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::clean::{clean_html, clean_text};
use super::document::{Document, OutlineEntry};
use super::highlight::SyntaxHighlighter;
use super::html::HtmlWriter;
use super::sanitize::{count_tags, sanitize, TagPolicy};
use crate::config::RenderOptions;
use crate::error::{Degradation, RenderError, RenderOutcome};

/// Class of the element wrapping every rendered body
pub const BODY_CLASS: &str = "markdown-body";

/// Output of one render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderResult {
    /// Rendered HTML body
    pub html: String,
    /// Revision of the source text this was rendered from
    pub source_revision: u64,
    /// Code blocks that received syntax highlighting
    pub highlighted_block_count: usize,
    /// Whether the sanitizer ran
    pub sanitized: bool,
    /// Headings, for a table of contents
    pub outline: Vec<OutlineEntry>,
    /// Recoverable problems hit while rendering
    pub degradations: Vec<Degradation>,
}

/// Something that can turn source text into a [`RenderResult`].
///
/// The preview controller renders through this trait so the pipeline
/// can be swapped (or instrumented) without touching the controller.
pub trait RenderBackend: Send + Sync + 'static {
    fn render(&self, text: &str, options: &RenderOptions, revision: u64)
        -> RenderOutcome<RenderResult>;
}

/// The Markdown renderer
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    policy: TagPolicy,
}

impl MarkdownRenderer {
    /// Create a renderer with the default sanitization policy
    pub fn new() -> Self {
        Self {
            policy: TagPolicy::default(),
        }
    }

    /// Create a renderer with a custom sanitization policy
    pub fn with_policy(policy: TagPolicy) -> Self {
        Self { policy }
    }

    /// Get the sanitization policy
    pub fn policy(&self) -> &TagPolicy {
        &self.policy
    }

    /// Render Markdown text
    pub fn render(
        &self,
        text: &str,
        options: &RenderOptions,
        revision: u64,
    ) -> RenderOutcome<RenderResult> {
        catch_unwind(AssertUnwindSafe(|| self.render_text(text, options, revision))).map_err(
            |panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("Render of revision {} panicked: {}", revision, message);
                RenderError::Internal(message)
            },
        )
    }

    /// Render raw bytes, decoding invalid UTF-8 lossily
    pub fn render_bytes(
        &self,
        bytes: &[u8],
        options: &RenderOptions,
        revision: u64,
    ) -> RenderOutcome<RenderResult> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.render(text, options, revision),
            Err(e) => {
                log::debug!("Input is not valid UTF-8 ({}), decoding lossily", e);
                let text = String::from_utf8_lossy(bytes);
                let mut result = self.render(&text, options, revision)?;
                result.degradations.insert(0, Degradation::InvalidUtf8);
                Ok(result)
            }
        }
    }

    fn render_text(&self, text: &str, options: &RenderOptions, revision: u64) -> RenderResult {
        let cleaned = clean_text(text);
        let document = Document::parse(&cleaned);
        let output = HtmlWriter::new(SyntaxHighlighter::shared(), options.hard_breaks)
            .write(&document);

        let mut degradations = document.degradations;
        degradations.extend(
            output
                .unknown_languages
                .into_iter()
                .map(|language| Degradation::HighlightFallback { language }),
        );

        let html = clean_html(&output.html);
        let body = if options.sanitize {
            let cleaned_html = sanitize(&html, &self.policy);
            let removed_tags = count_tags(&html).saturating_sub(count_tags(&cleaned_html));
            if removed_tags > 0 {
                degradations.push(Degradation::SanitizationStrip { removed_tags });
            }
            cleaned_html
        } else {
            html.into_owned()
        };

        for degradation in &degradations {
            log::debug!("Revision {}: {:?}", revision, degradation);
        }

        RenderResult {
            html: format!("<div class=\"{}\">\n{}</div>\n", BODY_CLASS, body),
            source_revision: revision,
            highlighted_block_count: output.highlighted_blocks,
            sanitized: options.sanitize,
            outline: document.outline,
            degradations,
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for MarkdownRenderer {
    fn render(
        &self,
        text: &str,
        options: &RenderOptions,
        revision: u64,
    ) -> RenderOutcome<RenderResult> {
        MarkdownRenderer::render(self, text, options, revision)
    }
}

/// Render with the default renderer
pub fn render(text: &str, options: &RenderOptions) -> RenderOutcome<RenderResult> {
    MarkdownRenderer::new().render(text, options, 0)
}
