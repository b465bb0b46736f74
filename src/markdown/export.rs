//! Standalone HTML export
//!
//! Wraps a rendered body into a complete HTML document:
//! - Base stylesheet (light or dark) plus highlighter CSS from a syntect theme
//! - Linked external stylesheets
//! - Optional table of contents built from the render outline
//! - Zoom applied as the base font size

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::highlight::{stylesheet, theme_names};
use super::html::{escape_html, toc_html};
use super::render::RenderResult;
use crate::config::ZoomLevel;

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid export path")]
    InvalidPath,

    #[error("Export format not supported: {0}")]
    UnsupportedFormat(String),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
}

impl ExportFormat {
    /// Get the file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
        }
    }

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> ExportResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Options for HTML export
#[derive(Debug, Clone)]
pub struct HtmlExportOptions {
    /// Document title
    pub title: Option<String>,
    /// Include the built-in base stylesheet
    pub include_styles: bool,
    /// Use dark colours for the base stylesheet
    pub dark_mode: bool,
    /// syntect theme for code highlighting CSS; None leaves it to linked sheets
    pub highlight_theme: Option<String>,
    /// External stylesheets to link
    pub stylesheet_links: Vec<String>,
    /// Extra CSS appended after the built-in styles
    pub custom_css: Option<String>,
    /// Include table of contents
    pub include_toc: bool,
    /// Base font scale
    pub zoom: ZoomLevel,
}

impl Default for HtmlExportOptions {
    fn default() -> Self {
        Self {
            title: None,
            include_styles: true,
            dark_mode: false,
            highlight_theme: Some(crate::config::DEFAULT_HIGHLIGHT_THEME.to_string()),
            stylesheet_links: Vec::new(),
            custom_css: None,
            include_toc: false,
            zoom: ZoomLevel::default(),
        }
    }
}

/// Build a complete HTML document around a render result
pub fn export_html(result: &RenderResult, options: &HtmlExportOptions) -> String {
    let title = options
        .title
        .as_deref()
        .or_else(|| result.outline.first().map(|entry| entry.title.as_str()))
        .unwrap_or("Markdown Preview");

    let mut head = String::new();
    for link in &options.stylesheet_links {
        head.push_str(&format!(
            "    <link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(link)
        ));
    }
    let styles = document_styles(options);
    if !styles.is_empty() {
        head.push_str("    <style>\n");
        head.push_str(&styles);
        head.push_str("    </style>\n");
    }

    let toc = if options.include_toc {
        toc_html(&result.outline)
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="generator" content="Markdown Preview">
    <title>{}</title>
{}</head>
<body>
{}{}</body>
</html>
"#,
        escape_html(title),
        head,
        toc,
        result.html
    )
}

/// Export a render result to an HTML file
pub fn export_html_file(
    result: &RenderResult,
    output_path: &Path,
    options: &HtmlExportOptions,
) -> ExportResult<()> {
    if output_path.as_os_str().is_empty() || output_path.is_dir() {
        return Err(ExportError::InvalidPath);
    }
    let html = export_html(result, options);
    let mut file = fs::File::create(output_path)?;
    file.write_all(html.as_bytes())?;
    log::info!("Exported preview to {}", output_path.display());
    Ok(())
}

/// Export with the format detected from the output path.
/// The file stem becomes the title unless one is set.
pub fn export_to_file(
    result: &RenderResult,
    output_path: &Path,
    options: &HtmlExportOptions,
) -> ExportResult<()> {
    match ExportFormat::from_path(output_path)? {
        ExportFormat::Html => {
            let mut options = options.clone();
            if options.title.is_none() {
                options.title = output_path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from);
            }
            export_html_file(result, output_path, &options)
        }
    }
}

/// Generate suggested output path from input path
pub fn suggest_output_path(input_path: &Path, format: ExportFormat) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    let mut output = input_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    output.push(format!("{}.{}", stem, format.extension()));
    output
}

fn document_styles(options: &HtmlExportOptions) -> String {
    let mut css = String::new();
    if options.include_styles {
        css.push_str(&base_styles(options.dark_mode, options.zoom));
    }
    if let Some(theme) = options.highlight_theme.as_deref() {
        match stylesheet(theme) {
            Some(highlight_css) => css.push_str(&highlight_css),
            None => log::warn!(
                "Unknown highlight theme '{}', code will be unstyled (available: {})",
                theme,
                theme_names().join(", ")
            ),
        }
    }
    if let Some(custom) = options.custom_css.as_deref() {
        css.push_str(custom);
        css.push('\n');
    }
    css
}

fn base_styles(dark_mode: bool, zoom: ZoomLevel) -> String {
    let colors = if dark_mode {
        "--color-bg: #0d1117; --color-text: #c9d1d9; --color-link: #58a6ff; \
         --color-code-bg: #161b22; --color-border: #30363d; --color-muted: #8b949e;"
    } else {
        "--color-bg: #ffffff; --color-text: #24292e; --color-link: #0366d6; \
         --color-code-bg: #f6f8fa; --color-border: #e1e4e8; --color-muted: #6a737d;"
    };

    format!(
        r#":root {{ {colors} }}
body {{
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
    font-size: {font_size:.1}px;
    line-height: 1.6;
    color: var(--color-text);
    background-color: var(--color-bg);
    max-width: 900px;
    margin: 0 auto;
    padding: 2rem;
}}
.markdown-body h1, .markdown-body h2 {{ border-bottom: 1px solid var(--color-border); padding-bottom: .3em; }}
.markdown-body a {{ color: var(--color-link); text-decoration: none; }}
.markdown-body code {{ background-color: var(--color-code-bg); padding: .2em .4em; border-radius: 6px; font-size: 85%; }}
.markdown-body pre {{ background-color: var(--color-code-bg); padding: 16px; overflow: auto; border-radius: 6px; }}
.markdown-body pre code {{ background: transparent; padding: 0; font-size: 100%; }}
.markdown-body blockquote {{ margin: 16px 0; padding: 0 1em; color: var(--color-muted); border-left: .25em solid var(--color-border); }}
.markdown-body table {{ border-collapse: collapse; margin: 16px 0; }}
.markdown-body th, .markdown-body td {{ padding: 6px 13px; border: 1px solid var(--color-border); }}
.markdown-body img {{ max-width: 100%; }}
.markdown-body .task-list-item {{ list-style-type: none; }}
.markdown-body .footnote-definition {{ font-size: 0.9em; color: var(--color-muted); }}
.toc {{ background-color: var(--color-code-bg); padding: 16px 24px; border-radius: 6px; margin-bottom: 24px; }}
.toc ul {{ list-style-type: none; padding-left: 1.5em; }}
"#,
        colors = colors,
        font_size = 16.0 * zoom.factor()
    )
}
