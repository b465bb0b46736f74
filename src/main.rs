//! Markdown Preview - command-line front end
//!
//! Renders a Markdown file (or stdin) to HTML once, or streams stdin
//! through the live preview pipeline, printing every update.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use markdown_preview::config::{PreviewConfig, RenderOptions, ZoomLevel};
use markdown_preview::error::RenderError;
use markdown_preview::markdown::{
    export_html, export_to_file, HtmlExportOptions, MarkdownRenderer, RenderResult,
};
use markdown_preview::preview::{DisplaySurface, PreviewController};

/// Application name for logging
const APP_NAME: &str = "markdown-preview";

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    sanitize: Option<bool>,
    zoom: Option<u16>,
    quiet_ms: Option<u64>,
    theme: Option<String>,
    toc: bool,
    fragment: bool,
    stream: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = parse_args();
    log::debug!("Starting {} with {:?}", APP_NAME, args);

    let config = load_config(&args);
    let options = render_options(&config, &args)?;

    if args.stream {
        return stream_stdin(&args, &config, options).await;
    }

    let bytes = read_input(&args)?;
    let result = MarkdownRenderer::new()
        .render_bytes(&bytes, &options, 1)
        .context("Rendering failed")?;
    write_output(&args, &config, &options, &result)
}

/// Initialize the logging system
fn init_logging() {
    // Set default log level if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,markdown_preview=debug");
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();
}

/// Parse command line arguments
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                println!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--sanitize" => parsed.sanitize = Some(true),
            "--no-sanitize" => parsed.sanitize = Some(false),
            "--toc" => parsed.toc = true,
            "--fragment" => parsed.fragment = true,
            "--stream" => parsed.stream = true,
            flag @ ("--zoom" | "--quiet-ms" | "--theme" | "--config" | "-o" | "--output") => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: {} requires an argument", flag);
                    std::process::exit(1);
                };
                match flag {
                    "--zoom" => parsed.zoom = Some(parse_number(flag, value)),
                    "--quiet-ms" => parsed.quiet_ms = Some(parse_number(flag, value)),
                    "--theme" => parsed.theme = Some(value.clone()),
                    "--config" => parsed.config = Some(PathBuf::from(value)),
                    _ => parsed.output = Some(PathBuf::from(value)),
                }
                i += 1;
            }
            "-" => parsed.input = None,
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Use --help for usage information");
                std::process::exit(1);
            }
            path => parsed.input = Some(PathBuf::from(path)),
        }
        i += 1;
    }

    parsed
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Error: {} expects a number, got '{}'", flag, value);
        std::process::exit(1);
    })
}

/// Print help message
fn print_help() {
    println!(
        r#"Markdown Preview - render Markdown to sanitized, highlighted HTML

USAGE:
    {name} [OPTIONS] [FILE]

Reads FILE, or stdin when FILE is omitted or "-".

OPTIONS:
    -h, --help          Show this help message
    -v, --version       Show version information
    --sanitize          Sanitize the rendered HTML
    --no-sanitize       Do not sanitize, even if the config says so
    --zoom PERCENT      Zoom level (25-500)
    --quiet-ms MS       Debounce quiet period for --stream
    --theme NAME        Highlighting theme for the generated CSS
    --toc               Include a table of contents
    --fragment          Print only the rendered body, not a full document
    --stream            Re-render stdin as it arrives, printing each update
    --config PATH       Read settings from PATH instead of the default location
    -o, --output FILE   Write to FILE instead of stdout

EXAMPLES:
    {name} README.md -o README.html
    {name} --sanitize --fragment < notes.md
    tail -f log.md | {name} --stream --quiet-ms 250"#,
        name = APP_NAME
    );
}

/// Load settings, falling back to defaults when they cannot be read
fn load_config(args: &Args) -> PreviewConfig {
    let loaded = match &args.config {
        Some(path) => PreviewConfig::load_from(path),
        None => PreviewConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("{} ({})", e.user_message(), e);
        PreviewConfig::default()
    })
}

fn render_options(config: &PreviewConfig, args: &Args) -> Result<RenderOptions> {
    let options = RenderOptions::new(
        args.sanitize.unwrap_or(config.sanitize_html),
        args.zoom.unwrap_or(config.zoom_percent),
        args.quiet_ms.unwrap_or(config.quiet_period_ms),
    )
    .context("Invalid render options")?;
    Ok(options.with_hard_breaks(config.hard_breaks))
}

fn read_input(args: &Args) -> Result<Vec<u8>> {
    match &args.input {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))
        }
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Could not read stdin")?;
            Ok(bytes)
        }
    }
}

fn export_options(args: &Args, config: &PreviewConfig, zoom: ZoomLevel) -> HtmlExportOptions {
    HtmlExportOptions {
        title: args
            .input
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .map(String::from),
        highlight_theme: Some(
            args.theme
                .clone()
                .unwrap_or_else(|| config.highlight_theme.clone()),
        ),
        include_toc: args.toc,
        zoom,
        ..Default::default()
    }
}

fn write_output(
    args: &Args,
    config: &PreviewConfig,
    options: &RenderOptions,
    result: &RenderResult,
) -> Result<()> {
    let export = export_options(args, config, options.zoom);
    match (&args.output, args.fragment) {
        (Some(path), false) => export_to_file(result, path, &export)
            .with_context(|| format!("Could not export to {}", path.display()))?,
        (Some(path), true) => std::fs::write(path, &result.html)
            .with_context(|| format!("Could not write {}", path.display()))?,
        (None, false) => print!("{}", export_html(result, &export)),
        (None, true) => print!("{}", result.html),
    }
    Ok(())
}

/// Surface printing updates as they arrive and signalling `main`
struct StdoutSurface {
    updates: mpsc::UnboundedSender<()>,
}

impl DisplaySurface for StdoutSurface {
    fn render_ready(&self, html: &str, zoom: ZoomLevel) {
        println!("<!-- preview update, zoom {} -->\n{}", zoom, html);
        let _ = self.updates.send(());
    }

    fn render_failed(&self, error: &RenderError) {
        log::error!("Preview render failed: {}", error);
        eprintln!("{}", error.user_message());
        let _ = self.updates.send(());
    }
}

/// Feed stdin line by line into a live preview controller
async fn stream_stdin(args: &Args, config: &PreviewConfig, options: RenderOptions) -> Result<()> {
    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    let surface = Arc::new(StdoutSurface {
        updates: updates_tx,
    });
    let handle = PreviewController::spawn(options, surface)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut text = String::new();
    while let Some(line) = lines.next_line().await.context("Could not read stdin")? {
        text.push_str(&line);
        text.push('\n');
        handle.text_changed(text.clone())?;
    }

    // Render whatever is still pending and wait until it is on screen
    handle.refresh()?;
    loop {
        let snapshot = handle.snapshot().await?;
        if snapshot.displayed_revision == Some(snapshot.revision) || snapshot.last_error.is_some() {
            break;
        }
        if updates.recv().await.is_none() {
            break;
        }
    }

    let snapshot = handle.snapshot().await?;
    handle.shutdown().await?;

    if let Some(path) = &args.output {
        let result = MarkdownRenderer::new().render(&text, &options, snapshot.revision)?;
        write_output(args, config, &options, &result)
            .with_context(|| format!("Could not write final preview to {}", path.display()))?;
    }
    Ok(())
}
