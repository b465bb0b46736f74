//! Configuration management for Markdown Preview
//!
//! Holds the render options value object handed to the core, the zoom
//! model, and the persisted preview settings. The core never reads
//! settings on its own: the shell loads a [`PreviewConfig`] and turns it
//! into [`RenderOptions`] explicitly.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier following reverse-DNS convention
pub const APP_ID: &str = "org.markdown.Preview";

/// Name of the settings file inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "preview.json";

/// Smallest zoom level in percent
pub const MIN_ZOOM_PERCENT: u16 = 25;

/// Largest zoom level in percent
pub const MAX_ZOOM_PERCENT: u16 = 500;

/// Zoom level used on reset
pub const DEFAULT_ZOOM_PERCENT: u16 = 100;

/// Zoom in/out increment in percent
pub const ZOOM_STEP_PERCENT: u16 = 10;

/// Quiet period before a burst of edits is rendered
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 100;

/// Default syntect theme used for generated highlighter CSS
pub const DEFAULT_HIGHLIGHT_THEME: &str = "base16-ocean.dark";

/// Preview zoom in percent, always within
/// [`MIN_ZOOM_PERCENT`, `MAX_ZOOM_PERCENT`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub struct ZoomLevel(u16);

impl ZoomLevel {
    /// Create a zoom level, clamping out-of-range values
    pub fn new(percent: u16) -> Self {
        Self(percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT))
    }

    /// Zoom in percent
    pub fn percent(self) -> u16 {
        self.0
    }

    /// Zoom as a scale factor (1.0 = 100%)
    pub fn factor(self) -> f32 {
        f32::from(self.0) / 100.0
    }

    /// Apply a zoom change and return the resulting level
    pub fn apply(self, change: ZoomChange) -> Self {
        match change {
            ZoomChange::In => Self::new(self.0.saturating_add(ZOOM_STEP_PERCENT)),
            ZoomChange::Out => Self::new(self.0.saturating_sub(ZOOM_STEP_PERCENT)),
            ZoomChange::Reset => Self::default(),
            ZoomChange::Set(percent) => Self::new(percent),
            ZoomChange::By(delta) => Self::new(self.0.saturating_add_signed(delta)),
        }
    }
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self(DEFAULT_ZOOM_PERCENT)
    }
}

impl From<u16> for ZoomLevel {
    fn from(percent: u16) -> Self {
        Self::new(percent)
    }
}

impl From<ZoomLevel> for u16 {
    fn from(zoom: ZoomLevel) -> Self {
        zoom.0
    }
}

impl std::fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A zoom request coming from the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomChange {
    /// One step larger
    In,
    /// One step smaller
    Out,
    /// Back to 100%
    Reset,
    /// Absolute level in percent (clamped)
    Set(u16),
    /// Relative change in percentage points (clamped)
    By(i16),
}

/// Options for a single render invocation.
///
/// Immutable once handed to the renderer; the controller owns the
/// current value and replaces it through explicit calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderOptions {
    /// Run the produced HTML through the sanitizer
    pub sanitize: bool,

    /// Display scale applied by the surface
    pub zoom: ZoomLevel,

    /// Debounce quiet period in milliseconds, always > 0
    quiet_period_ms: u64,

    /// Render single newlines as `<br>`
    pub hard_breaks: bool,
}

impl RenderOptions {
    /// Create validated render options
    pub fn new(sanitize: bool, zoom_percent: u16, quiet_period_ms: u64) -> ConfigResult<Self> {
        if quiet_period_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "quiet_period_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            sanitize,
            zoom: ZoomLevel::new(zoom_percent),
            quiet_period_ms,
            hard_breaks: true,
        })
    }

    /// Toggle line-break handling
    pub fn with_hard_breaks(mut self, hard_breaks: bool) -> Self {
        self.hard_breaks = hard_breaks;
        self
    }

    /// Toggle sanitization
    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Debounce quiet period in milliseconds
    pub fn quiet_period_ms(&self) -> u64 {
        self.quiet_period_ms
    }

    /// Debounce quiet period
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sanitize: false,
            zoom: ZoomLevel::default(),
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            hard_breaks: true,
        }
    }
}

/// Persisted preview settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Sanitize rendered HTML
    pub sanitize_html: bool,

    /// Preview zoom in percent
    pub zoom_percent: u16,

    /// Debounce quiet period in milliseconds
    pub quiet_period_ms: u64,

    /// Render single newlines as line breaks
    pub hard_breaks: bool,

    /// syntect theme used to generate highlighter CSS
    pub highlight_theme: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            sanitize_html: false,
            zoom_percent: DEFAULT_ZOOM_PERCENT,
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            hard_breaks: true,
            highlight_theme: DEFAULT_HIGHLIGHT_THEME.to_string(),
        }
    }
}

impl PreviewConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> ConfigResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("No preview config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a JSON file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        log::info!("Loaded preview config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a JSON file, creating parent directories
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let save_err = |source| ConfigError::SaveError {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(save_err)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(save_err)?;
        Ok(())
    }

    /// Get the configuration directory path
    pub fn config_dir() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(APP_ID))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Get the default settings file path
    pub fn config_path() -> ConfigResult<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Convert into the options value handed to the core
    pub fn render_options(&self) -> ConfigResult<RenderOptions> {
        RenderOptions::new(self.sanitize_html, self.zoom_percent, self.quiet_period_ms)
            .map(|options| options.with_hard_breaks(self.hard_breaks))
    }
}
