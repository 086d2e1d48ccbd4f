// SPDX-License-Identifier: MPL-2.0

//! # Settings Store
//!
//! The widget keeps its settings in a small INI file (`setting.ini`) laid out
//! the way Qt's `QSettings` writes it, so existing files keep working:
//!
//! ```text
//! [General]
//! api_key=...
//! location=101010100
//! w=200
//! h=80
//! window_geometry=@Rect(50 50 200 80)
//! ```
//!
//! ## Lookup Order
//!
//! 1. `./setting.ini` in the working directory
//! 2. `$XDG_CONFIG_HOME/weather-widget/setting.ini`
//!
//! ## Lifecycle
//!
//! The file is read once at startup and turned into an immutable
//! [`WidgetConfig`]. The only write path is [`SettingsStore::store_geometry`],
//! called when the widget shuts down.

use ini::{EscapePolicy, Ini, ParseOption};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the settings file.
pub const SETTINGS_FILE: &str = "setting.ini";

/// Section Qt uses for top-level keys.
const GENERAL_SECTION: &str = "General";

pub const KEY_API_KEY: &str = "api_key";
pub const KEY_LOCATION: &str = "location";
pub const KEY_WIDTH: &str = "w";
pub const KEY_HEIGHT: &str = "h";
pub const KEY_GEOMETRY: &str = "window_geometry";

pub const DEFAULT_WIDTH: u32 = 200;
pub const DEFAULT_HEIGHT: u32 = 80;
pub const DEFAULT_X: i32 = 50;
pub const DEFAULT_Y: i32 = 50;

/// Errors raised while reading or writing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings file: {0}")]
    Parse(#[from] ini::ParseError),
}

/// Error returned when a `window_geometry` blob cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid window geometry: {0:?}")]
pub struct GeometryParseError(String);

// ============================================================================
// Window Geometry
// ============================================================================

/// Position and size of the widget window, in logical pixels.
///
/// Serialized as `@Rect(x y width height)`, which is also how `QSettings`
/// stores a plain rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Move the rectangle by a pointer delta. No clamping to any output.
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..self
        }
    }
}

impl fmt::Display for WindowGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@Rect({} {} {} {})", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for WindowGeometry {
    type Err = GeometryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GeometryParseError(s.to_string());

        let inner = s
            .trim()
            .strip_prefix("@Rect(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;

        let fields: Vec<&str> = inner.split_whitespace().collect();
        let [x, y, width, height] = fields.as_slice() else {
            return Err(invalid());
        };

        let x = x.parse::<i32>().map_err(|_| invalid())?;
        let y = y.parse::<i32>().map_err(|_| invalid())?;
        let width = width.parse::<u32>().map_err(|_| invalid())?;
        let height = height.parse::<u32>().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self::new(x, y, width, height))
    }
}

// ============================================================================
// Immutable Runtime Configuration
// ============================================================================

/// Configuration handed to every component at startup.
///
/// Built once from the [`SettingsStore`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// QWeather API key
    pub api_key: String,
    /// QWeather location id (e.g. "101010100") or "lon,lat"
    pub location: String,
    /// Initial window width (`w`)
    pub width: u32,
    /// Initial window height (`h`)
    pub height: u32,
    /// Geometry saved by the previous run, if any
    pub geometry: Option<WindowGeometry>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            location: String::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            geometry: None,
        }
    }
}

impl WidgetConfig {
    /// Rectangle the window opens with.
    ///
    /// A saved geometry wins; on first run the window is placed at
    /// (`DEFAULT_X`, `DEFAULT_Y`) with the configured `w`×`h`.
    pub fn initial_geometry(&self) -> WindowGeometry {
        self.geometry
            .unwrap_or_else(|| WindowGeometry::new(DEFAULT_X, DEFAULT_Y, self.width, self.height))
    }
}

// ============================================================================
// Settings Store
// ============================================================================

fn raw_values() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

/// INI-backed key-value store.
pub struct SettingsStore {
    path: PathBuf,
    ini: Ini,
}

impl SettingsStore {
    /// Resolve which settings file to use.
    ///
    /// Prefers `setting.ini` next to the working directory (where the icon
    /// assets also live), otherwise the per-user config directory.
    pub fn locate() -> PathBuf {
        let local = PathBuf::from(SETTINGS_FILE);
        if local.exists() {
            return local;
        }

        match dirs::config_dir() {
            Some(dir) => dir.join("weather-widget").join(SETTINGS_FILE),
            None => local,
        }
    }

    /// Open the settings file at `path`.
    ///
    /// A missing file is not an error: the store starts empty and the file is
    /// created on the first save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Settings file {:?} not found, using defaults", path);
                Ok(Self { path, ini: Ini::new() })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build a store from INI text that belongs to `path`.
    ///
    /// Values are kept verbatim: Qt writes binary blobs such as
    /// `@ByteArray(\x1\xd9...)` with its own escapes, which must not be
    /// interpreted as INI escapes or quotes.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, SettingsError> {
        let ini = Ini::load_from_str_opt(content, raw_values())?;
        Ok(Self { path: path.into(), ini })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a key in `[General]`, then in the section-less preamble.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.ini
            .get_from(Some(GENERAL_SECTION), key)
            .or_else(|| self.ini.get_from(None::<String>, key))
    }

    pub fn set_value(&mut self, key: &str, value: impl Into<String>) {
        self.ini.with_section(Some(GENERAL_SECTION)).set(key, value);
    }

    /// Write the store back to its file, creating parent directories.
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.ini.write_to_file_policy(&self.path, EscapePolicy::Nothing)?;
        Ok(())
    }

    /// Snapshot the settings into an immutable [`WidgetConfig`].
    ///
    /// Missing keys fall back to defaults; nothing here fails.
    pub fn widget_config(&self) -> WidgetConfig {
        let api_key = self.value(KEY_API_KEY).unwrap_or_default().to_string();
        let location = self.value(KEY_LOCATION).unwrap_or_default().to_string();

        if api_key.is_empty() {
            log::warn!("No `{}` configured in {:?}", KEY_API_KEY, self.path);
        }
        if location.is_empty() {
            log::warn!("No `{}` configured in {:?}", KEY_LOCATION, self.path);
        }

        let width = self.dimension(KEY_WIDTH, DEFAULT_WIDTH);
        let height = self.dimension(KEY_HEIGHT, DEFAULT_HEIGHT);

        let geometry = self.value(KEY_GEOMETRY).filter(|v| !v.trim().is_empty()).and_then(|raw| {
            raw.parse::<WindowGeometry>()
                .map_err(|e| log::warn!("Ignoring saved geometry: {}", e))
                .ok()
        });

        WidgetConfig {
            api_key,
            location,
            width,
            height,
            geometry,
        }
    }

    fn dimension(&self, key: &str, default: u32) -> u32 {
        match self.value(key) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    log::warn!("Invalid `{}` value {:?}, using {}", key, raw, default);
                    default
                }
            },
            None => default,
        }
    }

    /// Record the window geometry and persist immediately.
    ///
    /// Writing the same geometry twice leaves the file unchanged.
    pub fn store_geometry(&mut self, geometry: &WindowGeometry) -> Result<(), SettingsError> {
        self.set_value(KEY_GEOMETRY, geometry.to_string());
        self.set_value(KEY_WIDTH, geometry.width.to_string());
        self.set_value(KEY_HEIGHT, geometry.height.to_string());
        self.save()?;
        log::info!("Saved window geometry {} to {:?}", geometry, self.path);
        Ok(())
    }
}
