// SPDX-License-Identifier: MPL-2.0

//! # Weather Icon Resolver
//!
//! QWeather icon codes map one-to-one onto the bundled PNG set:
//! `icons-64/{code}.png`. Icons are decoded with the `image` crate and kept
//! as straight RGBA; conversions for Cairo (premultiplied BGRA) and for the
//! tray (ARGB32, network byte order) happen on demand.
//!
//! A missing or undecodable file resolves to [`IconImage::empty`] and is only
//! logged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory of bundled condition icons, relative to the working directory.
pub const ICON_DIR: &str = "icons-64";

/// Icon used for the tray.
pub const TRAY_ICON_CODE: &str = "100";

/// Decoded icons kept in memory before the cache is flushed.
const MAX_CACHED_ICONS: usize = 32;

/// Decoded icon pixels.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IconImage {
    /// Straight (non-premultiplied) RGBA, 4 bytes per pixel
    rgba: Vec<u8>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for IconImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data_len", &self.rgba.len())
            .finish()
    }
}

impl IconImage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rgba.is_empty() || self.width == 0 || self.height == 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decode PNG/JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let img = image::load_from_memory(bytes).ok()?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Some(Self {
            rgba: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Load an icon file, degrading to an empty image.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Weather icon {:?} not available: {}", path, e);
                return Self::empty();
            }
        };

        match Self::decode(&bytes) {
            Some(icon) => {
                log::debug!("Loaded icon {:?} ({}x{})", path, icon.width, icon.height);
                icon
            }
            None => {
                log::warn!("Weather icon {:?} could not be decoded", path);
                Self::empty()
            }
        }
    }

    /// Pixels in Cairo's ARGB32 layout: little-endian BGRA, premultiplied alpha.
    pub fn to_cairo_argb32(&self) -> Vec<u8> {
        let mut bgra = Vec::with_capacity(self.rgba.len());
        for pixel in self.rgba.chunks_exact(4) {
            let [r, g, b, a] = [pixel[0], pixel[1], pixel[2], pixel[3]];
            let alpha = a as f32 / 255.0;
            bgra.push((b as f32 * alpha).round() as u8);
            bgra.push((g as f32 * alpha).round() as u8);
            bgra.push((r as f32 * alpha).round() as u8);
            bgra.push(a);
        }
        bgra
    }

    /// Pixels as StatusNotifierItem expects them: ARGB32 in network byte order.
    pub fn to_network_argb32(&self) -> Vec<u8> {
        let mut argb = Vec::with_capacity(self.rgba.len());
        for pixel in self.rgba.chunks_exact(4) {
            argb.extend_from_slice(&[pixel[3], pixel[0], pixel[1], pixel[2]]);
        }
        argb
    }
}

/// Maps condition codes to decoded icons, caching what it has loaded.
pub struct IconResolver {
    dir: PathBuf,
    cache: HashMap<String, IconImage>,
}

impl IconResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    /// File a code maps to, or `None` for codes that are not plain
    /// alphanumerics (keeps lookups inside the icon directory).
    pub fn icon_path(&self, code: &str) -> Option<PathBuf> {
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.dir.join(format!("{}.png", code)))
    }

    /// Resolve a condition code to an icon. Never fails.
    pub fn resolve(&mut self, code: &str) -> IconImage {
        if let Some(icon) = self.cache.get(code) {
            return icon.clone();
        }

        let icon = match self.icon_path(code) {
            Some(path) => IconImage::load(&path),
            None => {
                log::warn!("Rejecting icon code {:?}", code);
                IconImage::empty()
            }
        };

        // Simple eviction: clear cache if at capacity
        if self.cache.len() >= MAX_CACHED_ICONS {
            self.cache.clear();
        }
        self.cache.insert(code.to_string(), icon.clone());
        icon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_icon(dir: &Path, code: &str, pixel: [u8; 4]) {
        image::RgbaImage::from_pixel(8, 6, image::Rgba(pixel))
            .save(dir.join(format!("{}.png", code)))
            .unwrap();
    }

    #[test]
    fn test_present_code_resolves_to_image() {
        let dir = tempfile::tempdir().unwrap();
        write_icon(dir.path(), "100", [255, 200, 0, 255]);

        let mut resolver = IconResolver::new(dir.path());
        let icon = resolver.resolve("100");

        assert!(!icon.is_empty());
        assert_eq!((icon.width(), icon.height()), (8, 6));
    }

    #[test]
    fn test_absent_code_resolves_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = IconResolver::new(dir.path());

        let icon = resolver.resolve("999");
        assert!(icon.is_empty());
        assert_eq!(icon, IconImage::empty());
    }

    #[test]
    fn test_corrupt_file_resolves_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("101.png"), b"not a png").unwrap();

        let mut resolver = IconResolver::new(dir.path());
        assert!(resolver.resolve("101").is_empty());
    }

    #[test]
    fn test_path_traversal_is_rejected() {
        let resolver = IconResolver::new("icons-64");
        assert_eq!(resolver.icon_path("../secret"), None);
        assert_eq!(resolver.icon_path(""), None);
        assert_eq!(resolver.icon_path("150"), Some(PathBuf::from("icons-64/150.png")));
    }

    #[test]
    fn test_cached_icon_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        write_icon(dir.path(), "100", [0, 0, 255, 255]);

        let mut resolver = IconResolver::new(dir.path());
        let first = resolver.resolve("100");
        std::fs::remove_file(dir.path().join("100.png")).unwrap();

        assert_eq!(resolver.resolve("100"), first);
    }

    #[test]
    fn test_pixel_conversions() {
        let icon = IconImage {
            rgba: vec![255, 0, 0, 128],
            width: 1,
            height: 1,
        };
        assert_eq!(icon.to_cairo_argb32(), vec![0, 0, 128, 128]);
        assert_eq!(icon.to_network_argb32(), vec![128, 255, 0, 0]);
    }
}
