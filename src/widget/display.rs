// SPDX-License-Identifier: MPL-2.0

//! What the widget currently shows: the live snapshot, its icon, and whether
//! the most recent refresh failed.

use super::icons::{IconImage, IconResolver};
use super::refresh::FetchResult;
use super::weather::WeatherSnapshot;
use chrono::{DateTime, Local};

/// Text shown before the first successful refresh.
pub const PLACEHOLDER_TEXT: &str = "--";

/// Comparable summary of everything visible on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleState {
    pub text: String,
    pub icon_code: Option<String>,
    pub stale: bool,
}

#[derive(Debug, Default)]
pub struct DisplayModel {
    /// The single live snapshot
    snapshot: Option<WeatherSnapshot>,
    icon: IconImage,
    /// Set when the latest refresh failed; the old snapshot stays visible
    stale: bool,
    updated_at: Option<DateTime<Local>>,
}

impl DisplayModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a finished refresh.
    ///
    /// Success replaces the snapshot and icon. Failure keeps the last good
    /// snapshot and marks the display stale.
    pub fn apply(&mut self, result: FetchResult, icons: &mut IconResolver) {
        match result {
            Ok(snapshot) => {
                log::info!(
                    "Weather updated: {} {}℃, icon {}",
                    snapshot.condition_text,
                    snapshot.temperature,
                    snapshot.icon_code
                );
                self.icon = icons.resolve(&snapshot.icon_code);
                self.snapshot = Some(snapshot);
                self.stale = false;
                self.updated_at = Some(Local::now());
            }
            Err(e) => {
                log::error!("Weather refresh failed: {}", e);
                self.stale = true;
            }
        }
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn text(&self) -> String {
        self.snapshot
            .as_ref()
            .map(WeatherSnapshot::display_text)
            .unwrap_or_else(|| PLACEHOLDER_TEXT.to_string())
    }

    pub fn icon(&self) -> &IconImage {
        &self.icon
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }

    pub fn visible(&self) -> VisibleState {
        VisibleState {
            text: self.text(),
            icon_code: self.snapshot.as_ref().map(|s| s.icon_code.clone()),
            stale: self.stale,
        }
    }
}
