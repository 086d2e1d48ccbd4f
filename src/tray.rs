// SPDX-License-Identifier: MPL-2.0

//! # Tray Icon
//!
//! Publishes the widget as a StatusNotifierItem through `ksni`, with this
//! context menu:
//!
//! ```text
//! Restore window
//! ──────────────
//! Quit
//! ```
//!
//! Left-click on the icon also restores the window.
//!
//! ## Threading Model
//!
//! ksni serves the item from its own D-Bus thread. Menu clicks and
//! activations become [`TrayCommand`]s handed to a [`CommandSink`], which
//! forwards them to the UI event loop. Tooltip updates go the other way
//! through the ksni handle.

use crate::widget::icons::IconImage;
use ksni::blocking::TrayMethods;
use ksni::menu::{MenuItem, StandardItem};
use ksni::{Icon, ToolTip, Tray};

/// Item id reported to the tray host
const TRAY_ID: &str = "weather-widget";

/// Themed icon used when the bundled tray PNG is missing
const FALLBACK_ICON_NAME: &str = "weather-few-clouds";

/// Actions the tray can request from the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    /// Show the (possibly hidden) widget window
    Restore,
    /// Persist state and exit
    Quit,
}

/// Receiver for tray commands; called on the tray thread.
pub type CommandSink = Box<dyn Fn(TrayCommand) + Send>;

/// Localised strings shown by the tray.
#[derive(Debug, Clone)]
pub struct TrayLabels {
    pub title: String,
    pub restore: String,
    pub quit: String,
}

// ============================================================================
// Tray Implementation
// ============================================================================

struct WeatherTray {
    labels: TrayLabels,
    icon: Vec<Icon>,
    /// Tooltip body, replaced after every refresh
    tooltip: String,
    sink: CommandSink,
}

impl WeatherTray {
    fn new(labels: TrayLabels, icon: &IconImage, sink: CommandSink) -> Self {
        let icon = if icon.is_empty() {
            Vec::new()
        } else {
            vec![Icon {
                width: icon.width() as i32,
                height: icon.height() as i32,
                data: icon.to_network_argb32(),
            }]
        };

        Self {
            labels,
            icon,
            tooltip: String::new(),
            sink,
        }
    }
}

impl Tray for WeatherTray {
    // Left-click restores the window instead of opening the menu
    const MENU_ON_ACTIVATE: bool = false;

    fn id(&self) -> String {
        TRAY_ID.into()
    }

    fn title(&self) -> String {
        self.labels.title.clone()
    }

    fn icon_name(&self) -> String {
        if self.icon.is_empty() {
            FALLBACK_ICON_NAME.into()
        } else {
            String::new()
        }
    }

    fn icon_pixmap(&self) -> Vec<Icon> {
        self.icon.clone()
    }

    fn tool_tip(&self) -> ToolTip {
        ToolTip {
            title: self.labels.title.clone(),
            description: self.tooltip.clone(),
            ..Default::default()
        }
    }

    fn activate(&mut self, _x: i32, _y: i32) {
        (self.sink)(TrayCommand::Restore);
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![
            StandardItem {
                label: self.labels.restore.clone(),
                activate: Box::new(|this: &mut Self| {
                    (this.sink)(TrayCommand::Restore);
                }),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            StandardItem {
                label: self.labels.quit.clone(),
                activate: Box::new(|this: &mut Self| {
                    log::info!("Quit requested from tray");
                    (this.sink)(TrayCommand::Quit);
                }),
                ..Default::default()
            }
            .into(),
        ]
    }
}

// ============================================================================
// Handle
// ============================================================================

/// A running tray icon.
pub struct TrayHandle {
    handle: ksni::blocking::Handle<WeatherTray>,
}

impl TrayHandle {
    /// Start the tray service and register with the StatusNotifierWatcher.
    ///
    /// Fails when there is no session bus or no tray host running.
    pub fn spawn(labels: TrayLabels, icon: &IconImage, sink: CommandSink) -> Result<Self, ksni::Error> {
        if icon.is_empty() {
            log::warn!("Tray icon image missing, using themed icon {}", FALLBACK_ICON_NAME);
        }

        let handle = WeatherTray::new(labels, icon, sink).spawn()?;
        log::info!("Tray icon registered");

        Ok(Self { handle })
    }

    /// Replace the tooltip body.
    pub fn set_tooltip(&self, body: String) {
        if self.handle.update(|tray| tray.tooltip = body).is_none() {
            log::warn!("Tray service is gone, tooltip not updated");
        }
    }

    /// Remove the icon from the tray.
    pub fn hide(self) {
        log::info!("Removing tray icon");
        self.handle.shutdown().wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_tray(icon: &IconImage) -> (WeatherTray, Arc<Mutex<Vec<TrayCommand>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = Arc::clone(&received);
        let sink: CommandSink = Box::new(move |command| sink_received.lock().unwrap().push(command));

        let labels = TrayLabels {
            title: "Realtime weather".to_string(),
            restore: "Restore window".to_string(),
            quit: "Quit".to_string(),
        };
        (WeatherTray::new(labels, icon, sink), received)
    }

    #[test]
    fn test_menu_layout() {
        let (tray, _) = recording_tray(&IconImage::empty());
        let menu = tray.menu();

        assert_eq!(menu.len(), 3);
        match &menu[0] {
            MenuItem::Standard(item) => assert_eq!(item.label, "Restore window"),
            _ => panic!("first entry should restore the window"),
        }
        assert!(matches!(menu[1], MenuItem::Separator));
        match &menu[2] {
            MenuItem::Standard(item) => assert_eq!(item.label, "Quit"),
            _ => panic!("last entry should quit"),
        }
    }

    #[test]
    fn test_menu_and_activation_send_commands() {
        let (mut tray, received) = recording_tray(&IconImage::empty());

        for item in tray.menu() {
            if let MenuItem::Standard(item) = item {
                (item.activate)(&mut tray);
            }
        }
        tray.activate(0, 0);

        assert_eq!(
            *received.lock().unwrap(),
            vec![TrayCommand::Restore, TrayCommand::Quit, TrayCommand::Restore]
        );
    }

    #[test]
    fn test_tooltip_shows_latest_body() {
        let (mut tray, _) = recording_tray(&IconImage::empty());
        tray.tooltip = "Sunny 23℃ · updated 14:05".to_string();

        let tip = tray.tool_tip();
        assert_eq!(tip.title, "Realtime weather");
        assert_eq!(tip.description, "Sunny 23℃ · updated 14:05");
    }

    #[test]
    fn test_missing_icon_falls_back_to_theme() {
        let (tray, _) = recording_tray(&IconImage::empty());
        assert!(tray.icon_pixmap().is_empty());
        assert_eq!(tray.icon_name(), FALLBACK_ICON_NAME);
    }

    #[test]
    fn test_icon_pixmap_is_argb() {
        let icon = IconImage::decode(&png_pixel([255, 0, 0, 255])).unwrap();
        let (tray, _) = recording_tray(&icon);

        let pixmap = tray.icon_pixmap();
        assert_eq!(pixmap.len(), 1);
        assert_eq!((pixmap[0].width, pixmap[0].height), (1, 1));
        assert_eq!(pixmap[0].data, vec![255, 255, 0, 0]);
        assert!(tray.icon_name().is_empty());
    }

    fn png_pixel(rgba: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::RgbaImage::from_pixel(1, 1, image::Rgba(rgba))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }
}
