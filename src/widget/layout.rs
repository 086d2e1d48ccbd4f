//! Widget layout calculations
//!
//! Icon on the left, text to its right, both vertically centred; the rest of
//! the row is empty stretch.

/// Padding around the content row
pub const PADDING: f64 = 6.0;

/// Gap between icon and text
pub const SPACING: f64 = 8.0;

/// Icons are drawn at most at their native 64px
pub const MAX_ICON_SIZE: f64 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentLayout {
    pub icon_x: f64,
    pub icon_y: f64,
    pub icon_size: f64,
    pub text_x: f64,
    /// Vertical centre line for the text block
    pub text_center_y: f64,
    /// Where the stale-data dot goes (centre)
    pub indicator: (f64, f64),
}

/// Lay out the icon + text row for a surface of the given size.
pub fn calculate_layout(width: u32, height: u32) -> ContentLayout {
    let width = width as f64;
    let height = height as f64;

    let icon_size = (height - 2.0 * PADDING).clamp(0.0, MAX_ICON_SIZE);
    let icon_x = PADDING;
    let icon_y = (height - icon_size) / 2.0;

    ContentLayout {
        icon_x,
        icon_y,
        icon_size,
        text_x: icon_x + icon_size + SPACING,
        text_center_y: height / 2.0,
        indicator: ((width - PADDING - 3.0).max(0.0), PADDING + 3.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_size_layout() {
        let layout = calculate_layout(200, 80);
        assert_eq!(layout.icon_size, 64.0);
        assert_eq!(layout.icon_x, PADDING);
        assert_eq!(layout.icon_y, 8.0);
        assert_eq!(layout.text_x, PADDING + 64.0 + SPACING);
        assert_eq!(layout.text_center_y, 40.0);
    }

    #[test]
    fn test_short_window_shrinks_icon() {
        let layout = calculate_layout(200, 40);
        assert_eq!(layout.icon_size, 40.0 - 2.0 * PADDING);
        assert!(layout.icon_y >= 0.0);
        assert!(layout.text_x > layout.icon_x + layout.icon_size);
    }

    #[test]
    fn test_tiny_window_never_negative() {
        let layout = calculate_layout(1, 1);
        assert_eq!(layout.icon_size, 0.0);
        assert!(layout.indicator.0 >= 0.0);
    }
}
