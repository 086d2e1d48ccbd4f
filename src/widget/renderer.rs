// SPDX-License-Identifier: MPL-2.0

//! Rendering module for the widget
//! Paints the icon + text row onto a transparent ARGB32 canvas

use super::icons::IconImage;
use super::layout::{calculate_layout, ContentLayout};

/// Parameters for rendering the widget
pub struct RenderParams<'a> {
    pub width: i32,
    pub height: i32,
    pub text: &'a str,
    pub icon: &'a IconImage,
    /// Draw the subdued "last refresh failed" dot
    pub stale: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cairo error: {0}")]
    Cairo(#[from] cairo::Error),
    #[error("cairo surface busy: {0}")]
    Borrow(#[from] cairo::BorrowError),
}

/// Main rendering function for the widget.
///
/// `canvas` is the shm buffer in `Argb8888`, which matches Cairo's ARGB32
/// byte layout on little-endian hosts.
pub fn render_widget(canvas: &mut [u8], params: RenderParams) -> Result<(), RenderError> {
    let mut surface =
        cairo::ImageSurface::create(cairo::Format::ARgb32, params.width, params.height)?;

    {
        let cr = cairo::Context::new(&surface)?;

        // Clear background to fully transparent
        cr.save()?;
        cr.set_operator(cairo::Operator::Source);
        cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
        cr.paint()?;
        cr.restore()?;

        let layout = calculate_layout(params.width as u32, params.height as u32);

        draw_icon(&cr, &layout, params.icon)?;
        draw_text(&cr, &layout, params.text)?;

        if params.stale {
            draw_stale_indicator(&cr, &layout)?;
        }
    }

    surface.flush();
    let data = surface.data()?;
    let len = canvas.len().min(data.len());
    canvas[..len].copy_from_slice(&data[..len]);

    Ok(())
}

/// Scale the condition icon into its slot. Empty icons leave the slot blank.
fn draw_icon(cr: &cairo::Context, layout: &ContentLayout, icon: &IconImage) -> Result<(), RenderError> {
    if icon.is_empty() || layout.icon_size <= 0.0 {
        return Ok(());
    }

    let width = icon.width() as i32;
    let height = icon.height() as i32;
    let icon_surface = cairo::ImageSurface::create_for_data(
        icon.to_cairo_argb32(),
        cairo::Format::ARgb32,
        width,
        height,
        width * 4,
    )?;

    cr.save()?;
    cr.translate(layout.icon_x, layout.icon_y);
    cr.scale(layout.icon_size / width as f64, layout.icon_size / height as f64);
    cr.set_source_surface(&icon_surface, 0.0, 0.0)?;
    cr.paint()?;
    cr.restore()?;

    Ok(())
}

/// Two-line condition text, white with a black outline for any background.
fn draw_text(cr: &cairo::Context, layout: &ContentLayout, text: &str) -> Result<(), RenderError> {
    let pango_layout = pangocairo::functions::create_layout(cr);
    let font_desc = pango::FontDescription::from_string("Ubuntu Bold 14");
    pango_layout.set_font_description(Some(&font_desc));
    pango_layout.set_text(text);

    let (_, text_height) = pango_layout.pixel_size();
    cr.move_to(layout.text_x, layout.text_center_y - text_height as f64 / 2.0);

    pangocairo::functions::layout_path(cr, &pango_layout);
    cr.set_source_rgb(0.0, 0.0, 0.0);
    cr.set_line_width(3.0);
    cr.stroke_preserve()?;
    cr.set_source_rgb(1.0, 1.0, 1.0);
    cr.fill()?;

    Ok(())
}

fn draw_stale_indicator(cr: &cairo::Context, layout: &ContentLayout) -> Result<(), RenderError> {
    let (x, y) = layout.indicator;
    cr.arc(x, y, 3.0, 0.0, 2.0 * std::f64::consts::PI);
    cr.set_source_rgba(0.6, 0.6, 0.6, 0.8);
    cr.fill()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(canvas: &[u8], width: i32, x: i32, y: i32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [canvas[offset], canvas[offset + 1], canvas[offset + 2], canvas[offset + 3]]
    }

    fn red_icon() -> IconImage {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("100.png");
        image::RgbaImage::from_pixel(16, 16, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();
        IconImage::load(&path)
    }

    #[test]
    fn test_background_stays_transparent() {
        let (width, height) = (200, 80);
        let mut canvas = vec![0xAA; (width * height * 4) as usize];

        render_widget(&mut canvas, RenderParams {
            width,
            height,
            text: "Sunny\n23℃",
            icon: &IconImage::empty(),
            stale: false,
        })
        .unwrap();

        assert_eq!(pixel(&canvas, width, 0, 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&canvas, width, width - 1, height - 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_icon_is_painted_in_its_slot() {
        let (width, height) = (200, 80);
        let mut canvas = vec![0; (width * height * 4) as usize];
        let icon = red_icon();

        render_widget(&mut canvas, RenderParams {
            width,
            height,
            text: "",
            icon: &icon,
            stale: false,
        })
        .unwrap();

        let layout = calculate_layout(width as u32, height as u32);
        let cx = (layout.icon_x + layout.icon_size / 2.0) as i32;
        let cy = (layout.icon_y + layout.icon_size / 2.0) as i32;
        // BGRA, opaque red
        assert_eq!(pixel(&canvas, width, cx, cy), [0, 0, 255, 255]);
    }

    #[test]
    fn test_stale_indicator_is_drawn() {
        let (width, height) = (200, 80);
        let mut canvas = vec![0; (width * height * 4) as usize];

        render_widget(&mut canvas, RenderParams {
            width,
            height,
            text: "",
            icon: &IconImage::empty(),
            stale: true,
        })
        .unwrap();

        let layout = calculate_layout(width as u32, height as u32);
        let (x, y) = layout.indicator;
        assert_ne!(pixel(&canvas, width, x as i32, y as i32)[3], 0);
    }
}
