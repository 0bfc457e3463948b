//! Half-block terminal preview
//!
//! Each cell shows two vertical pixels with `▀`: the top pixel as foreground
//! and the bottom pixel as background.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::color_space::{blend_over, rgb_to_luminance, Rgb};
use crate::terminal_capabilities::ColorSupport;

/// Color shown behind transparent pixels.
pub const BACKDROP: Rgb = Rgb::new(24, 24, 27);

const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Pixel grid that fits `(cols, rows * 2)` keeping the aspect ratio.
pub fn fit_dimensions(width: u32, height: u32, cols: u16, rows: u16) -> (u32, u32) {
    let max_w = cols.max(1) as f32;
    let max_h = (rows.max(1) as f32) * 2.0;
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let k = (max_w / w).min(max_h / h);
    (((w * k).round() as u32).max(1), ((h * k).round() as u32).max(1))
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Rgb {
    if y >= img.height() {
        return BACKDROP;
    }
    let p = blend_over(BACKDROP.with_alpha(255), *img.get_pixel(x, y));
    Rgb::new(p[0], p[1], p[2])
}

/// Render a bitmap into styled lines for a `cols` x `rows` area.
pub fn to_lines(image: &RgbaImage, cols: u16, rows: u16, support: ColorSupport) -> Vec<Line<'static>> {
    let (w, h) = fit_dimensions(image.width(), image.height(), cols, rows);
    let resized = imageops::resize(image, w, h, FilterType::Triangle);

    let mut lines = Vec::with_capacity(h.div_ceil(2) as usize);
    for y in (0..h).step_by(2) {
        let mut spans = Vec::with_capacity(w as usize);
        for x in 0..w {
            let top = pixel_at(&resized, x, y);
            let bottom = pixel_at(&resized, x, y + 1);
            let span = match support {
                ColorSupport::NoColor => {
                    let lum = (rgb_to_luminance(top.r, top.g, top.b) + rgb_to_luminance(bottom.r, bottom.g, bottom.b)) / 2.0;
                    let idx = (lum * (SHADES.len() - 1) as f32).round() as usize;
                    Span::raw(SHADES[idx.min(SHADES.len() - 1)].to_string())
                }
                _ => Span::styled(
                    "▀",
                    Style::default()
                        .fg(top.to_terminal(support))
                        .bg(bottom.to_terminal(support)),
                ),
            };
            spans.push(span);
        }
        lines.push(Line::from(spans));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use ratatui::style::Color;

    #[test]
    fn test_fit_keeps_aspect() {
        // a tall page in a wide pane is height bound
        assert_eq!(fit_dimensions(595, 842, 80, 20), (28, 40));
        assert_eq!(fit_dimensions(100, 100, 10, 50), (10, 10));
    }

    #[test]
    fn test_two_pixels_per_cell() {
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        img.put_pixel(1, 1, Rgba([0, 0, 255, 255]));
        let lines = to_lines(&img, 2, 1, ColorSupport::TrueColor);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[0].content, "▀");
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Rgb(255, 0, 0)));
        assert_eq!(lines[0].spans[0].style.bg, Some(Color::Rgb(0, 0, 255)));
    }

    #[test]
    fn test_transparent_shows_backdrop() {
        let img = RgbaImage::new(2, 2);
        let lines = to_lines(&img, 2, 1, ColorSupport::TrueColor);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Rgb(24, 24, 27)));
    }

    #[test]
    fn test_no_color_uses_shades() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let lines = to_lines(&img, 2, 1, ColorSupport::NoColor);
        assert_eq!(lines[0].spans[0].content, "█");
    }
}
