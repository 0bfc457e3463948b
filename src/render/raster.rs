//! Scene rasterizer
//!
//! Paints a [`Scene`] into an RGBA bitmap at a supersampling factor. Nodes
//! sharing a transform chain are painted into one layer which is then warped
//! onto the canvas in a single pass.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, FontVec, GlyphId, PxScale, ScaleFont};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use thiserror::Error;

use crate::color_space::{blend_over, Rgb};
use crate::scene::{Align, Fit, Node, Paint, Rect, Scene, Transform};

/// Largest canvas we agree to allocate, in pixels.
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

const LINE_HEIGHT: f32 = 1.25;

/// Common locations for a usable sans font when none is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to read font {path:?}: {source}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file {0:?}")]
    InvalidFont(PathBuf),
    #[error("supersampling factor must be positive, got {0}")]
    InvalidFactor(f32),
    #[error("canvas {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },
    #[error("no font loaded to draw text; set export.font_path in the config")]
    NoFont,
}

/// Scene painter. Text is skipped when no font is loaded.
#[derive(Clone, Default)]
pub struct Rasterizer {
    font: Option<FontArc>,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer").field("has_font", &self.font.is_some()).finish()
    }
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    pub fn from_font_path(path: &Path) -> Result<Self, RasterError> {
        let data = std::fs::read(path).map_err(|source| RasterError::FontRead {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(data).map_err(|_| RasterError::InvalidFont(path.to_path_buf()))?;
        Ok(Self::with_font(FontArc::new(font)))
    }

    /// Use the configured font, else the first system candidate that loads.
    pub fn discover(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::from_font_path(path) {
                Ok(r) => return r,
                Err(e) => tracing::warn!(error = %e, "configured font unusable"),
            }
        }
        for candidate in FONT_CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                if let Ok(r) = Self::from_font_path(path) {
                    tracing::debug!(font = %candidate, "using system font");
                    return r;
                }
            }
        }
        tracing::warn!("no font available, text will not be rasterized");
        Self::new()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Paint `scene` at `factor` pixels per logical unit.
    pub fn render(&self, scene: &Scene, factor: f32) -> Result<RgbaImage, RasterError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(RasterError::InvalidFactor(factor));
        }
        let width = ((scene.width * factor).round() as u32).max(1);
        let height = ((scene.height * factor).round() as u32).max(1);
        if width as u64 * height as u64 > MAX_PIXELS {
            return Err(RasterError::TooLarge { width, height });
        }

        let mut canvas = RgbaImage::new(width, height);
        let nodes = &scene.nodes;
        let mut i = 0;
        while i < nodes.len() {
            let chain = &nodes[i].transforms;
            let mut layer = RgbaImage::new(width, height);
            while i < nodes.len() && nodes[i].transforms == *chain {
                self.paint(&mut layer, &nodes[i], factor);
                i += 1;
            }
            composite(&mut canvas, &layer, chain, factor);
        }
        Ok(canvas)
    }

    fn paint(&self, layer: &mut RgbaImage, node: &Node, factor: f32) {
        if node.opacity <= 0.0 {
            return;
        }
        let rect = scale_rect(node.rect, factor);
        match &node.paint {
            Paint::Fill(color) => fill_rect(layer, rect, *color, node.opacity),
            Paint::Outline { color, thickness } => {
                let t = (thickness * factor).max(1.0);
                fill_rect(layer, Rect::new(rect.x, rect.y, rect.w, t), *color, node.opacity);
                fill_rect(layer, Rect::new(rect.x, rect.y + rect.h - t, rect.w, t), *color, node.opacity);
                fill_rect(layer, Rect::new(rect.x, rect.y, t, rect.h), *color, node.opacity);
                fill_rect(layer, Rect::new(rect.x + rect.w - t, rect.y, t, rect.h), *color, node.opacity);
            }
            Paint::Checker { a, b, cell } => checker(layer, rect, *a, *b, (cell * factor).max(1.0), node.opacity),
            Paint::Image { image, fit } => {
                let source = image.to_rgba8();
                draw_image(layer, &source, rect, *fit, node.opacity);
            }
            Paint::Text {
                text,
                size,
                color,
                align,
            } => {
                if let Some(font) = &self.font {
                    draw_text_block(layer, font, text, rect, size * factor, *color, *align, node.opacity);
                }
            }
        }
    }
}

fn scale_rect(rect: Rect, factor: f32) -> Rect {
    Rect::new(rect.x * factor, rect.y * factor, rect.w * factor, rect.h * factor)
}

fn with_opacity(color: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let a = (color[3] as f32 * opacity).round().clamp(0.0, 255.0) as u8;
    Rgba([color[0], color[1], color[2], a])
}

fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 || color[3] == 0 {
        return;
    }
    let px = img.get_pixel_mut(x as u32, y as u32);
    *px = blend_over(*px, color);
}

/// Pixel span covered by `[start, start + len)`, clipped to `0..max`.
fn span(start: f32, len: f32, max: u32) -> (u32, u32) {
    let a = start.round().max(0.0) as u32;
    let b = (start + len).round().max(0.0) as u32;
    (a.min(max), b.min(max))
}

fn fill_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>, opacity: f32) {
    let color = with_opacity(color, opacity);
    if color[3] == 0 {
        return;
    }
    let (x0, x1) = span(rect.x, rect.w, img.width());
    let (y0, y1) = span(rect.y, rect.h, img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let px = img.get_pixel_mut(x, y);
            *px = blend_over(*px, color);
        }
    }
}

fn checker(img: &mut RgbaImage, rect: Rect, a: Rgb, b: Rgb, cell: f32, opacity: f32) {
    let (x0, x1) = span(rect.x, rect.w, img.width());
    let (y0, y1) = span(rect.y, rect.h, img.height());
    let alpha = (opacity * 255.0).round() as u8;
    for y in y0..y1 {
        for x in x0..x1 {
            let cx = ((x as f32 - rect.x) / cell) as i64;
            let cy = ((y as f32 - rect.y) / cell) as i64;
            let c = if (cx + cy) % 2 == 0 { a } else { b };
            let px = img.get_pixel_mut(x, y);
            *px = blend_over(*px, c.with_alpha(alpha));
        }
    }
}

fn draw_image(layer: &mut RgbaImage, source: &RgbaImage, rect: Rect, fit: Fit, opacity: f32) {
    let tw = rect.w.round().max(1.0) as u32;
    let th = rect.h.round().max(1.0) as u32;
    let (sw, sh) = (source.width().max(1) as f32, source.height().max(1) as f32);

    let (resized, dx, dy) = match fit {
        Fit::Stretch => (imageops::resize(source, tw, th, FilterType::Triangle), 0i64, 0i64),
        Fit::Contain => {
            let k = (tw as f32 / sw).min(th as f32 / sh);
            let (w, h) = (((sw * k).round() as u32).max(1), ((sh * k).round() as u32).max(1));
            let img = imageops::resize(source, w, h, FilterType::Triangle);
            (img, (tw as i64 - w as i64) / 2, (th as i64 - h as i64) / 2)
        }
        Fit::Cover => {
            let k = (tw as f32 / sw).max(th as f32 / sh);
            let (w, h) = (((sw * k).round() as u32).max(tw), ((sh * k).round() as u32).max(th));
            let img = imageops::resize(source, w, h, FilterType::Triangle);
            let (cx, cy) = ((w - tw) / 2, (h - th) / 2);
            (imageops::crop_imm(&img, cx, cy, tw, th).to_image(), 0, 0)
        }
    };

    let ox = rect.x.round() as i64 + dx;
    let oy = rect.y.round() as i64 + dy;
    for (x, y, px) in resized.enumerate_pixels() {
        blend_pixel(layer, ox + x as i64, oy + y as i64, with_opacity(*px, opacity));
    }
}

fn line_width(font: &FontArc, px: f32, text: &str) -> f32 {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut width = 0.0;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            width += scaled.kern(p, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Greedy wrap by measured width.
fn wrap_measured(font: &FontArc, px: f32, text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if current.is_empty() || line_width(font, px, &candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw_line(layer: &mut RgbaImage, font: &FontArc, px: f32, color: Rgba<u8>, x: f32, baseline: f32, text: &str) {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut caret = x;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            caret += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(px, point(caret, baseline));
        caret += scaled.h_advance(id);
        prev = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let a = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
                blend_pixel(
                    layer,
                    bounds.min.x as i64 + gx as i64,
                    bounds.min.y as i64 + gy as i64,
                    Rgba([color[0], color[1], color[2], a]),
                );
            });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text_block(
    layer: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    rect: Rect,
    px: f32,
    color: Rgb,
    align: Align,
    opacity: f32,
) {
    if px < 1.0 {
        return;
    }
    let color = with_opacity(color.with_alpha(255), opacity);
    let ascent = font.as_scaled(PxScale::from(px)).ascent();
    let mut y = rect.y;
    for line in wrap_measured(font, px, text, rect.w) {
        let w = line_width(font, px, &line);
        let x = match align {
            Align::Left => rect.x,
            Align::Center => rect.x + (rect.w - w) / 2.0,
            Align::Right => rect.x + rect.w - w,
        };
        draw_line(layer, font, px, color, x, y + ascent, &line);
        y += px * LINE_HEIGHT;
    }
}

/// Projection for a transform chain in canvas pixels.
pub fn chain_projection(chain: &[Transform], factor: f32) -> Projection {
    let mut total = Projection::scale(1.0, 1.0);
    for t in chain {
        let (px, py) = (t.pivot.0 * factor, t.pivot.1 * factor);
        let step = Projection::translate(px + t.dx * factor, py + t.dy * factor)
            * Projection::rotate(t.rotation.to_radians())
            * Projection::scale(t.scale, t.scale)
            * Projection::translate(-px, -py);
        total = step * total;
    }
    total
}

fn composite(canvas: &mut RgbaImage, layer: &RgbaImage, chain: &[Transform], factor: f32) {
    let warped;
    let source = if chain.is_empty() {
        layer
    } else {
        warped = warp(
            layer,
            &chain_projection(chain, factor),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );
        &warped
    };
    for (dst, src) in canvas.pixels_mut().zip(source.pixels()) {
        if src[3] != 0 {
            *dst = blend_over(*dst, *src);
        }
    }
}

/// Flatten onto an opaque background.
pub fn flatten(image: &RgbaImage, background: Rgb) -> RgbaImage {
    let base = background.with_alpha(255);
    let mut out = RgbaImage::from_pixel(image.width(), image.height(), base);
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        *dst = blend_over(*dst, *src);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Role, Scene};

    fn filled(width: f32, height: f32, color: Rgba<u8>) -> Scene {
        let mut scene = Scene::new(width, height);
        scene.nodes.push(Node {
            role: Role::Background,
            rect: Rect::new(0.0, 0.0, width, height),
            paint: Paint::Fill(color),
            opacity: 1.0,
            transforms: Vec::new(),
        });
        scene
    }

    #[test]
    fn test_supersampled_size() {
        let scene = filled(10.0, 20.0, Rgba([255, 0, 0, 255]));
        let img = Rasterizer::new().render(&scene, 3.0).unwrap();
        assert_eq!(img.dimensions(), (30, 60));
        assert_eq!(*img.get_pixel(15, 30), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_invalid_factor() {
        let scene = filled(10.0, 10.0, Rgba([0, 0, 0, 255]));
        assert!(matches!(
            Rasterizer::new().render(&scene, 0.0),
            Err(RasterError::InvalidFactor(_))
        ));
    }

    #[test]
    fn test_too_large() {
        let scene = filled(100_000.0, 100_000.0, Rgba([0, 0, 0, 255]));
        assert!(matches!(
            Rasterizer::new().render(&scene, 1.0),
            Err(RasterError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_zero_opacity_paints_nothing() {
        let mut scene = filled(4.0, 4.0, Rgba([0, 0, 255, 255]));
        scene.nodes[0].opacity = 0.0;
        let img = Rasterizer::new().render(&scene, 1.0).unwrap();
        assert!(img.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_translation_moves_content() {
        let mut scene = Scene::new(20.0, 20.0);
        scene.nodes.push(Node {
            role: Role::Content,
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            paint: Paint::Fill(Rgba([0, 255, 0, 255])),
            opacity: 1.0,
            transforms: vec![Transform {
                pivot: (10.0, 10.0),
                scale: 1.0,
                rotation: 0.0,
                dx: 10.0,
                dy: 10.0,
            }],
        });
        let img = Rasterizer::new().render(&scene, 1.0).unwrap();
        assert_eq!(img.get_pixel(1, 1)[3], 0);
        assert_eq!(img.get_pixel(12, 12)[1], 255);
    }

    #[test]
    fn test_flatten_is_opaque() {
        let img = RgbaImage::new(3, 3);
        let flat = flatten(&img, Rgb::WHITE);
        assert!(flat.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_missing_font_file() {
        let err = Rasterizer::from_font_path(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, RasterError::FontRead { .. }));
    }
}
