//! Colors
//!
//! Hex parsing for palette values, blending for the rasterizer, and
//! quantization for terminals that lack TrueColor.

use image::Rgba;
use ratatui::style::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::terminal_capabilities::ColorSupport;

/// RGB color type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            6 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let expand = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Some(Self::new(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn with_alpha(&self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }

    /// Map to a ratatui color for the given terminal color support.
    pub fn to_terminal(&self, support: ColorSupport) -> Color {
        match support {
            ColorSupport::TrueColor => Color::Rgb(self.r, self.g, self.b),
            ColorSupport::Color256 => Color::Indexed(quantize_to_ansi256(*self)),
            ColorSupport::Color16 | ColorSupport::NoColor => {
                if rgb_to_luminance(self.r, self.g, self.b) > 0.5 {
                    Color::White
                } else {
                    Color::Black
                }
            }
        }
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rgb::from_hex(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}'", raw)))
    }
}

/// Convert RGB to perceptual luminance (0.0 to 1.0)
///
/// Uses ITU-R BT.709 coefficients.
pub fn rgb_to_luminance(r: u8, g: u8, b: u8) -> f32 {
    0.2126 * (r as f32 / 255.0) + 0.7152 * (g as f32 / 255.0) + 0.0722 * (b as f32 / 255.0)
}

/// Quantize RGB to the ANSI 256-color palette
pub fn quantize_to_ansi256(rgb: Rgb) -> u8 {
    let avg = ((rgb.r as u16 + rgb.g as u16 + rgb.b as u16) / 3) as u8;
    let spread = [rgb.r, rgb.g, rgb.b]
        .iter()
        .map(|&c| (c as i16 - avg as i16).abs())
        .max()
        .unwrap_or(0);

    if spread < 10 {
        // grayscale ramp 232-255
        return 232 + (avg as f32 / 255.0 * 23.0).round() as u8;
    }

    let level = |c: u8| (c as f32 / 255.0 * 5.0).round() as u8;
    16 + 36 * level(rgb.r) + 6 * level(rgb.g) + level(rgb.b)
}

/// Source-over blend of `src` onto `dst`, both straight alpha.
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mix = |s: u8, d: u8| {
        let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}

/// Interpolate between two colors
pub fn interpolate_color(start: Rgb, end: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| ((1.0 - t) * a as f32 + t * b as f32).round() as u8;
    Rgb::new(lerp(start.r, end.r), lerp(start.g, end.g), lerp(start.b, end.b))
}
