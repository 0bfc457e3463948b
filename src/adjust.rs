//! Adjustable result state
//!
//! Holds one generated artifact together with presentation-only adjustments
//! (scale, rotation, offsets, palette, layout). Adjustments are never applied
//! to the artifact itself; they are composed when the scene is built.

use serde::{Deserialize, Serialize};

use crate::color_space::Rgb;

/// Menu layout variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayoutVariant {
    #[default]
    Classic,
    Elegant,
    Modern,
    Rustic,
    Magazine,
    Grid,
    Minimal,
}

impl LayoutVariant {
    pub const ALL: [LayoutVariant; 7] = [
        LayoutVariant::Classic,
        LayoutVariant::Elegant,
        LayoutVariant::Modern,
        LayoutVariant::Rustic,
        LayoutVariant::Magazine,
        LayoutVariant::Grid,
        LayoutVariant::Minimal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayoutVariant::Classic => "Classic",
            LayoutVariant::Elegant => "Elegant",
            LayoutVariant::Modern => "Modern",
            LayoutVariant::Rustic => "Rustic",
            LayoutVariant::Magazine => "Magazine",
            LayoutVariant::Grid => "Grid",
            LayoutVariant::Minimal => "Clean",
        }
    }

    /// Number of item columns the layout uses.
    pub fn columns(&self) -> u32 {
        match self {
            LayoutVariant::Classic | LayoutVariant::Grid | LayoutVariant::Magazine => 2,
            _ => 1,
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|l| l == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|l| l == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Panel drawn between the background art and the menu text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    /// No panel; text sits straight on the background.
    #[default]
    Neutral,
    Light,
    Dark,
}

impl OverlayMode {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayMode::Neutral => "Neutral",
            OverlayMode::Light => "Light",
            OverlayMode::Dark => "Dark",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            OverlayMode::Neutral => OverlayMode::Light,
            OverlayMode::Light => OverlayMode::Dark,
            OverlayMode::Dark => OverlayMode::Neutral,
        }
    }
}

/// Text colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub title: Rgb,
    pub body: Rgb,
    pub price: Rgb,
}

impl Palette {
    pub const LIGHT_BACKGROUND: Palette = Palette {
        title: Rgb::new(0x1a, 0x1a, 0x1a),
        body: Rgb::new(0x4b, 0x55, 0x63),
        price: Rgb::new(0xea, 0x58, 0x0c),
    };

    pub const DARK_BACKGROUND: Palette = Palette {
        title: Rgb::new(0xff, 0xff, 0xff),
        body: Rgb::new(0xd1, 0xd5, 0xdb),
        price: Rgb::new(0xfb, 0xbf, 0x24),
    };

    pub fn for_overlay(mode: OverlayMode) -> Self {
        match mode {
            OverlayMode::Dark => Self::DARK_BACKGROUND,
            OverlayMode::Neutral | OverlayMode::Light => Self::LIGHT_BACKGROUND,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::LIGHT_BACKGROUND
    }
}

/// Inclusive numeric range a field is clamped to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Per-tool bounds for the numeric adjustments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentLimits {
    pub scale: Range,
    pub rotation: Range,
    pub offset: Range,
    pub section_scale: Range,
    pub section_offset: Range,
    pub logo_scale: Range,
}

impl AdjustmentLimits {
    /// Free transform used by the logo and photo tools.
    pub const FREE_TRANSFORM: AdjustmentLimits = AdjustmentLimits {
        scale: Range::new(0.1, 2.0),
        rotation: Range::new(-180.0, 180.0),
        offset: Range::new(-200.0, 200.0),
        section_scale: Range::new(0.5, 1.5),
        section_offset: Range::new(-200.0, 200.0),
        logo_scale: Range::new(0.5, 1.5),
    };

    /// Menu pages only tilt slightly.
    pub const MENU: AdjustmentLimits = AdjustmentLimits {
        scale: Range::new(0.1, 2.0),
        rotation: Range::new(-5.0, 5.0),
        offset: Range::new(-200.0, 200.0),
        section_scale: Range::new(0.5, 1.5),
        section_offset: Range::new(-200.0, 200.0),
        logo_scale: Range::new(0.5, 1.5),
    };
}

/// Scale plus vertical offset for one menu section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionTransform {
    pub scale: f32,
    pub offset_y: f32,
}

impl Default for SectionTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_y: 0.0,
        }
    }
}

/// Defaults a style contributes when an artifact is (re)set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StyleDefaults {
    pub layout: LayoutVariant,
    pub overlay: OverlayMode,
    pub palette: Palette,
}

/// The full set of user-tunable parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentState {
    pub scale: f32,
    pub rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub title: SectionTransform,
    pub content: SectionTransform,
    pub logo_scale: f32,
    pub layout: LayoutVariant,
    pub overlay: OverlayMode,
    pub palette: Palette,
}

impl AdjustmentState {
    pub fn defaults_for(style: StyleDefaults) -> Self {
        Self {
            scale: 1.0,
            rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            title: SectionTransform::default(),
            content: SectionTransform::default(),
            logo_scale: 1.0,
            layout: style.layout,
            overlay: style.overlay,
            palette: style.palette,
        }
    }

    /// True when no numeric transform is active.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.rotation == 0.0 && self.offset_x == 0.0 && self.offset_y == 0.0
    }
}

impl Default for AdjustmentState {
    fn default() -> Self {
        Self::defaults_for(StyleDefaults::default())
    }
}

/// One field update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    Scale(f32),
    Rotation(f32),
    OffsetX(f32),
    OffsetY(f32),
    TitleScale(f32),
    TitleOffsetY(f32),
    ContentScale(f32),
    ContentOffsetY(f32),
    LogoScale(f32),
    Layout(LayoutVariant),
    Overlay(OverlayMode),
    TitleColor(Rgb),
    BodyColor(Rgb),
    PriceColor(Rgb),
}

/// Artifact plus its adjustments.
///
/// The artifact is replaced wholesale, never patched; replacing it resets the
/// adjustments.
#[derive(Debug, Clone)]
pub struct AdjustableResult<A> {
    artifact: Option<A>,
    adjustments: AdjustmentState,
    defaults: StyleDefaults,
    limits: AdjustmentLimits,
}

impl<A> AdjustableResult<A> {
    pub fn new(limits: AdjustmentLimits) -> Self {
        Self {
            artifact: None,
            adjustments: AdjustmentState::default(),
            defaults: StyleDefaults::default(),
            limits,
        }
    }

    pub fn artifact(&self) -> Option<&A> {
        self.artifact.as_ref()
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn adjustments(&self) -> &AdjustmentState {
        &self.adjustments
    }

    pub fn limits(&self) -> &AdjustmentLimits {
        &self.limits
    }

    /// Change the style-derived defaults used by the next reset.
    pub fn set_style_defaults(&mut self, defaults: StyleDefaults) {
        self.defaults = defaults;
    }

    /// Replace the artifact and reset every adjustment.
    pub fn set_artifact(&mut self, artifact: A) {
        self.artifact = Some(artifact);
        self.reset();
    }

    /// Drop the artifact, e.g. before a fresh generation.
    pub fn clear(&mut self) {
        self.artifact = None;
        self.reset();
    }

    /// Swap the artifact through `f` without touching adjustments.
    ///
    /// Used when a follow-up call (the menu background) completes the same
    /// logical result.
    pub fn update_artifact(&mut self, f: impl FnOnce(&mut A)) {
        if let Some(artifact) = self.artifact.as_mut() {
            f(artifact);
        }
    }

    /// Restore defaults, keeping the artifact.
    pub fn reset(&mut self) {
        self.adjustments = AdjustmentState::defaults_for(self.defaults);
    }

    /// Apply one adjustment, clamping numeric values into range.
    pub fn set_adjustment(&mut self, adjustment: Adjustment) {
        let limits = self.limits;
        let adj = &mut self.adjustments;
        let clamp = |range: Range, value: f32, current: f32| {
            if value.is_nan() {
                current
            } else {
                range.clamp(value)
            }
        };

        match adjustment {
            Adjustment::Scale(v) => adj.scale = clamp(limits.scale, v, adj.scale),
            Adjustment::Rotation(v) => adj.rotation = clamp(limits.rotation, v, adj.rotation),
            Adjustment::OffsetX(v) => adj.offset_x = clamp(limits.offset, v, adj.offset_x),
            Adjustment::OffsetY(v) => adj.offset_y = clamp(limits.offset, v, adj.offset_y),
            Adjustment::TitleScale(v) => adj.title.scale = clamp(limits.section_scale, v, adj.title.scale),
            Adjustment::TitleOffsetY(v) => {
                adj.title.offset_y = clamp(limits.section_offset, v, adj.title.offset_y)
            }
            Adjustment::ContentScale(v) => {
                adj.content.scale = clamp(limits.section_scale, v, adj.content.scale)
            }
            Adjustment::ContentOffsetY(v) => {
                adj.content.offset_y = clamp(limits.section_offset, v, adj.content.offset_y)
            }
            Adjustment::LogoScale(v) => adj.logo_scale = clamp(limits.logo_scale, v, adj.logo_scale),
            Adjustment::Layout(layout) => adj.layout = layout,
            Adjustment::Overlay(mode) => {
                adj.overlay = mode;
                adj.palette = Palette::for_overlay(mode);
            }
            Adjustment::TitleColor(c) => adj.palette.title = c,
            Adjustment::BodyColor(c) => adj.palette.body = c,
            Adjustment::PriceColor(c) => adj.palette.price = c,
        }
    }
}
