//! Offscreen scene graph
//!
//! An artifact plus its adjustments is turned into a flat list of painted
//! nodes in logical page units. The terminal preview and the export both
//! rasterize this graph, so what is exported is what was previewed.

use std::sync::Arc;

use image::{DynamicImage, Rgba};

use crate::adjust::{AdjustmentState, LayoutVariant, OverlayMode};
use crate::color_space::Rgb;
use crate::provider::GeneratedImage;
use crate::text::wrap_words;
use crate::tools::menu::MenuDesign;

/// A4 portrait in PDF points.
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

pub const LOGO_CANVAS: f32 = 512.0;
const PHOTO_MAX_SIDE: f32 = 768.0;

const MARGIN: f32 = 40.0;
const COLUMN_GAP: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn inset(&self, by: f32) -> Self {
        Self::new(self.x + by, self.y + by, (self.w - 2.0 * by).max(0.0), (self.h - 2.0 * by).max(0.0))
    }
}

/// Scale and rotate about `pivot`, then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pivot: (f32, f32),
    pub scale: f32,
    /// Degrees, clockwise on screen.
    pub rotation: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.rotation == 0.0 && self.dx == 0.0 && self.dy == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Background,
    Overlay,
    Content,
    /// Editor decoration: outlines, transparency checkerboard.
    Chrome,
    /// Loading and fade effects.
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Stretch,
    /// Fill the rect, cropping the overflow.
    Cover,
    /// Fit inside the rect, keeping aspect.
    Contain,
}

#[derive(Clone)]
pub enum Paint {
    Fill(Rgba<u8>),
    Outline { color: Rgba<u8>, thickness: f32 },
    Checker { a: Rgb, b: Rgb, cell: f32 },
    Image { image: Arc<DynamicImage>, fit: Fit },
    Text { text: String, size: f32, color: Rgb, align: Align },
}

impl std::fmt::Debug for Paint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Paint::Fill(c) => write!(f, "Fill({:?})", c),
            Paint::Outline { color, thickness } => write!(f, "Outline({:?}, {})", color, thickness),
            Paint::Checker { cell, .. } => write!(f, "Checker({})", cell),
            Paint::Image { image, fit } => write!(f, "Image({}x{}, {:?})", image.width(), image.height(), fit),
            Paint::Text { text, size, .. } => write!(f, "Text({:?}, {})", text, size),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub role: Role,
    pub rect: Rect,
    pub paint: Paint,
    pub opacity: f32,
    /// Applied innermost first.
    pub transforms: Vec<Transform>,
}

impl Node {
    fn new(role: Role, rect: Rect, paint: Paint) -> Self {
        Self {
            role,
            rect,
            paint,
            opacity: 1.0,
            transforms: Vec::new(),
        }
    }

    fn with_transforms(mut self, transforms: &[Transform]) -> Self {
        self.transforms = transforms.iter().copied().filter(|t| !t.is_identity()).collect();
        self
    }

    fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }
}

/// Preview-only state that never reaches an export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneOptions {
    pub busy: bool,
    /// Background fade-in progress, 0 to 1.
    pub background_fade: f32,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            busy: false,
            background_fade: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub overlay_mode: OverlayMode,
    pub nodes: Vec<Node>,
}

impl Scene {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            overlay_mode: OverlayMode::Neutral,
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn count(&self, role: Role) -> usize {
        self.nodes.iter().filter(|n| n.role == role).count()
    }

    /// Any visible text that needs a font to paint.
    pub fn has_text(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n.opacity > 0.0 && matches!(&n.paint, Paint::Text { text, .. } if !text.trim().is_empty()))
    }

    /// Copy of the scene as it should be exported.
    ///
    /// Transient and chrome nodes are dropped, the background is fully
    /// opaque, and a neutral overlay becomes transparent.
    pub fn normalize_for_export(&self) -> Scene {
        let mut out = self.clone();
        out.nodes.retain(|n| !matches!(n.role, Role::Transient | Role::Chrome));
        for node in &mut out.nodes {
            match node.role {
                Role::Background => node.opacity = 1.0,
                Role::Overlay if out.overlay_mode == OverlayMode::Neutral => {
                    node.paint = Paint::Fill(Rgba([0, 0, 0, 0]));
                    node.opacity = 0.0;
                }
                _ => {}
            }
        }
        out
    }
}

fn transient_nodes(scene: &mut Scene, options: SceneOptions) {
    if options.busy {
        let band = Rect::new(0.0, scene.height * 0.45, scene.width, scene.height * 0.1);
        scene.push(Node::new(Role::Transient, band, Paint::Fill(Rgba([255, 255, 255, 90]))));
    }
}

fn overlay_fill(mode: OverlayMode) -> Rgba<u8> {
    match mode {
        OverlayMode::Neutral => Rgba([255, 255, 255, 28]),
        OverlayMode::Light => Rgba([255, 255, 255, 215]),
        OverlayMode::Dark => Rgba([0, 0, 0, 175]),
    }
}

/// Rough line count for a wrapped block, used for vertical layout.
fn estimate_lines(text: &str, width: f32, size: f32) -> usize {
    let chars_per_line = (width / (size * 0.52)).floor().max(1.0) as usize;
    wrap_words(text, chars_per_line).len().max(1)
}

fn text_node(text: &str, rect: Rect, size: f32, color: Rgb, align: Align) -> Node {
    Node::new(
        Role::Content,
        rect,
        Paint::Text {
            text: text.to_string(),
            size,
            color,
            align,
        },
    )
}

struct MenuStyle {
    title_size: f32,
    title_align: Align,
    category_size: f32,
    item_align: Align,
    dividers: bool,
    panels: bool,
}

fn menu_style(layout: LayoutVariant) -> MenuStyle {
    let base = MenuStyle {
        title_size: 36.0,
        title_align: Align::Center,
        category_size: 18.0,
        item_align: Align::Left,
        dividers: true,
        panels: false,
    };
    match layout {
        LayoutVariant::Classic => base,
        LayoutVariant::Elegant => MenuStyle {
            item_align: Align::Center,
            ..base
        },
        LayoutVariant::Modern => MenuStyle {
            title_align: Align::Left,
            dividers: false,
            ..base
        },
        LayoutVariant::Rustic => MenuStyle {
            category_size: 20.0,
            ..base
        },
        LayoutVariant::Magazine => MenuStyle {
            title_size: 44.0,
            title_align: Align::Left,
            ..base
        },
        LayoutVariant::Grid => MenuStyle {
            panels: true,
            dividers: false,
            ..base
        },
        LayoutVariant::Minimal => MenuStyle {
            title_size: 28.0,
            category_size: 15.0,
            dividers: false,
            ..base
        },
    }
}

/// Lay out a menu page.
pub fn build_menu_scene(design: &MenuDesign, adj: &AdjustmentState, options: SceneOptions) -> Scene {
    let mut scene = Scene::new(PAGE_WIDTH, PAGE_HEIGHT);
    scene.overlay_mode = adj.overlay;
    let page = Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT);
    let style = menu_style(adj.layout);
    let palette = adj.palette;

    // background
    scene.push(Node::new(Role::Background, page, Paint::Fill(Rgb::WHITE.with_alpha(255))));
    if let Some(bg) = &design.background {
        scene.push(
            Node::new(
                Role::Background,
                page,
                Paint::Image {
                    image: Arc::clone(&bg.image),
                    fit: Fit::Cover,
                },
            )
            .with_opacity(options.background_fade),
        );
    }

    let page_rotation = Transform {
        pivot: page.center(),
        scale: 1.0,
        rotation: adj.rotation,
        dx: 0.0,
        dy: 0.0,
    };

    let panel = page.inset(24.0);
    scene.push(Node::new(Role::Overlay, panel, Paint::Fill(overlay_fill(adj.overlay))).with_transforms(&[page_rotation]));
    if adj.overlay == OverlayMode::Neutral {
        scene.push(
            Node::new(
                Role::Chrome,
                panel,
                Paint::Outline {
                    color: Rgba([120, 120, 120, 160]),
                    thickness: 1.0,
                },
            )
            .with_transforms(&[page_rotation]),
        );
    }

    // title block
    let inner_w = PAGE_WIDTH - 2.0 * MARGIN;
    let mut title_nodes = Vec::new();
    let mut y = MARGIN + 8.0;
    if let Some(logo) = &design.logo {
        let size = 72.0 * adj.logo_scale;
        let rect = Rect::new((PAGE_WIDTH - size) / 2.0, y, size, size);
        title_nodes.push(Node::new(
            Role::Content,
            rect,
            Paint::Image {
                image: Arc::clone(&logo.image),
                fit: Fit::Contain,
            },
        ));
        y += size + 12.0;
    }
    let title_lines = estimate_lines(&design.restaurant_name, inner_w, style.title_size);
    let title_h = title_lines as f32 * style.title_size * 1.25;
    title_nodes.push(text_node(
        &design.restaurant_name,
        Rect::new(MARGIN, y, inner_w, title_h),
        style.title_size,
        palette.title,
        style.title_align,
    ));
    y += title_h + 8.0;
    if style.dividers {
        let w = 120.0;
        let x = match style.title_align {
            Align::Left => MARGIN,
            _ => (PAGE_WIDTH - w) / 2.0,
        };
        title_nodes.push(Node::new(
            Role::Content,
            Rect::new(x, y, w, 2.0),
            Paint::Fill(design.theme_color.with_alpha(255)),
        ));
        y += 10.0;
    }
    let title_rect = Rect::new(MARGIN, MARGIN, inner_w, y - MARGIN);
    let title_transform = Transform {
        pivot: title_rect.center(),
        scale: adj.title.scale,
        rotation: 0.0,
        dx: 0.0,
        dy: adj.title.offset_y,
    };
    for node in title_nodes {
        scene.push(node.with_transforms(&[title_transform, page_rotation]));
    }

    // content columns
    let content_top = y + 16.0;
    let columns = adj.layout.columns().max(1) as usize;
    let col_w = (inner_w - COLUMN_GAP * (columns as f32 - 1.0)) / columns as f32;
    let mut col_y = vec![content_top; columns];
    let mut content_nodes = Vec::new();
    let item_size = 13.0;
    let desc_size = 10.0;

    for category in &design.categories {
        let col = col_y
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let x = MARGIN + col as f32 * (col_w + COLUMN_GAP);
        let start_y = col_y[col];
        let mut cy = start_y;
        let mut block = Vec::new();

        let cat_h = style.category_size * 1.3;
        block.push(text_node(
            &category.title,
            Rect::new(x, cy, col_w, cat_h),
            style.category_size,
            palette.title,
            style.item_align,
        ));
        cy += cat_h;
        if style.dividers {
            block.push(Node::new(
                Role::Content,
                Rect::new(x, cy, col_w, 1.0),
                Paint::Fill(design.theme_color.with_alpha(200)),
            ));
        }
        cy += 8.0;

        for item in &category.items {
            let row_h = item_size * 1.35;
            match style.item_align {
                Align::Center => {
                    block.push(text_node(&item.name, Rect::new(x, cy, col_w, row_h), item_size, palette.title, Align::Center));
                    cy += row_h;
                    if !item.price.is_empty() {
                        block.push(text_node(&item.price, Rect::new(x, cy, col_w, row_h), item_size, palette.price, Align::Center));
                        cy += row_h;
                    }
                }
                _ => {
                    let price_w = (col_w * 0.3).min(90.0);
                    block.push(text_node(
                        &item.name,
                        Rect::new(x, cy, col_w - price_w, row_h),
                        item_size,
                        palette.title,
                        Align::Left,
                    ));
                    block.push(text_node(
                        &item.price,
                        Rect::new(x + col_w - price_w, cy, price_w, row_h),
                        item_size,
                        palette.price,
                        Align::Right,
                    ));
                    cy += row_h;
                }
            }
            let description = item.display_description();
            if !description.trim().is_empty() {
                let lines = estimate_lines(description, col_w, desc_size);
                let h = lines as f32 * desc_size * 1.3;
                block.push(text_node(description, Rect::new(x, cy, col_w, h), desc_size, palette.body, style.item_align));
                cy += h;
            }
            cy += 6.0;
        }

        if style.panels {
            let rect = Rect::new(x - 8.0, start_y - 8.0, col_w + 16.0, cy - start_y + 8.0);
            content_nodes.push(Node::new(Role::Content, rect, Paint::Fill(design.theme_color.with_alpha(28))));
        }
        content_nodes.extend(block);
        col_y[col] = cy + 14.0;
    }

    let content_bottom = col_y.iter().copied().fold(content_top, f32::max);
    let content_rect = Rect::new(MARGIN, content_top, inner_w, content_bottom - content_top);
    let content_transform = Transform {
        pivot: content_rect.center(),
        scale: adj.content.scale,
        rotation: 0.0,
        dx: 0.0,
        dy: adj.content.offset_y,
    };
    for node in content_nodes {
        scene.push(node.with_transforms(&[content_transform, page_rotation]));
    }

    transient_nodes(&mut scene, options);
    scene
}

fn fitted(image: &GeneratedImage, max_side: f32) -> (f32, f32) {
    let (w, h) = image.dimensions();
    let (w, h) = (w.max(1) as f32, h.max(1) as f32);
    let k = max_side / w.max(h);
    (w * k, h * k)
}

fn free_transform(adj: &AdjustmentState, pivot: (f32, f32)) -> Transform {
    Transform {
        pivot,
        scale: adj.scale,
        rotation: adj.rotation,
        dx: adj.offset_x,
        dy: adj.offset_y,
    }
}

/// Logo on a transparent square canvas.
pub fn build_logo_scene(logo: &GeneratedImage, adj: &AdjustmentState, options: SceneOptions) -> Scene {
    let mut scene = Scene::new(LOGO_CANVAS, LOGO_CANVAS);
    let canvas = Rect::new(0.0, 0.0, LOGO_CANVAS, LOGO_CANVAS);
    scene.push(Node::new(
        Role::Chrome,
        canvas,
        Paint::Checker {
            a: Rgb::new(0xe5, 0xe7, 0xeb),
            b: Rgb::WHITE,
            cell: 16.0,
        },
    ));
    let (w, h) = fitted(logo, LOGO_CANVAS);
    let rect = Rect::new((LOGO_CANVAS - w) / 2.0, (LOGO_CANVAS - h) / 2.0, w, h);
    scene.push(
        Node::new(
            Role::Content,
            rect,
            Paint::Image {
                image: Arc::clone(&logo.image),
                fit: Fit::Stretch,
            },
        )
        .with_transforms(&[free_transform(adj, canvas.center())]),
    );
    transient_nodes(&mut scene, options);
    scene
}

/// Photo on a white canvas sized to the photo.
pub fn build_photo_scene(photo: &GeneratedImage, adj: &AdjustmentState, options: SceneOptions) -> Scene {
    let (w, h) = fitted(photo, PHOTO_MAX_SIDE);
    let mut scene = Scene::new(w, h);
    let canvas = Rect::new(0.0, 0.0, w, h);
    scene.push(Node::new(Role::Background, canvas, Paint::Fill(Rgb::WHITE.with_alpha(255))));
    scene.push(
        Node::new(
            Role::Content,
            canvas,
            Paint::Image {
                image: Arc::clone(&photo.image),
                fit: Fit::Stretch,
            },
        )
        .with_transforms(&[free_transform(adj, canvas.center())]),
    );
    transient_nodes(&mut scene, options);
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::{AdjustmentState, SectionTransform};
    use crate::tools::menu::{fallback_design, MenuItem, MenuRequest, UserCategory};

    fn design() -> MenuDesign {
        fallback_design(&MenuRequest {
            restaurant_name: "Bella Pizza".into(),
            categories: vec![
                UserCategory {
                    id: "1".into(),
                    name: "Pizzas".into(),
                    items: vec![
                        MenuItem::new("Margherita", "tomato, mozzarella", "39.90"),
                        MenuItem::new("Calabresa", "sausage, onion", "42.00"),
                    ],
                },
                UserCategory {
                    id: "2".into(),
                    name: "Drinks".into(),
                    items: vec![MenuItem::new("Soda", "", "6.00")],
                },
            ],
            ..MenuRequest::default()
        })
    }

    #[test]
    fn test_menu_scene_has_all_items() {
        let scene = build_menu_scene(&design(), &AdjustmentState::default(), SceneOptions::default());
        let texts: Vec<String> = scene
            .nodes
            .iter()
            .filter_map(|n| match &n.paint {
                Paint::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        for expected in ["Bella Pizza", "Pizzas", "Margherita", "39.90", "Drinks", "Soda"] {
            assert!(texts.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_normalize_drops_preview_only_nodes() {
        let options = SceneOptions {
            busy: true,
            background_fade: 0.3,
        };
        let scene = build_menu_scene(&design(), &AdjustmentState::default(), options);
        assert_eq!(scene.count(Role::Transient), 1);
        assert_eq!(scene.count(Role::Chrome), 1);

        let export = scene.normalize_for_export();
        assert_eq!(export.count(Role::Transient), 0);
        assert_eq!(export.count(Role::Chrome), 0);
        let overlay = export.nodes.iter().find(|n| n.role == Role::Overlay).unwrap();
        assert_eq!(overlay.opacity, 0.0);
        assert!(export
            .nodes
            .iter()
            .filter(|n| n.role == Role::Background)
            .all(|n| n.opacity == 1.0));
    }

    #[test]
    fn test_dark_overlay_survives_export() {
        let adj = AdjustmentState {
            overlay: OverlayMode::Dark,
            ..AdjustmentState::default()
        };
        let export = build_menu_scene(&design(), &adj, SceneOptions::default()).normalize_for_export();
        let overlay = export.nodes.iter().find(|n| n.role == Role::Overlay).unwrap();
        assert_eq!(overlay.opacity, 1.0);
    }

    #[test]
    fn test_section_transform_applied_to_content() {
        let adj = AdjustmentState {
            content: SectionTransform {
                scale: 1.2,
                offset_y: 30.0,
            },
            ..AdjustmentState::default()
        };
        let scene = build_menu_scene(&design(), &adj, SceneOptions::default());
        let soda = scene
            .nodes
            .iter()
            .find(|n| matches!(&n.paint, Paint::Text { text, .. } if text == "Soda"))
            .unwrap();
        assert_eq!(soda.transforms.len(), 1);
        assert_eq!(soda.transforms[0].dy, 30.0);
    }

    #[test]
    fn test_two_column_layout_splits_categories() {
        let adj = AdjustmentState {
            layout: LayoutVariant::Classic,
            ..AdjustmentState::default()
        };
        let scene = build_menu_scene(&design(), &adj, SceneOptions::default());
        let x_of = |name: &str| {
            scene
                .nodes
                .iter()
                .find(|n| matches!(&n.paint, Paint::Text { text, .. } if text == name))
                .map(|n| n.rect.x)
                .unwrap()
        };
        assert!(x_of("Drinks") > x_of("Pizzas"));
    }

    #[test]
    fn test_logo_scene_is_transparent_after_export() {
        let logo = GeneratedImage::from_image(DynamicImage::new_rgba8(64, 32)).unwrap();
        let scene = build_logo_scene(&logo, &AdjustmentState::default(), SceneOptions::default());
        let export = scene.normalize_for_export();
        assert_eq!(export.count(Role::Background), 0);
        let content = &export.nodes[0];
        assert_eq!(content.rect.w, 512.0);
        assert_eq!(content.rect.h, 256.0);
        assert!(!export.has_text());
    }

    #[test]
    fn test_menu_scene_needs_a_font() {
        let export = build_menu_scene(&design(), &AdjustmentState::default(), SceneOptions::default())
            .normalize_for_export();
        assert!(export.has_text());
    }
}
