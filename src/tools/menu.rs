//! Menu creator
//!
//! A menu is generated in two steps: a free structural pass that lays out the
//! user's own dishes, then a paid background image. The structural pass falls
//! back to a local layout when the provider fails.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::adjust::{LayoutVariant, OverlayMode, Palette, StyleDefaults};
use crate::color_space::Rgb;
use crate::coordinator::Delivery;
use crate::provider::{AspectRatio, GeneratedImage, GenerationProvider, ImageRequest, ProviderError};

const FALLBACK_THEME: Rgb = Rgb::new(0x33, 0x33, 0x33);

/// Dish as typed by the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, ingredients: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            ingredients: ingredients.into(),
            price: price.into(),
            description: None,
        }
    }

    /// Description shown on the menu; the ingredients when there is none.
    pub fn display_description(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.ingredients)
    }
}

/// Category as typed by the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserCategory {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub title: String,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Serif,
    Script,
    #[default]
    Sans,
}

/// Background art style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MenuArtStyle {
    #[default]
    Minimalist,
    Chalkboard,
    Watercolor,
    DarkLuxury,
    RusticKraft,
    Tropical,
    Japanese,
    Grunge,
    Italian,
    CozyCafe,
}

impl MenuArtStyle {
    pub const ALL: [MenuArtStyle; 10] = [
        MenuArtStyle::Minimalist,
        MenuArtStyle::Chalkboard,
        MenuArtStyle::Watercolor,
        MenuArtStyle::DarkLuxury,
        MenuArtStyle::RusticKraft,
        MenuArtStyle::Tropical,
        MenuArtStyle::Japanese,
        MenuArtStyle::Grunge,
        MenuArtStyle::Italian,
        MenuArtStyle::CozyCafe,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MenuArtStyle::Minimalist => "Minimalist",
            MenuArtStyle::Chalkboard => "Chalkboard",
            MenuArtStyle::Watercolor => "Watercolor",
            MenuArtStyle::DarkLuxury => "Dark Luxury",
            MenuArtStyle::RusticKraft => "Rustic Kraft",
            MenuArtStyle::Tropical => "Tropical",
            MenuArtStyle::Japanese => "Japanese",
            MenuArtStyle::Grunge => "Urban Burger",
            MenuArtStyle::Italian => "Italian",
            MenuArtStyle::CozyCafe => "Cozy Cafe",
        }
    }

    fn texture(&self) -> &'static str {
        match self {
            MenuArtStyle::Minimalist => "clean white marble with faint grey veins and generous empty space",
            MenuArtStyle::Chalkboard => "black chalkboard with white chalk dust and small hand-drawn food sketches along the border",
            MenuArtStyle::Watercolor => "soft white paper with pastel watercolor splashes of herbs and vegetables in the corners",
            MenuArtStyle::DarkLuxury => "matte dark stone with thin gold geometric lines along the edges, moody lighting",
            MenuArtStyle::RusticKraft => "crumpled brown kraft paper with stamped ingredient illustrations in warm tones",
            MenuArtStyle::Tropical => "cream background framed by painted palm leaves and tropical flowers",
            MenuArtStyle::Japanese => "light wood grain with a red sun motif and calm zen brush strokes",
            MenuArtStyle::Grunge => "urban brick wall with faded graffiti textures and a gritty burger joint feel",
            MenuArtStyle::Italian => "red and white checkered cloth edges over warm parchment, trattoria mood",
            MenuArtStyle::CozyCafe => "warm brown tones, coffee stains and soft steam wisps on textured paper",
        }
    }

    /// Styles whose backgrounds are dark enough to need light text.
    pub fn is_dark(&self) -> bool {
        matches!(
            self,
            MenuArtStyle::Chalkboard | MenuArtStyle::DarkLuxury | MenuArtStyle::Grunge
        )
    }

    pub fn defaults(&self) -> StyleDefaults {
        StyleDefaults {
            layout: LayoutVariant::Classic,
            overlay: OverlayMode::Neutral,
            palette: if self.is_dark() {
                Palette::DARK_BACKGROUND
            } else {
                Palette::LIGHT_BACKGROUND
            },
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Generated menu. Replaced wholesale on regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDesign {
    pub restaurant_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub layout_style: LayoutVariant,
    #[serde(default, deserialize_with = "lenient")]
    pub font_style: FontStyle,
    #[serde(default = "fallback_theme", deserialize_with = "lenient_theme")]
    pub theme_color: Rgb,
    #[serde(default)]
    pub categories: Vec<MenuCategory>,
    #[serde(
        default,
        rename = "backgroundImageUrl",
        skip_serializing_if = "Option::is_none",
        with = "data_url"
    )]
    pub background: Option<GeneratedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "data_url")]
    pub logo: Option<GeneratedImage>,
}

fn fallback_theme() -> Rgb {
    FALLBACK_THEME
}

/// Unknown enum strings fall back to the default variant.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

fn lenient_theme<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rgb, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Rgb::from_hex).unwrap_or(FALLBACK_THEME))
}

mod data_url {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::provider::GeneratedImage;

    pub fn serialize<S: Serializer>(image: &Option<GeneratedImage>, serializer: S) -> Result<S::Ok, S::Error> {
        match image {
            Some(image) => serializer.serialize_str(&image.to_data_url()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<GeneratedImage>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.filter(|s| !s.is_empty()) {
            Some(url) => GeneratedImage::from_data_url(&url)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

impl MenuDesign {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Menu creator input
#[derive(Debug, Clone, Default)]
pub struct MenuRequest {
    pub restaurant_name: String,
    pub art_style: MenuArtStyle,
    /// Extra visual elements the background must include.
    pub custom_visuals: String,
    pub categories: Vec<UserCategory>,
    pub logo: Option<GeneratedImage>,
}

impl MenuRequest {
    /// A menu needs a name and at least one dish.
    pub fn is_ready(&self) -> bool {
        !self.restaurant_name.trim().is_empty() && self.categories.iter().any(|c| !c.items.is_empty())
    }
}

pub fn structure_schema() -> Value {
    let item = json!({
        "type": "OBJECT",
        "properties": {
            "id": { "type": "STRING" },
            "name": { "type": "STRING" },
            "ingredients": { "type": "STRING" },
            "price": { "type": "STRING" },
            "description": { "type": "STRING" }
        }
    });
    json!({
        "type": "OBJECT",
        "properties": {
            "restaurantName": { "type": "STRING" },
            "layoutStyle": { "type": "STRING", "enum": ["CLASSIC", "MODERN", "RUSTIC"] },
            "fontStyle": { "type": "STRING", "enum": ["serif", "script", "sans"] },
            "themeColor": { "type": "STRING" },
            "categories": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "items": { "type": "ARRAY", "items": item }
                    }
                }
            }
        },
        "required": ["restaurantName", "layoutStyle", "themeColor", "categories"]
    })
}

pub fn structure_prompt(request: &MenuRequest) -> String {
    let categories = serde_json::to_string(&request.categories).unwrap_or_default();
    format!(
        "You are a professional restaurant menu designer.\n\
         Lay out the menu for a restaurant called \"{name}\".\n\
         Visual preference: {style}.\n\
         Pick a layoutStyle (CLASSIC, MODERN or RUSTIC), a fontStyle and a themeColor that suit it.\n\
         Content rules:\n\
         1. Keep every category name exactly as given.\n\
         2. Keep every dish name exactly as given.\n\
         3. Keep the ingredient list as 'ingredients'.\n\
         4. Never invent descriptions. When a dish has none, copy its ingredients into 'description'.\n\
         5. Organise the content; do not rewrite it.\n\
         Categories: {categories}",
        name = request.restaurant_name,
        style = request.art_style.name(),
        categories = categories,
    )
}

/// Local layout used when the structural call fails.
pub fn fallback_design(request: &MenuRequest) -> MenuDesign {
    MenuDesign {
        restaurant_name: request.restaurant_name.clone(),
        layout_style: LayoutVariant::Modern,
        font_style: FontStyle::Sans,
        theme_color: FALLBACK_THEME,
        categories: request
            .categories
            .iter()
            .map(|c| MenuCategory {
                title: c.name.clone(),
                items: c
                    .items
                    .iter()
                    .map(|i| MenuItem {
                        description: Some(i.ingredients.clone()),
                        ..i.clone()
                    })
                    .collect(),
            })
            .collect(),
        background: None,
        logo: request.logo.clone(),
    }
}

/// Parse structured output into a design.
pub fn parse_design(value: Value, request: &MenuRequest) -> Result<MenuDesign, ProviderError> {
    let mut design: MenuDesign =
        serde_json::from_value(value).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if design.categories.is_empty() {
        return Err(ProviderError::Malformed("menu has no categories".to_string()));
    }
    if design.restaurant_name.trim().is_empty() {
        design.restaurant_name = request.restaurant_name.clone();
    }
    design.background = None;
    design.logo = request.logo.clone();
    Ok(design)
}

pub fn background_prompt(request: &MenuRequest, layout: LayoutVariant) -> String {
    let custom = if request.custom_visuals.trim().is_empty() {
        "none".to_string()
    } else {
        request.custom_visuals.trim().to_string()
    };
    format!(
        "Create a full-page background image for a restaurant menu.\n\
         Restaurant: {name}. Layout: {layout}.\n\
         Theme: {texture}.\n\
         Elements the user asked for: {custom}.\n\
         The image is a texture to place text over; keep the centre calm and readable.\n\
         Do not include any text, letters, watermarks, logos or signatures.",
        name = request.restaurant_name,
        layout = layout.name(),
        texture = request.art_style.texture(),
        custom = custom,
    )
}

/// Run the free structural pass, falling back to the local layout.
pub async fn generate_structure(provider: &dyn GenerationProvider, request: &MenuRequest) -> MenuDesign {
    let result = match provider
        .generate_structured(&structure_prompt(request), &structure_schema())
        .await
    {
        Ok(value) => parse_design(value, request),
        Err(e) => Err(e),
    };
    match result {
        Ok(design) => design,
        Err(e) => {
            tracing::warn!(error = %e, "menu structure failed, using local layout");
            fallback_design(request)
        }
    }
}

/// Full menu generation.
///
/// With `with_background` the background image is requested too; a failed
/// background still delivers the structure, uncharged.
pub async fn generate_menu(
    provider: &dyn GenerationProvider,
    request: &MenuRequest,
    with_background: bool,
) -> Result<Delivery<MenuDesign>, ProviderError> {
    let mut design = generate_structure(provider, request).await;
    if !with_background {
        return Ok(Delivery::Complete(design));
    }

    let prompt = background_prompt(request, design.layout_style);
    match provider
        .generate_image(ImageRequest::new(&prompt).aspect(AspectRatio::Portrait))
        .await
    {
        Ok(background) => {
            design.background = Some(background);
            Ok(Delivery::Complete(design))
        }
        Err(e) => Ok(Delivery::Partial(design, e)),
    }
}

/// Swap in freshly structured text, keeping background and logo.
pub fn apply_text_refresh(current: &mut MenuDesign, fresh: MenuDesign) {
    let background = current.background.take();
    let logo = current.logo.take();
    let layout = current.layout_style;
    *current = MenuDesign {
        background,
        logo,
        layout_style: layout,
        ..fresh
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MenuRequest {
        MenuRequest {
            restaurant_name: "Bella Pizza".into(),
            art_style: MenuArtStyle::Italian,
            custom_visuals: String::new(),
            categories: vec![UserCategory {
                id: "c1".into(),
                name: "Pizzas".into(),
                items: vec![MenuItem::new("Margherita", "tomato, mozzarella, basil", "39.90")],
            }],
            logo: None,
        }
    }

    #[test]
    fn test_fallback_copies_ingredients() {
        let design = fallback_design(&request());
        assert_eq!(design.layout_style, LayoutVariant::Modern);
        assert_eq!(design.theme_color.to_hex(), "#333333");
        assert_eq!(design.categories[0].title, "Pizzas");
        assert_eq!(
            design.categories[0].items[0].description.as_deref(),
            Some("tomato, mozzarella, basil")
        );
    }

    #[test]
    fn test_parse_design_lenient_enums() {
        let value = json!({
            "restaurantName": "Bella Pizza",
            "layoutStyle": "FUTURISTIC",
            "fontStyle": "serif",
            "themeColor": "not-a-color",
            "categories": [{ "title": "Pizzas", "items": [{ "name": "Margherita", "price": "39.90" }] }]
        });
        let design = parse_design(value, &request()).unwrap();
        assert_eq!(design.layout_style, LayoutVariant::Classic);
        assert_eq!(design.font_style, FontStyle::Serif);
        assert_eq!(design.theme_color, FALLBACK_THEME);
    }

    #[test]
    fn test_parse_design_rejects_empty() {
        let value = json!({ "restaurantName": "X", "layoutStyle": "MODERN", "themeColor": "#fff", "categories": [] });
        assert!(matches!(parse_design(value, &request()), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_request_readiness() {
        assert!(request().is_ready());
        let mut empty = request();
        empty.categories[0].items.clear();
        assert!(!empty.is_ready());
    }

    #[test]
    fn test_display_description_falls_back() {
        let item = MenuItem::new("Soup", "carrot", "10");
        assert_eq!(item.display_description(), "carrot");
    }

    #[test]
    fn test_dark_style_defaults() {
        assert_eq!(MenuArtStyle::Chalkboard.defaults().palette, Palette::DARK_BACKGROUND);
        assert_eq!(MenuArtStyle::Watercolor.defaults().overlay, OverlayMode::Neutral);
    }

    #[test]
    fn test_design_json_round_trip_keeps_background() {
        let mut design = fallback_design(&request());
        design.background =
            Some(GeneratedImage::from_image(image::DynamicImage::new_rgba8(2, 2)).unwrap());
        let json = design.to_json().unwrap();
        assert!(json.contains("backgroundImageUrl"));
        let parsed = MenuDesign::from_json(&json).unwrap();
        assert_eq!(parsed.background.map(|b| b.dimensions()), Some((2, 2)));
    }

    #[test]
    fn test_text_refresh_keeps_background_and_layout() {
        let mut current = fallback_design(&request());
        current.layout_style = LayoutVariant::Grid;
        current.background =
            Some(GeneratedImage::from_image(image::DynamicImage::new_rgba8(1, 1)).unwrap());
        let mut fresh = fallback_design(&request());
        fresh.categories[0].title = "Pizze".into();
        apply_text_refresh(&mut current, fresh);
        assert_eq!(current.categories[0].title, "Pizze");
        assert_eq!(current.layout_style, LayoutVariant::Grid);
        assert!(current.background.is_some());
    }

    #[test]
    fn test_background_prompt_mentions_custom_visuals() {
        let mut req = request();
        req.custom_visuals = "a wood-fired oven".into();
        let prompt = background_prompt(&req, LayoutVariant::Rustic);
        assert!(prompt.contains("a wood-fired oven"));
        assert!(prompt.contains("Rustic"));
    }
}
