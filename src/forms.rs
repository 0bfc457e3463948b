//! Tool input forms
//!
//! Each form is a short list of settings shown in the control panel. Text
//! settings are edited in place; choice and toggle settings cycle.

use std::path::Path;

use anyhow::{Context, Result};

use crate::image_loader::read_source_image;
use crate::provider::GeneratedImage;
use crate::text::ellipsize;
use crate::tools::brand::BrandRequest;
use crate::tools::catalog::CatalogRequest;
use crate::tools::logo::{LogoRequest, LogoStyle};
use crate::tools::menu::{MenuArtStyle, MenuItem, MenuRequest, UserCategory};
use crate::tools::photo::{PhotoRequest, PhotoStyle};
use crate::tools::pricing::PricingInput;
use crate::tools::promotion::PromotionRequest;

const VALUE_WIDTH: usize = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    Choice,
    Toggle,
}

/// Control panel view of a tool's inputs.
pub trait ToolForm {
    fn settings_count(&self) -> usize;

    fn setting_name(&self, index: usize) -> &'static str;

    fn setting_kind(&self, index: usize) -> SettingKind;

    /// Full value; the panel shortens it.
    fn setting_value(&self, index: usize) -> String;

    fn text_mut(&mut self, index: usize) -> Option<&mut String>;

    /// Step a choice or flip a toggle. False when `index` is a text field.
    fn cycle(&mut self, index: usize, forward: bool) -> bool;

    /// Value shortened for the control panel.
    fn display_value(&self, index: usize) -> String {
        let value = self.setting_value(index);
        if value.is_empty() && self.setting_kind(index) == SettingKind::Text {
            "[Type here...]".to_string()
        } else {
            ellipsize(&value, VALUE_WIDTH)
        }
    }
}

fn on_off(flag: bool) -> String {
    if flag { "On" } else { "Off" }.to_string()
}

fn step<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let idx = all.iter().position(|s| *s == current).unwrap_or(0);
    let len = all.len();
    if forward {
        all[(idx + 1) % len]
    } else {
        all[(idx + len - 1) % len]
    }
}

/// Parse the dish list typed into the menu form.
///
/// Categories are separated by `;` and start with `Name:`. Dishes inside a
/// category are separated by `/` and written `dish | ingredients | price`;
/// ingredients and price may be left out.
pub fn parse_dishes(text: &str) -> Vec<UserCategory> {
    text.split(';')
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(c, chunk)| {
            let (name, items) = match chunk.split_once(':') {
                Some((name, items)) => (name.trim().to_string(), items),
                None => ("Menu".to_string(), chunk),
            };
            let items = items
                .split('/')
                .filter(|raw| !raw.trim().is_empty())
                .enumerate()
                .map(|(i, raw)| {
                    let mut fields = raw.split('|').map(str::trim);
                    let mut item = MenuItem::new(
                        fields.next().unwrap_or_default(),
                        fields.next().unwrap_or_default(),
                        fields.next().unwrap_or_default(),
                    );
                    item.id = format!("{}-{}", c + 1, i + 1);
                    item
                })
                .collect();
            UserCategory {
                id: (c + 1).to_string(),
                name,
                items,
            }
        })
        .collect()
}

/// Parse a money amount; accepts a decimal comma.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .trim()
        .replace(',', ".");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

#[derive(Debug, Clone)]
pub struct MenuForm {
    pub restaurant_name: String,
    pub art_style: MenuArtStyle,
    pub custom_visuals: String,
    pub dishes: String,
    pub background: bool,
    /// Put the logo from the logo tool on the menu.
    pub use_logo: bool,
}

impl Default for MenuForm {
    fn default() -> Self {
        Self {
            restaurant_name: String::new(),
            art_style: MenuArtStyle::default(),
            custom_visuals: String::new(),
            dishes: String::new(),
            background: true,
            use_logo: true,
        }
    }
}

impl MenuForm {
    pub fn request(&self, logo: Option<GeneratedImage>) -> MenuRequest {
        MenuRequest {
            restaurant_name: self.restaurant_name.trim().to_string(),
            art_style: self.art_style,
            custom_visuals: self.custom_visuals.trim().to_string(),
            categories: parse_dishes(&self.dishes),
            logo: if self.use_logo { logo } else { None },
        }
    }
}

impl ToolForm for MenuForm {
    fn settings_count(&self) -> usize {
        6
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Name",
            1 => "Art Style",
            2 => "Visuals",
            3 => "Dishes",
            4 => "Background",
            5 => "Use Logo",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, index: usize) -> SettingKind {
        match index {
            1 => SettingKind::Choice,
            4 | 5 => SettingKind::Toggle,
            _ => SettingKind::Text,
        }
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.restaurant_name.clone(),
            1 => self.art_style.name().to_string(),
            2 => self.custom_visuals.clone(),
            3 => self.dishes.clone(),
            4 => on_off(self.background),
            5 => on_off(self.use_logo),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.restaurant_name),
            2 => Some(&mut self.custom_visuals),
            3 => Some(&mut self.dishes),
            _ => None,
        }
    }

    fn cycle(&mut self, index: usize, forward: bool) -> bool {
        match index {
            1 => self.art_style = step(&MenuArtStyle::ALL, self.art_style, forward),
            4 => self.background = !self.background,
            5 => self.use_logo = !self.use_logo,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogoForm {
    pub brand_name: String,
    pub niche: String,
    pub style: LogoStyle,
}

impl LogoForm {
    pub fn request(&self) -> LogoRequest {
        LogoRequest {
            brand_name: self.brand_name.trim().to_string(),
            niche: self.niche.trim().to_string(),
            style: self.style,
        }
    }
}

impl ToolForm for LogoForm {
    fn settings_count(&self) -> usize {
        3
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Brand",
            1 => "Niche",
            2 => "Style",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, index: usize) -> SettingKind {
        if index == 2 {
            SettingKind::Choice
        } else {
            SettingKind::Text
        }
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.brand_name.clone(),
            1 => self.niche.clone(),
            2 => self.style.name().to_string(),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.brand_name),
            1 => Some(&mut self.niche),
            _ => None,
        }
    }

    fn cycle(&mut self, index: usize, forward: bool) -> bool {
        if index != 2 {
            return false;
        }
        self.style = step(&LogoStyle::ALL, self.style, forward);
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhotoForm {
    /// Path of the dish photo to enhance.
    pub source_path: String,
    pub style: PhotoStyle,
}

impl PhotoForm {
    /// Read the source image from disk.
    pub fn request(&self) -> Result<PhotoRequest> {
        let raw = self.source_path.trim();
        if raw.is_empty() {
            return Ok(PhotoRequest {
                source: None,
                style: self.style,
            });
        }
        let (bytes, mime) = read_source_image(Path::new(raw))?;
        let source = GeneratedImage::from_bytes(bytes, mime).with_context(|| format!("Unreadable image: {}", raw))?;
        Ok(PhotoRequest {
            source: Some(source),
            style: self.style,
        })
    }
}

impl ToolForm for PhotoForm {
    fn settings_count(&self) -> usize {
        2
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Photo File",
            1 => "Style",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, index: usize) -> SettingKind {
        if index == 1 {
            SettingKind::Choice
        } else {
            SettingKind::Text
        }
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.source_path.clone(),
            1 => self.style.name().to_string(),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        (index == 0).then_some(&mut self.source_path)
    }

    fn cycle(&mut self, index: usize, forward: bool) -> bool {
        if index != 1 {
            return false;
        }
        self.style = step(&PhotoStyle::ALL, self.style, forward);
        true
    }
}

#[derive(Debug, Clone)]
pub struct PricingForm {
    pub product_name: String,
    pub ingredients_cost: String,
    pub operational_cost: String,
    pub margin_percent: String,
}

impl Default for PricingForm {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            ingredients_cost: String::new(),
            operational_cost: String::new(),
            margin_percent: "30".to_string(),
        }
    }
}

impl PricingForm {
    /// Input for the pricing tool; blank or invalid amounts count as zero.
    pub fn input(&self) -> PricingInput {
        PricingInput {
            product_name: self.product_name.trim().to_string(),
            ingredients_cost: parse_amount(&self.ingredients_cost).unwrap_or(0.0),
            operational_cost: parse_amount(&self.operational_cost).unwrap_or(0.0),
            margin_percent: parse_amount(&self.margin_percent).unwrap_or(0.0),
        }
    }
}

impl ToolForm for PricingForm {
    fn settings_count(&self) -> usize {
        4
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Product",
            1 => "Ingredients",
            2 => "Operational",
            3 => "Margin %",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, _index: usize) -> SettingKind {
        SettingKind::Text
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.product_name.clone(),
            1 => self.ingredients_cost.clone(),
            2 => self.operational_cost.clone(),
            3 => self.margin_percent.clone(),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.product_name),
            1 => Some(&mut self.ingredients_cost),
            2 => Some(&mut self.operational_cost),
            3 => Some(&mut self.margin_percent),
            _ => None,
        }
    }

    fn cycle(&mut self, _index: usize, _forward: bool) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct SocialForm {
    pub niche: String,
    /// Post highlighted in the preview for copying.
    pub selected_post: usize,
}

impl ToolForm for SocialForm {
    fn settings_count(&self) -> usize {
        1
    }

    fn setting_name(&self, index: usize) -> &'static str {
        if index == 0 {
            "Niche"
        } else {
            "Unknown"
        }
    }

    fn setting_kind(&self, _index: usize) -> SettingKind {
        SettingKind::Text
    }

    fn setting_value(&self, index: usize) -> String {
        if index == 0 {
            self.niche.clone()
        } else {
            String::new()
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        (index == 0).then_some(&mut self.niche)
    }

    fn cycle(&mut self, _index: usize, _forward: bool) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromotionForm {
    pub request: PromotionRequest,
}

impl ToolForm for PromotionForm {
    fn settings_count(&self) -> usize {
        4
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Product",
            1 => "Occasion",
            2 => "Offer",
            3 => "Rules",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, _index: usize) -> SettingKind {
        SettingKind::Text
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.request.product.clone(),
            1 => self.request.occasion.clone(),
            2 => self.request.offer.clone(),
            3 => self.request.rules.clone(),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.request.product),
            1 => Some(&mut self.request.occasion),
            2 => Some(&mut self.request.offer),
            3 => Some(&mut self.request.rules),
            _ => None,
        }
    }

    fn cycle(&mut self, _index: usize, _forward: bool) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogForm {
    pub request: CatalogRequest,
}

impl ToolForm for CatalogForm {
    fn settings_count(&self) -> usize {
        2
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Product",
            1 => "Current text",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, _index: usize) -> SettingKind {
        SettingKind::Text
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.request.product_name.clone(),
            1 => self.request.current_description.clone(),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.request.product_name),
            1 => Some(&mut self.request.current_description),
            _ => None,
        }
    }

    fn cycle(&mut self, _index: usize, _forward: bool) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrandForm {
    pub request: BrandRequest,
}

impl ToolForm for BrandForm {
    fn settings_count(&self) -> usize {
        4
    }

    fn setting_name(&self, index: usize) -> &'static str {
        match index {
            0 => "Brand",
            1 => "Industry",
            2 => "Description",
            3 => "Tone examples",
            _ => "Unknown",
        }
    }

    fn setting_kind(&self, _index: usize) -> SettingKind {
        SettingKind::Text
    }

    fn setting_value(&self, index: usize) -> String {
        match index {
            0 => self.request.brand_name.clone(),
            1 => self.request.industry.clone(),
            2 => self.request.description.clone(),
            3 => self.request.tone_examples.clone(),
            _ => String::new(),
        }
    }

    fn text_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.request.brand_name),
            1 => Some(&mut self.request.industry),
            2 => Some(&mut self.request.description),
            3 => Some(&mut self.request.tone_examples),
            _ => None,
        }
    }

    fn cycle(&mut self, _index: usize, _forward: bool) -> bool {
        false
    }
}
