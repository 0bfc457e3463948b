//! Tool definitions
//!
//! Each tool turns a request into prompts for the generation provider and
//! parses what comes back.

pub mod brand;
pub mod catalog;
pub mod logo;
pub mod menu;
pub mod photo;
pub mod pricing;
pub mod promotion;
pub mod social;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Credits charged by the paid image tools.
pub const IMAGE_COST: u32 = 1;

/// Dashboard tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Menu,
    Logo,
    Photo,
    Pricing,
    Social,
    Promotion,
    Catalog,
    Brand,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::Menu,
        Tool::Logo,
        Tool::Photo,
        Tool::Pricing,
        Tool::Social,
        Tool::Promotion,
        Tool::Catalog,
        Tool::Brand,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Menu => "Menu Creator",
            Tool::Logo => "Logo Creator",
            Tool::Photo => "Photo Studio",
            Tool::Pricing => "Price Wizard",
            Tool::Social => "Social Posts",
            Tool::Promotion => "Promotions",
            Tool::Catalog => "Catalog Writer",
            Tool::Brand => "Brand Identity",
        }
    }

    /// Stable key used for intro dismissals.
    pub fn key(&self) -> &'static str {
        match self {
            Tool::Menu => "menu",
            Tool::Logo => "logo",
            Tool::Photo => "photo",
            Tool::Pricing => "pricing",
            Tool::Social => "social",
            Tool::Promotion => "promotion",
            Tool::Catalog => "catalog",
            Tool::Brand => "brand",
        }
    }

    /// Credits charged for one successful generation.
    pub fn cost(&self) -> u32 {
        match self {
            Tool::Menu | Tool::Logo | Tool::Photo => IMAGE_COST,
            Tool::Pricing | Tool::Social | Tool::Promotion | Tool::Catalog | Tool::Brand => 0,
        }
    }

    /// Tools whose result is an adjustable picture rather than text.
    pub fn is_image(&self) -> bool {
        matches!(self, Tool::Menu | Tool::Logo | Tool::Photo)
    }

    pub fn intro(&self) -> &'static str {
        match self {
            Tool::Menu => "Type your dishes, pick an art style and get a printable menu with AI background art.",
            Tool::Logo => "Describe your business and get a logo ready for packaging and social media.",
            Tool::Photo => "Load a plain photo of a dish and turn it into an advertising shot.",
            Tool::Pricing => "Enter your costs and margin to get an ideal price plus combo ideas.",
            Tool::Social => "Get a seven day posting calendar for your niche.",
            Tool::Promotion => "Write a short promotion message for WhatsApp or Instagram.",
            Tool::Catalog => "Turn a plain product description into catalog copy that sells.",
            Tool::Brand => "Describe your brand and get slogans, mission, values and ready phrases.",
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_tools() {
        assert_eq!(Tool::Logo.cost(), 1);
        assert_eq!(Tool::Social.cost(), 0);
        assert_eq!(Tool::Brand.cost(), 0);
        assert!(Tool::ALL.iter().filter(|t| t.cost() > 0).all(|t| t.is_image()));
    }

    #[test]
    fn test_tool_cycle() {
        assert_eq!(Tool::Promotion.next(), Tool::Catalog);
        assert_eq!(Tool::Brand.next(), Tool::Menu);
        assert_eq!(Tool::Menu.prev(), Tool::Brand);
    }
}
