//! Local preferences
//!
//! Small TOML file in the data directory: colour theme, which tool intros were
//! dismissed today, and a purchase awaiting its payment return.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::billing::PurchaseItem;
use crate::config::data_dir;
use crate::export::write_atomic;
use crate::tools::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Intro dialogs dismissed on one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroDismissals {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub intros: IntroDismissals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_purchase: Option<PurchaseItem>,
}

impl Preferences {
    pub fn default_path() -> PathBuf {
        data_dir().join("prefs.toml")
    }

    /// Missing file gives defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read preferences: {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse preferences: {:?}", path))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        write_atomic(path, contents.as_bytes()).with_context(|| format!("Failed to write preferences: {:?}", path))
    }

    pub fn intro_dismissed(&self, tool: Tool, today: NaiveDate) -> bool {
        self.intros.date == Some(today) && self.intros.tools.iter().any(|t| t == tool.key())
    }

    /// Hide `tool`'s intro for the rest of `today`. Older dismissals are dropped.
    pub fn dismiss_intro(&mut self, tool: Tool, today: NaiveDate) {
        if self.intros.date != Some(today) {
            self.intros = IntroDismissals {
                date: Some(today),
                tools: Vec::new(),
            };
        }
        if !self.intros.tools.iter().any(|t| t == tool.key()) {
            self.intros.tools.push(tool.key().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::PlanTier;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_dismissal_is_day_scoped() {
        let mut prefs = Preferences::default();
        assert!(!prefs.intro_dismissed(Tool::Menu, day(1)));
        prefs.dismiss_intro(Tool::Menu, day(1));
        prefs.dismiss_intro(Tool::Menu, day(1));
        assert!(prefs.intro_dismissed(Tool::Menu, day(1)));
        assert!(!prefs.intro_dismissed(Tool::Logo, day(1)));
        assert_eq!(prefs.intros.tools.len(), 1);
        assert!(!prefs.intro_dismissed(Tool::Menu, day(2)));

        prefs.dismiss_intro(Tool::Logo, day(2));
        assert_eq!(prefs.intros.tools, vec!["logo".to_string()]);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        let mut prefs = Preferences {
            theme: Theme::Dark,
            pending_purchase: Some(PurchaseItem::Plan(PlanTier::Pro)),
            ..Preferences::default()
        };
        prefs.dismiss_intro(Tool::Photo, day(3));
        prefs.save_to(&path).unwrap();
        assert_eq!(Preferences::load_from(&path).unwrap(), prefs);
    }

    #[test]
    fn test_missing_and_partial_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        assert_eq!(Preferences::load_from(&path).unwrap(), Preferences::default());
        std::fs::write(&path, "theme = \"dark\"\n").unwrap();
        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert!(prefs.pending_purchase.is_none());
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Light.toggle(), Theme::Dark);
        assert_eq!(Theme::Dark.toggle().toggle(), Theme::Dark);
    }
}
