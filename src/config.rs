//! Configuration management
//!
//! Load and save settings to a TOML config file. Secrets never live in the
//! file; each section names the environment variable that holds them.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub supabase: SupabaseConfig,
    pub payment: PaymentConfig,
    pub export: ExportConfig,
    pub auth: AuthConfig,
    pub ui: UiPreferences,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents =
                std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {:?}", path))?;
            let config: Config =
                toml::from_str(&contents).with_context(|| format!("Failed to parse config: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).with_context(|| format!("Failed to write config: {:?}", path))?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = project_dirs() {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            // Fallback to current directory
            Ok(PathBuf::from("foodcraft.toml"))
        }
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "foodcraft", "foodcraft")
}

/// Directory for preferences, logs and the session file.
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Read a secret from the environment. Empty values count as missing.
pub fn secret_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Generative backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub text_model: String,
    pub image_model: String,
    pub fallback_image_model: String,
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            fallback_image_model: "gemini-2.5-flash-image".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

/// Auth and profile backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key_env: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key_env: "SUPABASE_ANON_KEY".to_string(),
        }
    }
}

impl SupabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Payment redirect settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Base URL the checkout returns to.
    pub return_base_url: String,
    pub simulated_delay_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            return_base_url: "http://localhost".to_string(),
            simulated_delay_ms: 1500,
        }
    }
}

/// Export output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    /// TrueType/OpenType font used for menu text. When unset a system font is
    /// searched for; menu export fails if none loads.
    pub font_path: Option<PathBuf>,
    pub menu_scale: u32,
    pub logo_scale: u32,
    pub photo_scale: u32,
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            font_path: None,
            menu_scale: 2,
            logo_scale: 3,
            photo_scale: 1,
            jpeg_quality: 92,
        }
    }
}

/// Session bootstrap settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub bootstrap_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bootstrap_timeout_ms: 3000,
        }
    }
}

/// UI preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    /// Columns used by the preview pane; 0 means fit the pane.
    pub preview_width: u16,
    pub show_help_on_start: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            preview_width: 0,
            show_help_on_start: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.menu_scale, 2);
        assert_eq!(config.export.logo_scale, 3);
        assert_eq!(config.auth.bootstrap_timeout_ms, 3000);
        assert!(!config.supabase.is_configured());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.text_model, config.provider.text_model);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[payment]\nsimulated_delay_ms = 10\n").unwrap();
        assert_eq!(parsed.payment.simulated_delay_ms, 10);
        assert_eq!(parsed.payment.return_base_url, "http://localhost");
        assert_eq!(parsed.export.jpeg_quality, 92);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.supabase.url = "https://example.supabase.co".into();
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.supabase.is_configured());
    }
}
