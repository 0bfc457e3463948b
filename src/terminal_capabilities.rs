//! Terminal capability detection
//!
//! Only color depth and size matter for the preview pane.

use crossterm::terminal;
use std::env;

/// Level of color support in the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSupport {
    NoColor,
    Color16,
    Color256,
    #[default]
    TrueColor,
}

impl ColorSupport {
    pub fn name(&self) -> &'static str {
        match self {
            ColorSupport::NoColor => "None",
            ColorSupport::Color16 => "16 Colors",
            ColorSupport::Color256 => "256 Colors",
            ColorSupport::TrueColor => "True Color",
        }
    }
}

/// Terminal capabilities
#[derive(Debug, Clone, Copy)]
pub struct TerminalCapabilities {
    pub color_support: ColorSupport,
    pub size: (u16, u16),
}

impl Default for TerminalCapabilities {
    fn default() -> Self {
        Self {
            color_support: ColorSupport::TrueColor,
            size: (80, 24),
        }
    }
}

/// Detect terminal capabilities from the environment
pub fn detect_capabilities() -> TerminalCapabilities {
    TerminalCapabilities {
        color_support: color_support_from_env(
            env::var_os("NO_COLOR").is_some(),
            env::var("COLORTERM").ok().as_deref(),
            env::var("TERM").ok().as_deref(),
        ),
        size: terminal::size().unwrap_or((80, 24)),
    }
}

/// Decide color depth from the conventional environment variables.
pub fn color_support_from_env(no_color: bool, colorterm: Option<&str>, term: Option<&str>) -> ColorSupport {
    if no_color {
        return ColorSupport::NoColor;
    }

    if let Some(ct) = colorterm.map(str::to_lowercase) {
        if ct.contains("truecolor") || ct.contains("24bit") {
            return ColorSupport::TrueColor;
        }
    }

    match term.map(str::to_lowercase) {
        Some(t) if t.contains("256") || t.contains("screen") || t.contains("tmux") => ColorSupport::Color256,
        Some(t) if t.contains("kitty") || t.contains("alacritty") => ColorSupport::TrueColor,
        Some(t) if t.contains("xterm") || t.contains("linux") => ColorSupport::Color16,
        _ => ColorSupport::Color256,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_color_wins() {
        assert_eq!(
            color_support_from_env(true, Some("truecolor"), Some("xterm-256color")),
            ColorSupport::NoColor
        );
    }

    #[test]
    fn test_colorterm_truecolor() {
        assert_eq!(color_support_from_env(false, Some("24bit"), None), ColorSupport::TrueColor);
    }

    #[test]
    fn test_term_fallbacks() {
        assert_eq!(color_support_from_env(false, None, Some("xterm-256color")), ColorSupport::Color256);
        assert_eq!(color_support_from_env(false, None, Some("xterm")), ColorSupport::Color16);
        assert_eq!(color_support_from_env(false, None, None), ColorSupport::Color256);
    }
}
