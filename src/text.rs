//! Text utilities
//!
//! Display-width aware truncation and wrapping for the TUI, plus filename
//! sanitising for exports.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Calculate the display width of a string
///
/// Takes into account East Asian Wide/Fullwidth characters.
pub fn display_width(s: &str) -> usize {
    s.width()
}

/// Truncate a string to fit within a maximum display width
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    let mut result = String::new();
    let mut current_width = 0;

    for grapheme in s.graphemes(true) {
        let grapheme_width = grapheme.width();
        if current_width + grapheme_width > max_width {
            break;
        }
        result.push_str(grapheme);
        current_width += grapheme_width;
    }

    result
}

/// Truncate with a trailing ellipsis when the string does not fit.
pub fn ellipsize(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    format!("{}…", truncate_to_width(s, max_width - 1))
}

/// Greedy word wrap by display width. Words wider than the line are split.
pub fn wrap_words(s: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in s.split_whitespace() {
        let mut word = word.to_string();
        loop {
            let word_width = display_width(&word);
            let needed = if current.is_empty() { word_width } else { word_width + 1 };
            if current_width + needed <= max_width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&word);
                current_width += needed;
                break;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
                continue;
            }
            // word alone is too wide
            let head = truncate_to_width(&word, max_width);
            let head = if head.is_empty() {
                word.graphemes(true).next().unwrap_or_default().to_string()
            } else {
                head
            };
            word = word[head.len()..].to_string();
            lines.push(head);
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Build a filename stem from user-facing names.
///
/// Whitespace becomes `_`; path separators and characters reserved on common
/// filesystems are dropped.
pub fn sanitize_filename(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = String::with_capacity(joined.len());
    let mut last_underscore = false;
    for c in joined.chars() {
        if c.is_whitespace() {
            if !last_underscore {
                out.push('_');
                last_underscore = true;
            }
        } else if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            continue;
        } else {
            out.push(c);
            last_underscore = c == '_';
        }
    }

    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "foodcraft".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a currency amount the way the billing screens show it.
pub fn format_price(amount: f64) -> String {
    format!("R$ {:.2}", amount).replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_width_cjk() {
        assert_eq!(display_width("Hello"), 5);
        assert_eq!(display_width("你好"), 4);
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("Hello, World!", 5), "Hello");
        assert_eq!(truncate_to_width("你好世界", 4), "你好");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("Margherita", 6), "Margh…");
        assert_eq!(ellipsize("Soup", 6), "Soup");
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(
            wrap_words("tomato mozzarella basil", 12),
            vec!["tomato", "mozzarella", "basil"]
        );
        assert_eq!(wrap_words("a b c", 3), vec!["a b", "c"]);
        assert_eq!(wrap_words("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap_words("   ", 5).is_empty());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(&["Bella Pizza", "Menu"]), "Bella_Pizza_Menu");
        assert_eq!(sanitize_filename(&["../etc/passwd"]), "etcpasswd");
        assert_eq!(sanitize_filename(&["  \t "]), "foodcraft");
        assert_eq!(sanitize_filename(&["Café  do\tZé", "Logo"]), "Café_do_Zé_Logo");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(49.9), "R$ 49,90");
    }
}
