//! Help overlay rendering

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::UiColors;

const BINDINGS: &[(&str, &[(&str, &str)])] = &[
    (
        "Global",
        &[
            ("Q", "Quit application"),
            ("?", "Toggle help overlay"),
            ("Tab / Shift+Tab", "Next / previous widget"),
            ("T", "Toggle light / dark theme"),
            ("B", "Credit store"),
            ("Shift+O", "Sign out"),
        ],
    ),
    (
        "Tools",
        &[("1-8", "Jump to tool"), ("↑ ↓", "Navigate tools"), ("G", "Generate")],
    ),
    (
        "Settings",
        &[
            ("↑ ↓", "Navigate settings"),
            ("Enter", "Edit text / toggle"),
            ("← → Space", "Change choice"),
            ("R", "Refresh menu text (free)"),
            ("E / P", "Export PNG / PDF"),
            ("C", "Copy text result"),
        ],
    ),
    (
        "Preview",
        &[
            ("+ -", "Scale"),
            ("[ ]", "Rotate"),
            ("Arrows", "Move"),
            ("X", "Menu part: page, title, content, logo"),
            ("O / V", "Overlay / layout"),
            ("1 2 3", "Title / body / price color"),
            ("R", "Reset adjustments"),
        ],
    ),
];

/// Render the help overlay
pub fn render_help_overlay(frame: &mut Frame, area: Rect, colors: &UiColors) {
    let overlay_width = (area.width as f32 * 0.7).min(70.0) as u16;
    let overlay_height = (area.height as f32 * 0.9).min(36.0) as u16;

    let overlay_area = centered_rect(overlay_width, overlay_height, area);

    // Clear background
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.accent))
        .title(Span::styled(
            " Keyboard Shortcuts ",
            Style::default().fg(colors.accent).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let widget = Paragraph::new(create_help_text(colors)).style(Style::default().fg(colors.text));
    frame.render_widget(widget, inner);
}

/// Create help text content
fn create_help_text(colors: &UiColors) -> Vec<Line<'static>> {
    let section_style = Style::default().fg(colors.highlight).add_modifier(Modifier::BOLD);
    let key_style = Style::default().fg(ratatui::style::Color::Green);
    let desc_style = Style::default().fg(colors.text);

    let mut lines = Vec::new();
    for (section, keys) in BINDINGS {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(*section, section_style)));
        for (key, desc) in keys.iter() {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<16}", key), key_style),
                Span::styled(*desc, desc_style),
            ]));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "       [Press ? or Esc to close]",
        Style::default().fg(colors.muted),
    )));
    lines
}

/// Create a centered rectangle
pub(crate) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal_padding = area.width.saturating_sub(width) / 2;
    let vertical_padding = area.height.saturating_sub(height) / 2;

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(vertical_padding),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(horizontal_padding),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::Theme;

    #[test]
    fn test_centered_rect_fits() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(60, 20, area);
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (20, 10, 60, 20));
    }

    #[test]
    fn test_help_lists_every_section() {
        let lines = create_help_text(&UiColors::for_theme(Theme::Dark));
        for (section, _) in BINDINGS {
            assert!(lines.iter().any(|l| l.spans.iter().any(|s| s.content == *section)));
        }
    }
}
