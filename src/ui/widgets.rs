//! Control panel widgets for each tool

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::UiColors;
use crate::forms::SettingKind;
use crate::state::AppState;
use crate::tools::Tool;

/// Render the settings and actions of the current tool
pub fn render_tool_controls(frame: &mut Frame, area: Rect, state: &AppState, is_focused: bool, colors: &UiColors) {
    let form = state.current_form();
    let selected = state.current_selected_setting();
    let mut lines = Vec::new();

    for index in 0..form.settings_count() {
        let is_selected = selected == index && is_focused;
        let mut value = form.display_value(index);
        if is_selected && state.editing {
            value = format!("{}▏", form.setting_value(index));
        }
        let hint = match form.setting_kind(index) {
            SettingKind::Text if is_selected && !state.editing => Some("[Enter]"),
            SettingKind::Text => None,
            SettingKind::Choice => Some("[←/→]"),
            SettingKind::Toggle => Some("[Space]"),
        };
        lines.push(create_setting_line(form.setting_name(index), &value, is_selected, hint, colors));
    }

    if state.tool == Tool::Menu {
        lines.push(Line::from(Span::styled(
            "  Dishes: Cat: dish | ingr. | price / ...; Cat2: ...",
            Style::default().fg(colors.muted),
        )));
    }

    // Action buttons
    lines.push(Line::from(""));
    let cost = state.tool.cost();
    let generate = if cost == 0 {
        "Generate (free)".to_string()
    } else {
        format!("Generate ({} credit)", cost)
    };
    lines.push(create_action_line("[G]", &generate, colors));
    match state.tool {
        Tool::Menu => {
            lines.push(create_action_line("[R]", "Refresh text (free)", colors));
            lines.push(create_action_line("[E]/[P]", "Export PNG / PDF", colors));
        }
        Tool::Logo | Tool::Photo => lines.push(create_action_line("[E]", "Export PNG", colors)),
        Tool::Pricing | Tool::Social | Tool::Promotion | Tool::Catalog | Tool::Brand => {
            lines.push(create_action_line("[C]", "Copy to clipboard", colors))
        }
    }
    lines.push(create_action_line("[B]", "Buy credits", colors));

    // Tip shown when this panel is focused
    if is_focused {
        lines.push(Line::from(Span::styled(
            "Tip: Tab moves focus to the preview, where the result can be adjusted",
            Style::default().fg(colors.muted),
        )));
    }

    let widget = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

/// Create a setting line with label, value and optional key hint
pub(crate) fn create_setting_line(
    label: &str,
    value: &str,
    is_selected: bool,
    hint: Option<&str>,
    colors: &UiColors,
) -> Line<'static> {
    let indicator = if is_selected { "▸" } else { " " };
    let indicator_style = Style::default().fg(colors.accent);

    let label_style = if is_selected {
        Style::default().fg(colors.highlight).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(colors.text)
    };

    let value_style = if is_selected {
        Style::default().fg(colors.accent)
    } else {
        Style::default().fg(colors.muted)
    };

    let mut spans = vec![
        Span::styled(format!("{} ", indicator), indicator_style),
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(value.to_string(), value_style),
    ];

    if let Some(hint_text) = hint {
        spans.push(Span::styled(format!(" {}", hint_text), Style::default().fg(colors.muted)));
    }

    Line::from(spans)
}

/// Create an action line (button-like)
pub(crate) fn create_action_line(key: &str, label: &str, colors: &UiColors) -> Line<'static> {
    Line::from(vec![
        Span::styled("  ", Style::default()),
        Span::styled(key.to_string(), Style::default().fg(ratatui::style::Color::Green)),
        Span::styled(format!(" {}", label), Style::default().fg(colors.text)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::Theme;

    #[test]
    fn test_setting_line_marks_selection() {
        let colors = UiColors::for_theme(Theme::Dark);
        let line = create_setting_line("Name", "Cafe", true, Some("[Enter]"), &colors);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "▸ Name: Cafe [Enter]");

        let line = create_setting_line("Name", "Cafe", false, None, &colors);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "  Name: Cafe");
    }

    #[test]
    fn test_action_line() {
        let colors = UiColors::for_theme(Theme::Light);
        let line = create_action_line("[G]", "Generate", &colors);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "  [G] Generate");
    }
}
