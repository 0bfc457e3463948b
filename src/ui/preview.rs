//! Preview area rendering

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use super::UiColors;
use crate::state::{AppState, FocusedWidget};
use crate::text::{format_price, wrap_words};
use crate::tools::brand::BrandIdentity;
use crate::tools::catalog;
use crate::tools::pricing::PricingStrategy;
use crate::tools::social::SocialPost;
use crate::tools::Tool;

/// Render the preview area
pub fn render_preview(frame: &mut Frame, area: Rect, state: &mut AppState, colors: &UiColors) {
    let is_focused = state.focus == FocusedWidget::Preview;
    let busy = state.workspace.as_ref().map(|ws| ws.is_busy(state.tool)).unwrap_or(false);
    let title = if busy { " Preview · generating… " } else { " Preview " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(colors.border(is_focused))
        .title(Span::styled(title, Style::default().add_modifier(Modifier::BOLD)));

    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height < 2 || inner.width < 2 {
        return;
    }

    match state.tool {
        Tool::Menu | Tool::Logo | Tool::Photo => render_image_preview(frame, inner, state, colors),
        Tool::Pricing | Tool::Social | Tool::Promotion | Tool::Catalog | Tool::Brand => {
            render_text_preview(frame, inner, state, colors)
        }
    }
}

/// Half-block rendering of the current scene plus a one-line adjustment summary
fn render_image_preview(frame: &mut Frame, area: Rect, state: &mut AppState, colors: &UiColors) {
    let max_cols = state.config.ui.preview_width;
    let cols = if max_cols > 0 { area.width.min(max_cols) } else { area.width };
    let rows = area.height - 1;

    let lines = match state.preview_lines(cols, rows) {
        Some(lines) => lines.to_vec(),
        None => return render_placeholder(frame, area, state, colors),
    };

    let width = lines.first().map(|l| l.width() as u16).unwrap_or(0).min(area.width);
    let height = (lines.len() as u16).min(rows);
    let image_area = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y,
        width,
        height,
    };
    frame.render_widget(Paragraph::new(lines), image_area);

    let info_area = Rect {
        x: area.x,
        y: area.y + area.height - 1,
        width: area.width,
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(adjustment_summary(state)).style(Style::default().fg(colors.muted)),
        info_area,
    );
}

fn adjustment_summary(state: &AppState) -> String {
    let Some(ws) = state.workspace.as_ref() else {
        return String::new();
    };
    let adj = match state.tool {
        Tool::Menu => *ws.menu.result().adjustments(),
        Tool::Logo => *ws.logo.result().adjustments(),
        _ => *ws.photo.result().adjustments(),
    };
    let mut summary = format!(
        "{:.0}% · {:+.1}° · overlay {}",
        adj.scale * 100.0,
        adj.rotation,
        adj.overlay.name()
    );
    if state.tool == Tool::Menu {
        summary.push_str(&format!(" · {} · [x] {}", adj.layout.name(), state.adjust_target.name()));
    }
    summary
}

fn render_text_preview(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let Some(ws) = state.workspace.as_ref() else {
        return;
    };
    let width = area.width.saturating_sub(1) as usize;
    let heading = Style::default().fg(colors.highlight).add_modifier(Modifier::BOLD);

    let lines = match state.tool {
        Tool::Pricing => ws.pricing.result().artifact().map(|s| pricing_lines(s, width, heading, colors)),
        Tool::Social => ws
            .social
            .result()
            .artifact()
            .map(|posts| social_lines(posts, state.social_form.selected_post, width, heading, colors)),
        Tool::Catalog => ws.catalog.result().artifact().map(|text| {
            catalog::plain_lines(text)
                .iter()
                .flat_map(|l| wrap_words(l, width))
                .map(Line::raw)
                .collect::<Vec<_>>()
        }),
        Tool::Brand => ws.brand.result().artifact().map(|identity| brand_lines(identity, width, heading)),
        _ => ws.promotion.result().artifact().map(|text| {
            text.lines()
                .flat_map(|l| wrap_words(l, width))
                .map(Line::raw)
                .collect::<Vec<_>>()
        }),
    };
    let Some(lines) = lines else {
        return render_placeholder(frame, area, state, colors);
    };

    let total_lines = lines.len();
    let visible_lines = area.height as usize;
    frame.render_widget(Paragraph::new(lines).style(Style::default().fg(colors.text)), area);

    // Render scrollbar if content is longer than the pane
    if total_lines > visible_lines {
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        let mut scrollbar_state = ScrollbarState::default()
            .content_length(total_lines)
            .position(0)
            .viewport_content_length(visible_lines);

        let scrollbar_area = Rect {
            x: area.x + area.width.saturating_sub(1),
            y: area.y,
            width: 1,
            height: area.height,
        };

        frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }
}

fn pricing_lines(strategy: &PricingStrategy, width: usize, heading: Style, colors: &UiColors) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Ideal price: ", heading),
            Span::raw(format_price(strategy.ideal_price)),
        ]),
        Line::from(vec![
            Span::styled("Net profit:  ", heading),
            Span::raw(format_price(strategy.net_profit)),
        ]),
        Line::from(""),
    ];
    if !strategy.combos.is_empty() {
        lines.push(Line::from(Span::styled("Combos", heading)));
        for combo in &strategy.combos {
            for (i, part) in wrap_words(combo, width.saturating_sub(4)).into_iter().enumerate() {
                let bullet = if i == 0 { "  • " } else { "    " };
                lines.push(Line::from(vec![
                    Span::styled(bullet, Style::default().fg(colors.accent)),
                    Span::raw(part),
                ]));
            }
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled("Strategy", heading)));
    lines.extend(wrap_words(&strategy.strategy, width).into_iter().map(Line::raw));
    lines
}

fn social_lines(
    posts: &[SocialPost],
    selected: usize,
    width: usize,
    heading: Style,
    colors: &UiColors,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, post) in posts.iter().enumerate() {
        let is_selected = idx == selected;
        let marker = if is_selected { "▸ " } else { "  " };
        let style = if is_selected { heading } else { Style::default().fg(colors.text) };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(colors.accent)),
            Span::styled(format!("{}: {}", post.day, post.topic), style),
        ]));
    }
    if let Some(post) = posts.get(selected) {
        lines.push(Line::from(""));
        lines.extend(
            post.to_clipboard()
                .lines()
                .flat_map(|l| wrap_words(l, width))
                .map(Line::raw),
        );
        lines.push(Line::from(Span::styled(
            "[↑/↓] choose a day · [C] copy",
            Style::default().fg(colors.muted),
        )));
    }
    lines
}

fn brand_lines(identity: &BrandIdentity, width: usize, heading: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (title, entries) in identity.sections() {
        if entries.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(title, heading)));
        for entry in &entries {
            for (i, part) in wrap_words(entry, width.saturating_sub(4)).into_iter().enumerate() {
                let bullet = if i == 0 { "  • " } else { "    " };
                lines.push(Line::raw(format!("{}{}", bullet, part)));
            }
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Render placeholder when no content
fn render_placeholder(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let busy = state.workspace.as_ref().map(|ws| ws.is_busy(state.tool)).unwrap_or(false);
    let message = if busy {
        vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("{} is working...", state.tool.name()),
                Style::default().fg(colors.highlight),
            )),
        ]
    } else {
        vec![
            Line::from(""),
            Line::from(Span::styled("Nothing generated yet", Style::default().fg(colors.muted))),
            Line::from(""),
            Line::from(Span::styled(
                "Fill in the settings on the left",
                Style::default().fg(ratatui::style::Color::Green),
            )),
            Line::from(""),
            Line::from(Span::styled("Press [G] to generate", Style::default().fg(colors.highlight))),
        ]
    };

    let widget = Paragraph::new(message)
        .style(Style::default().fg(colors.muted))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::Theme;

    #[test]
    fn test_pricing_lines_show_price() {
        let strategy = PricingStrategy {
            ideal_price: 25.0,
            net_profit: 7.5,
            combos: vec!["Burger + soda".into()],
            strategy: "Anchor the combo next to the single item.".into(),
        };
        let colors = UiColors::for_theme(Theme::Dark);
        let lines = pricing_lines(&strategy, 40, Style::default(), &colors);
        let first: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(first.starts_with("Ideal price: "));
        assert!(first.contains("25"));
        assert!(lines.iter().any(|l| l.spans.iter().any(|s| s.content.contains("Burger"))));
    }

    #[test]
    fn test_social_lines_mark_selected_day() {
        let posts = vec![
            SocialPost {
                day: "Monday".into(),
                topic: "Behind the scenes".into(),
                caption: "Meet the team".into(),
                hashtags: vec!["food".into()],
            },
            SocialPost {
                day: "Tuesday".into(),
                topic: "Dish of the day".into(),
                caption: "Try the lasagna".into(),
                hashtags: vec![],
            },
        ];
        let colors = UiColors::for_theme(Theme::Light);
        let lines = social_lines(&posts, 1, 40, Style::default(), &colors);
        let second: String = lines[1].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(second.starts_with("▸ Tuesday"));
        assert!(lines.iter().any(|l| l.spans.iter().any(|s| s.content.contains("lasagna"))));
    }
}
