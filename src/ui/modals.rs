//! Auth screen and the dialogs drawn over the dashboard

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::widgets::{create_action_line, create_setting_line};
use super::{centered_rect, UiColors};
use crate::billing::{self, PurchaseItem};
use crate::state::{store_items, AppState, AuthMode, CheckoutState, Modal};
use crate::text::format_price;
use crate::tools::Tool;

fn dialog(frame: &mut Frame, area: Rect, width: u16, height: u16, title: &str, colors: &UiColors) -> Rect {
    let rect = centered_rect(width.min(area.width), height.min(area.height), area);
    frame.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.accent))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(colors.accent).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);
    let inner = block.inner(rect);
    frame.render_widget(block, rect);
    inner
}

fn error_line(error: &Option<String>) -> Option<Line<'static>> {
    error
        .as_ref()
        .map(|e| Line::from(Span::styled(e.clone(), Style::default().fg(Color::Red))))
}

/// Login / sign-up form shown in place of the dashboard
pub fn render_auth_screen(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let form = &state.auth_form;
    let title = match form.mode {
        AuthMode::Login => "Sign in",
        AuthMode::Register => "Create account",
    };
    let inner = dialog(frame, area, 56, 14, title, colors);

    let mut lines = vec![
        Line::from(Span::styled(
            "Menus, logos and marketing for your food business",
            Style::default().fg(colors.muted),
        )),
        Line::from(""),
    ];
    for index in 0..form.field_count() {
        lines.push(create_setting_line(
            form.field_name(index),
            &form.field_display(index),
            index == form.selected,
            None,
            colors,
        ));
    }
    lines.push(Line::from(""));
    if form.submitting {
        lines.push(Line::from(Span::styled("Please wait...", Style::default().fg(colors.highlight))));
    } else if let Some(line) = error_line(&form.error) {
        lines.push(line);
    }
    lines.push(create_action_line("[Enter]", title, colors));
    let switch = match form.mode {
        AuthMode::Login => "No account? Sign up",
        AuthMode::Register => "Have an account? Sign in",
    };
    lines.push(create_action_line("[Ctrl+R]", switch, colors));
    lines.push(create_action_line("[Esc]", "Quit", colors));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

pub fn render_modal(frame: &mut Frame, area: Rect, modal: &Modal, state: &AppState, colors: &UiColors) {
    match modal {
        Modal::Intro(tool) => render_intro(frame, area, *tool, colors),
        Modal::Upsell { tool, cost } => render_upsell(frame, area, *tool, *cost, state, colors),
        Modal::Store { selected } => render_store(frame, area, *selected, colors),
        Modal::Checkout(checkout) => render_checkout(frame, area, checkout, colors),
    }
}

fn render_intro(frame: &mut Frame, area: Rect, tool: Tool, colors: &UiColors) {
    let inner = dialog(frame, area, 60, 10, tool.name(), colors);
    let cost = match tool.cost() {
        0 => "Free to use.".to_string(),
        n => format!("Each generation uses {} credit.", n),
    };
    let lines = vec![
        Line::from(tool.intro()),
        Line::from(""),
        Line::from(Span::styled(cost, Style::default().fg(colors.muted))),
        Line::from(""),
        create_action_line("[Enter]", "Start", colors),
        create_action_line("[D]", "Don't show again today", colors),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn render_upsell(frame: &mut Frame, area: Rect, tool: Tool, cost: u32, state: &AppState, colors: &UiColors) {
    let inner = dialog(frame, area, 56, 9, "Out of credits", colors);
    let balance = state.ledger().map(|l| l.balance()).unwrap_or(0);
    let lines = vec![
        Line::from(format!("{} needs {} credit; you have {}.", tool.name(), cost, balance)),
        Line::from(Span::styled(
            "Text tools stay free. Upgrade or buy a pack to keep creating images.",
            Style::default().fg(colors.muted),
        )),
        Line::from(""),
        create_action_line("[Enter]", "Open the credit store", colors),
        create_action_line("[Esc]", "Not now", colors),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn render_store(frame: &mut Frame, area: Rect, selected: usize, colors: &UiColors) {
    let items = store_items();
    let inner = dialog(frame, area, 64, items.len() as u16 + 8, "Credit Store", colors);
    let mut lines = vec![Line::from(Span::styled(
        "Plans renew monthly; packs never expire.",
        Style::default().fg(colors.muted),
    ))];
    for (idx, item) in items.iter().enumerate() {
        let is_selected = idx == selected;
        let extra = match item {
            PurchaseItem::Plan(tier) => billing::plan(*tier).features.join(", "),
            PurchaseItem::Pack(id) => billing::pack(id)
                .map(|p| {
                    if p.popular {
                        format!("{} · popular", p.label)
                    } else {
                        p.label.to_string()
                    }
                })
                .unwrap_or_default(),
        };
        lines.push(create_setting_line(
            &item.description(),
            &format!("{} · {} credits", format_price(item.amount()), item.credits()),
            is_selected,
            None,
            colors,
        ));
        if is_selected {
            lines.push(Line::from(Span::styled(format!("    {}", extra), Style::default().fg(colors.muted))));
        }
    }
    lines.push(Line::from(""));
    lines.push(create_action_line("[Enter]", "Checkout", colors));
    lines.push(create_action_line("[Esc]", "Close", colors));
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_checkout(frame: &mut Frame, area: Rect, checkout: &CheckoutState, colors: &UiColors) {
    let inner = dialog(frame, area, 60, 14, "Checkout", colors);
    let mut lines = vec![
        Line::from(Span::styled(checkout.item.summary(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
    ];
    for (index, name) in CheckoutState::FIELDS.iter().enumerate() {
        let value = checkout.field(index);
        let value = if value.is_empty() { "[Type here...]" } else { value };
        lines.push(create_setting_line(name, value, index == checkout.selected, None, colors));
    }
    lines.push(Line::from(""));
    if checkout.submitting {
        lines.push(Line::from(Span::styled(
            "Redirecting to payment...",
            Style::default().fg(colors.highlight),
        )));
    } else if let Some(line) = error_line(&checkout.error) {
        lines.push(line);
    }
    lines.push(create_action_line("[Enter]", "Pay", colors));
    lines.push(create_action_line("[Esc]", "Back to store", colors));
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}
