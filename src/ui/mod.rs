//! UI module
//!
//! Contains all UI rendering components using Ratatui.

mod help;
mod modals;
mod preview;
mod widgets;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::coordinator::NoticeLevel;
use crate::prefs::Theme;
use crate::state::{AppState, FocusedWidget};
use crate::text::display_width;
use crate::tools::Tool;

pub(crate) use help::centered_rect;

/// Colors for one UI theme
#[derive(Debug, Clone, Copy)]
pub(crate) struct UiColors {
    pub accent: Color,
    pub highlight: Color,
    pub text: Color,
    pub muted: Color,
    pub bar_bg: Color,
    pub bar_fg: Color,
    pub status_bg: Color,
}

impl UiColors {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                accent: Color::Rgb(0xea, 0x58, 0x0c),
                highlight: Color::Rgb(0xb4, 0x53, 0x09),
                text: Color::Reset,
                muted: Color::DarkGray,
                bar_bg: Color::Rgb(0xea, 0x58, 0x0c),
                bar_fg: Color::White,
                status_bg: Color::Reset,
            },
            Theme::Dark => Self {
                accent: Color::Cyan,
                highlight: Color::Yellow,
                text: Color::White,
                muted: Color::DarkGray,
                bar_bg: Color::DarkGray,
                bar_fg: Color::White,
                status_bg: Color::Black,
            },
        }
    }

    pub fn border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.accent)
        } else {
            Style::default().fg(self.muted)
        }
    }
}

/// Main render function - draws the entire UI
pub fn render(frame: &mut Frame, state: &mut AppState) {
    let size = frame.area();
    let colors = UiColors::for_theme(state.theme());

    // Check minimum size
    if size.width < 40 || size.height < 15 {
        render_size_warning(frame, size);
        return;
    }

    // Main layout: title bar, content, status bar
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),  // Title bar
            Constraint::Min(10),    // Main content
            Constraint::Length(1),  // Status bar
        ])
        .split(size);

    render_title_bar(frame, main_chunks[0], state, &colors);
    if state.is_signed_in() {
        render_main_content(frame, main_chunks[1], state, &colors);
    } else {
        modals::render_auth_screen(frame, main_chunks[1], state, &colors);
    }
    render_status_bar(frame, main_chunks[2], state, &colors);

    if let Some(modal) = state.modal.as_ref() {
        modals::render_modal(frame, size, modal, state, &colors);
    }

    // Render help overlay if active
    if state.show_help {
        help::render_help_overlay(frame, size, &colors);
    }
}

/// Render warning when terminal is too small
fn render_size_warning(frame: &mut Frame, area: Rect) {
    let warning = Paragraph::new("Terminal too small!\nMinimum: 40x15")
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(warning, area);
}

/// Render the title bar
fn render_title_bar(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let mut left = vec![
        Span::styled(" FoodCraft ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
    ];
    match &state.workspace {
        Some(ws) => {
            let snapshot = ws.ledger.snapshot();
            left.push(Span::raw(state.tool.name().to_string()));
            left.push(Span::raw(" │ "));
            left.push(Span::raw(format!("{} · ", ws.user.first_name())));
            left.push(Span::styled(
                format!("◆ {} credits", snapshot.balance),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            left.push(Span::raw(format!(" ({})", snapshot.plan.name())));
        }
        None => left.push(Span::raw("Sign in")),
    }

    let right = vec![
        Span::raw("[?] Help "),
        Span::raw("[Q] Quit "),
    ];
    let used: usize = left.iter().chain(right.iter()).map(|s| display_width(&s.content)).sum();
    let mut spans = left;
    spans.push(Span::raw(" ".repeat((area.width as usize).saturating_sub(used))));
    spans.extend(right);

    let title_widget = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(colors.bar_bg).fg(colors.bar_fg));

    frame.render_widget(title_widget, area);
}

/// Render the main content area
fn render_main_content(frame: &mut Frame, area: Rect, state: &mut AppState, colors: &UiColors) {
    // Responsive layout: side-by-side if wide enough, stacked if narrow
    if area.width >= 80 {
        render_wide_layout(frame, area, state, colors);
    } else {
        render_narrow_layout(frame, area, state, colors);
    }
}

/// Render side-by-side layout for wide terminals
fn render_wide_layout(frame: &mut Frame, area: Rect, state: &mut AppState, colors: &UiColors) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(38), // Left panel
            Constraint::Min(40),    // Preview area
        ])
        .split(area);

    // Left panel: tool selector + control panel
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(Tool::ALL.len() as u16 + 2),
            Constraint::Min(5),
        ])
        .split(chunks[0]);

    render_tool_selector(frame, left_chunks[0], state, colors);
    render_control_panel(frame, left_chunks[1], state, colors);
    preview::render_preview(frame, chunks[1], state, colors);
}

/// Render stacked layout for narrow terminals
fn render_narrow_layout(frame: &mut Frame, area: Rect, state: &mut AppState, colors: &UiColors) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // Tool selector
            Constraint::Length(10), // Control panel
            Constraint::Min(5),     // Preview area
        ])
        .split(area);

    render_tool_strip(frame, chunks[0], state, colors);
    render_control_panel(frame, chunks[1], state, colors);
    preview::render_preview(frame, chunks[2], state, colors);
}

fn titled_block(title: &str, focused: bool, colors: &UiColors) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(colors.border(focused))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().add_modifier(Modifier::BOLD),
        ))
}

/// Render the tool selector widget
fn render_tool_selector(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let block = titled_block("Tools", state.focus == FocusedWidget::ToolSelector, colors);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let busy = |tool: Tool| state.workspace.as_ref().map(|ws| ws.is_busy(tool)).unwrap_or(false);
    let lines: Vec<Line> = Tool::ALL
        .iter()
        .enumerate()
        .map(|(idx, tool)| {
            let is_selected = *tool == state.tool;
            let bullet = if is_selected { "●" } else { "○" };
            let style = if is_selected {
                Style::default().fg(colors.highlight).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text)
            };
            let cost = match tool.cost() {
                0 => "free".to_string(),
                n => format!("{} cr", n),
            };
            let mut spans = vec![
                Span::styled(
                    format!(" {} ", bullet),
                    if is_selected {
                        Style::default().fg(colors.highlight)
                    } else {
                        Style::default().fg(colors.muted)
                    },
                ),
                Span::styled(tool.name(), style),
                Span::styled(format!(" [{}] {}", idx + 1, cost), Style::default().fg(colors.muted)),
            ];
            if busy(*tool) {
                spans.push(Span::styled(" …", Style::default().fg(colors.accent)));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Compact one-line selector for narrow terminals
fn render_tool_strip(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let block = titled_block("Tools", state.focus == FocusedWidget::ToolSelector, colors);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let spans: Vec<Span> = Tool::ALL
        .iter()
        .enumerate()
        .map(|(idx, tool)| {
            let style = if *tool == state.tool {
                Style::default().fg(colors.highlight).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.muted)
            };
            Span::styled(format!("{}:{} ", idx + 1, tool.key()), style)
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

/// Render the control panel
fn render_control_panel(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let is_focused = state.focus == FocusedWidget::ControlPanel;
    let block = titled_block("Settings", is_focused, colors);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    widgets::render_tool_controls(frame, inner, state, is_focused, colors);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, colors: &UiColors) {
    let status_color = match state.status.level {
        NoticeLevel::Error => Color::Red,
        NoticeLevel::Success => Color::Green,
        NoticeLevel::Info => colors.text,
    };

    // Format performance metrics
    let raster = state
        .perf_metrics
        .raster_ms()
        .map(|ms| format!(" │ Preview: {:>4}ms", ms))
        .unwrap_or_default();
    let perf_info = format!("FPS: {:>3}{}", state.perf_metrics.fps_int(), raster);

    let spacing = (area.width as usize)
        .saturating_sub(display_width(&state.status.message))
        .saturating_sub(display_width(&perf_info))
        .saturating_sub(2);

    let status = Line::from(vec![
        Span::raw(" "),
        Span::styled(state.status.message.clone(), Style::default().fg(status_color)),
        Span::raw(" ".repeat(spacing)),
        Span::styled(perf_info, Style::default().fg(colors.muted)),
        Span::raw(" "),
    ]);

    let widget = Paragraph::new(status).style(Style::default().bg(colors.status_bg));
    frame.render_widget(widget, area);
}
