//! Input handling
//!
//! Maps keyboard events to state transitions with context-sensitive bindings.
//! Precedence: help overlay, open modal, auth screen, text editing, then the
//! focused dashboard widget.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::coordinator::Notice;
use crate::export::ExportKind;
use crate::state::{store_items, AdjustAction, AppState, FocusedWidget, Modal};
use crate::tools::Tool;

/// Handle an input event
pub fn handle_event(event: Event, state: &mut AppState) -> Result<()> {
    match event {
        Event::Key(key_event) if key_event.kind == KeyEventKind::Press => handle_key_event(key_event, state),
        Event::Resize(_, _) => Ok(()), // Already handled in main loop
        _ => Ok(()),
    }
}

/// Handle a key event
pub fn handle_key_event(key: KeyEvent, state: &mut AppState) -> Result<()> {
    if state.show_help {
        return handle_help_input(key, state);
    }

    if state.modal.is_some() {
        return handle_modal_input(key, state);
    }

    if !state.is_signed_in() {
        return handle_auth_input(key, state);
    }

    if state.editing {
        return handle_text_input(key, state);
    }

    // Global shortcuts
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            state.should_quit = true;
            return Ok(());
        }
        KeyCode::Char('?') => {
            state.show_help = true;
            return Ok(());
        }
        KeyCode::Tab => {
            state.focus = state.focus.next();
            return Ok(());
        }
        KeyCode::BackTab => {
            state.focus = state.focus.prev();
            return Ok(());
        }
        KeyCode::Char('t') => {
            state.toggle_theme();
            return Ok(());
        }
        KeyCode::Char('b') => {
            state.open_store();
            return Ok(());
        }
        KeyCode::Char('O') => {
            state.logout();
            return Ok(());
        }
        _ => {}
    }

    match state.focus {
        FocusedWidget::ToolSelector => handle_tool_selector_input(key, state),
        FocusedWidget::ControlPanel => handle_control_panel_input(key, state),
        FocusedWidget::Preview => handle_preview_input(key, state),
    }
}

/// Handle input when help overlay is shown
fn handle_help_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    match key.code {
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Enter => {
            state.show_help = false;
        }
        _ => {}
    }
    Ok(())
}

/// Login and sign-up form
fn handle_auth_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    let form = &mut state.auth_form;
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if key.code == KeyCode::Char('r') {
            form.toggle_mode();
        }
        return Ok(());
    }
    match key.code {
        KeyCode::Esc => state.should_quit = true,
        KeyCode::Tab | KeyCode::Down => form.selected = (form.selected + 1) % form.field_count(),
        KeyCode::BackTab | KeyCode::Up => {
            let count = form.field_count();
            form.selected = (form.selected + count - 1) % count;
        }
        KeyCode::Enter => state.submit_auth(),
        KeyCode::Backspace => {
            let selected = form.selected;
            form.field_mut(selected).pop();
        }
        KeyCode::Char(c) => {
            let selected = form.selected;
            form.field_mut(selected).push(c);
        }
        _ => {}
    }
    Ok(())
}

/// Handle typing into a tool text field
fn handle_text_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => state.stop_editing(),
        KeyCode::Backspace => state.edit_pop(),
        KeyCode::Char(c) => state.edit_push(c),
        _ => {}
    }
    Ok(())
}

fn handle_modal_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    let Some(modal) = state.modal.as_mut() else {
        return Ok(());
    };
    match modal {
        Modal::Intro(_) => match key.code {
            KeyCode::Char('d') | KeyCode::Char('D') => state.close_intro(true),
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ') => state.close_intro(false),
            _ => {}
        },
        Modal::Upsell { .. } => match key.code {
            KeyCode::Enter | KeyCode::Char('b') => state.modal = Some(Modal::Store { selected: 0 }),
            KeyCode::Esc => state.modal = None,
            _ => {}
        },
        Modal::Store { selected } => {
            let count = store_items().len();
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => *selected = (*selected + count - 1) % count,
                KeyCode::Down | KeyCode::Char('j') => *selected = (*selected + 1) % count,
                KeyCode::Enter => {
                    let index = *selected;
                    if let Some(item) = store_items().into_iter().nth(index) {
                        state.start_checkout(item);
                    }
                }
                KeyCode::Esc => state.modal = None,
                _ => {}
            }
        }
        Modal::Checkout(checkout) => {
            let count = 4;
            match key.code {
                KeyCode::Esc => {
                    if !checkout.submitting {
                        state.modal = Some(Modal::Store { selected: 0 });
                    }
                }
                KeyCode::Tab | KeyCode::Down => checkout.selected = (checkout.selected + 1) % count,
                KeyCode::BackTab | KeyCode::Up => checkout.selected = (checkout.selected + count - 1) % count,
                KeyCode::Enter => state.submit_checkout(),
                KeyCode::Backspace => {
                    let selected = checkout.selected;
                    checkout.field_mut(selected).pop();
                }
                KeyCode::Char(c) => {
                    let selected = checkout.selected;
                    checkout.field_mut(selected).push(c);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Handle input for the tool selector widget
fn handle_tool_selector_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    match key.code {
        KeyCode::Char(c @ '1'..='8') => {
            let index = c as usize - '1' as usize;
            state.set_tool(Tool::ALL[index]);
        }
        KeyCode::Up | KeyCode::Char('k') => state.set_tool(state.tool.prev()),
        KeyCode::Down | KeyCode::Char('j') => state.set_tool(state.tool.next()),
        KeyCode::Enter => state.focus = FocusedWidget::ControlPanel,
        KeyCode::Char('g') => state.trigger_generate(),
        _ => {}
    }
    Ok(())
}

/// Handle input for the control panel widget
fn handle_control_panel_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    match key.code {
        // Navigation
        KeyCode::Up | KeyCode::Char('k') => state.prev_setting(),
        KeyCode::Down | KeyCode::Char('j') => state.next_setting(),

        // Adjust settings
        KeyCode::Left | KeyCode::Char('h') => {
            state.cycle_setting(false);
        }
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
            state.cycle_setting(true);
        }
        KeyCode::Enter => {
            if !state.start_editing() {
                state.cycle_setting(true);
            }
        }

        // Actions
        KeyCode::Char('g') => state.trigger_generate(),
        KeyCode::Char('r') => state.trigger_text_refresh(),
        KeyCode::Char('e') => state.trigger_export(ExportKind::Image),
        KeyCode::Char('p') => state.trigger_export(ExportKind::Document),
        KeyCode::Char('c') => copy_to_clipboard(state)?,

        _ => {}
    }
    Ok(())
}

/// Handle input for the preview widget
fn handle_preview_input(key: KeyEvent, state: &mut AppState) -> Result<()> {
    if !state.tool.is_image() {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => state.select_post(false),
            KeyCode::Down | KeyCode::Char('j') => state.select_post(true),
            KeyCode::Char('c') => copy_to_clipboard(state)?,
            KeyCode::Char('g') => state.trigger_generate(),
            _ => {}
        }
        return Ok(());
    }

    let action = match key.code {
        KeyCode::Char('+') | KeyCode::Char('=') => AdjustAction::Grow,
        KeyCode::Char('-') | KeyCode::Char('_') => AdjustAction::Shrink,
        KeyCode::Char('[') => AdjustAction::RotateLeft,
        KeyCode::Char(']') => AdjustAction::RotateRight,
        KeyCode::Left | KeyCode::Char('h') => AdjustAction::Move { dx: -1.0, dy: 0.0 },
        KeyCode::Right | KeyCode::Char('l') => AdjustAction::Move { dx: 1.0, dy: 0.0 },
        KeyCode::Up | KeyCode::Char('k') => AdjustAction::Move { dx: 0.0, dy: -1.0 },
        KeyCode::Down | KeyCode::Char('j') => AdjustAction::Move { dx: 0.0, dy: 1.0 },
        KeyCode::Char('o') => AdjustAction::NextOverlay,
        KeyCode::Char('v') => AdjustAction::NextLayout,
        KeyCode::Char('1') => AdjustAction::NextTitleColor,
        KeyCode::Char('2') => AdjustAction::NextBodyColor,
        KeyCode::Char('3') => AdjustAction::NextPriceColor,
        KeyCode::Char('r') => AdjustAction::Reset,
        KeyCode::Char('x') => {
            state.cycle_adjust_target();
            return Ok(());
        }
        KeyCode::Char('e') => {
            state.trigger_export(ExportKind::Image);
            return Ok(());
        }
        KeyCode::Char('p') => {
            state.trigger_export(ExportKind::Document);
            return Ok(());
        }
        KeyCode::Char('g') => {
            state.trigger_generate();
            return Ok(());
        }
        _ => return Ok(()),
    };
    state.adjust(action);
    Ok(())
}

/// Copy the current text result to the system clipboard
fn copy_to_clipboard(state: &mut AppState) -> Result<()> {
    let Some(text) = state.clipboard_text() else {
        state.set_notice(Notice::info("Nothing to copy - generate first"));
        return Ok(());
    };

    match arboard::Clipboard::new() {
        Ok(mut clipboard) => match clipboard.set_text(text) {
            Ok(_) => state.set_notice(Notice::success("Copied to clipboard")),
            Err(e) => state.set_notice(Notice::error(format!("Copy failed: {}", e))),
        },
        Err(e) => state.set_notice(Notice::error(format!("Clipboard unavailable: {}", e))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crossbeam_channel::{unbounded, Receiver};

    use crate::account::{MemoryProfileStore, User};
    use crate::config::Config;
    use crate::prefs::Preferences;
    use crate::render::Rasterizer;
    use crate::state::{AppContext, AuthMode};
    use crate::terminal_capabilities::TerminalCapabilities;
    use crate::worker::{Job, WorkerMessage};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn state(rt: &tokio::runtime::Runtime) -> (AppState, Receiver<WorkerMessage>) {
        let (tx, rx) = unbounded();
        let state = AppState::new(AppContext {
            config: Config::default(),
            capabilities: TerminalCapabilities::default(),
            worker_tx: tx,
            runtime: rt.handle().clone(),
            store: Arc::new(MemoryProfileStore::new()),
            rasterizer: Rasterizer::new(),
            prefs: Preferences::default(),
            prefs_path: None,
            auth_events: None,
        });
        (state, rx)
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn sign_in(state: &mut AppState) {
        state.sign_in(User::from_parts("u1".into(), "ana@example.com".into(), None, None));
        state.modal = None;
    }

    #[test]
    fn test_quit_key() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        sign_in(&mut state);
        handle_key_event(key(KeyCode::Char('q')), &mut state).unwrap();
        assert!(state.should_quit);
    }

    #[test]
    fn test_focus_cycle() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        sign_in(&mut state);
        assert_eq!(state.focus, FocusedWidget::ToolSelector);
        handle_key_event(key(KeyCode::Tab), &mut state).unwrap();
        assert_eq!(state.focus, FocusedWidget::ControlPanel);
        handle_key_event(key(KeyCode::BackTab), &mut state).unwrap();
        assert_eq!(state.focus, FocusedWidget::ToolSelector);
    }

    #[test]
    fn test_auth_typing_and_submit() {
        let rt = runtime();
        let (mut state, rx) = state(&rt);
        for c in "ana@example.com".chars() {
            handle_key_event(key(KeyCode::Char(c)), &mut state).unwrap();
        }
        handle_key_event(key(KeyCode::Tab), &mut state).unwrap();
        for c in "secret1".chars() {
            handle_key_event(key(KeyCode::Char(c)), &mut state).unwrap();
        }
        assert!(!state.should_quit);
        handle_key_event(key(KeyCode::Enter), &mut state).unwrap();
        match rx.try_recv() {
            Ok(WorkerMessage::Run(Job::Login { email, password })) => {
                assert_eq!(email, "ana@example.com");
                assert_eq!(password, "secret1");
            }
            other => panic!("expected login job, got {:?}", other),
        }
        assert!(state.auth_form.submitting);
    }

    #[test]
    fn test_ctrl_r_switches_to_register() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        handle_key_event(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL), &mut state).unwrap();
        assert_eq!(state.auth_form.mode, AuthMode::Register);
        assert!(state.auth_form.name.is_empty());
    }

    #[test]
    fn test_tool_shortcuts() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        sign_in(&mut state);
        handle_key_event(key(KeyCode::Char('4')), &mut state).unwrap();
        assert_eq!(state.tool, Tool::Pricing);
    }

    #[test]
    fn test_editing_captures_keys() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        sign_in(&mut state);
        state.focus = FocusedWidget::ControlPanel;
        handle_key_event(key(KeyCode::Enter), &mut state).unwrap();
        assert!(state.editing);
        handle_key_event(key(KeyCode::Char('q')), &mut state).unwrap();
        assert!(!state.should_quit);
        handle_key_event(key(KeyCode::Enter), &mut state).unwrap();
        assert!(!state.editing);
        assert_eq!(state.menu_form.restaurant_name, "q");
    }

    #[test]
    fn test_store_to_checkout_and_back() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        sign_in(&mut state);
        handle_key_event(key(KeyCode::Char('b')), &mut state).unwrap();
        handle_key_event(key(KeyCode::Down), &mut state).unwrap();
        handle_key_event(key(KeyCode::Enter), &mut state).unwrap();
        assert!(matches!(state.modal, Some(Modal::Checkout(_))));
        handle_key_event(key(KeyCode::Esc), &mut state).unwrap();
        assert!(matches!(state.modal, Some(Modal::Store { .. })));
        handle_key_event(key(KeyCode::Esc), &mut state).unwrap();
        assert!(state.modal.is_none());
    }

    #[test]
    fn test_help_swallows_keys() {
        let rt = runtime();
        let (mut state, _rx) = state(&rt);
        sign_in(&mut state);
        state.show_help = true;
        handle_key_event(key(KeyCode::Char('q')), &mut state).unwrap();
        assert!(!state.should_quit);
        handle_key_event(key(KeyCode::Esc), &mut state).unwrap();
        assert!(!state.show_help);
    }
}
