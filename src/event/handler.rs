use std::io;
use std::time::Instant;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::debug;

use crate::app::{App, DialogState, FRAME_INTERVAL};
use crate::bottom_bar::BottomBarMode;
use crate::overlay::{OverlayKind, ToolbarAction};
use crate::ui;

pub fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let mut needs_render = true;

    loop {
        let now = Instant::now();
        if app.tick(now) {
            needs_render = true;
        }

        if needs_render {
            terminal.draw(|f| ui::render(f, app))?;
            needs_render = false;
        }

        if app.needs_frame(Instant::now()) {
            if event::poll(FRAME_INTERVAL)? {
                if process_events(app, &mut needs_render)? {
                    return Ok(());
                }
            } else {
                // Animations advance on their own clock.
                needs_render = true;
            }
        } else if process_events(app, &mut needs_render)? {
            // Idle: block until the next event.
            return Ok(());
        }
    }
}

// Drag and scroll events arrive faster than frames; drain a few per draw.
fn process_events(app: &mut App, needs_render: &mut bool) -> io::Result<bool> {
    const MAX_EVENTS_PER_BATCH: u8 = 8;
    let mut count = 0u8;

    loop {
        let event = event::read()?;
        count += 1;
        *needs_render = true;

        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if handle_key_event(app, key) {
                    return Ok(true);
                }
            }
            Event::Mouse(mouse) => handle_mouse_event(app, mouse),
            Event::Paste(text) => {
                if app.input_focused() {
                    let kept = app.ask_input.insert_str(&text);
                    if app.ask_input.remaining() == 0 {
                        debug!(kept, "paste filled the input");
                    }
                }
            }
            // Layouts are rebuilt on the next draw.
            Event::Resize(_, _) => {}
            _ => {}
        }

        if count >= MAX_EVENTS_PER_BATCH || !event::poll(std::time::Duration::ZERO)? {
            break;
        }
    }

    Ok(false)
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    let (col, row) = (mouse.column, mouse.row);
    let now = Instant::now();

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if app.dialog == DialogState::Help {
                app.dialog = DialogState::None;
                return;
            }

            // The overlay acts on the press first; the outside-click check
            // runs after, so an ask panel opened by this press stays open.
            let inside = app.overlay.rendered_area().map(|r| contains(r, col, row)).unwrap_or(false);
            if inside {
                if let Some(action) = app.toolbar_action_at(col, row) {
                    app.apply_toolbar_action(action, true, now);
                }
            }
            let kind = app.overlay.kind();
            if app.overlay.on_pointer_down(col, row) {
                match kind {
                    OverlayKind::Ask => app.cancel_ask(),
                    _ => app.document.clear_pending_selection(),
                }
            }
            if inside {
                return;
            }

            if app.in_bottom_bar(col, row) || app.click_card(col, row, now) {
                return;
            }
            if !app.begin_selection(col, row) {
                app.clear_focus();
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if app.mouse_button_held {
                app.extend_selection(col, row);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if app.mouse_button_held {
                app.finish_selection();
            }
        }
        MouseEventKind::ScrollDown => app.scroll_down(),
        MouseEventKind::ScrollUp => app.scroll_up(),
        _ => {}
    }
}

fn contains(rect: ratatui::layout::Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Returns true when the app should quit.
fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    if app.dialog == DialogState::Help {
        app.dialog = DialogState::None;
        return false;
    }

    if app.input_focused() {
        handle_input_key(app, key);
        return false;
    }

    if app.overlay.kind() == OverlayKind::Toolbar && handle_toolbar_key(app, key) {
        return false;
    }

    let now = Instant::now();
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => app.dialog = DialogState::Help,
        KeyCode::Esc => {
            if app.overlay.on_key(key.code) {
                app.document.clear_pending_selection();
            } else if app.bottom_bar.mode() != BottomBarMode::Navigation {
                app.bottom_bar.open_navigation();
            } else {
                app.clear_focus();
            }
        }
        KeyCode::Char('p') => {
            if app.bottom_bar.mode() == BottomBarMode::Progress {
                app.bottom_bar.open_navigation();
            } else {
                app.bottom_bar.open_progress();
            }
        }
        KeyCode::Char('/') => {
            // Free questions never continue an anchored conversation.
            app.clear_focus();
            app.bottom_bar.open_ask(None);
        }
        KeyCode::Char('c') => app.bottom_bar.open_chat(),
        KeyCode::Char('r') => {
            if let Some(key) = app.focused {
                app.retry_note(key, now);
            }
        }
        KeyCode::Char('d') => {
            if let Some(key) = app.focused {
                app.delete_anchor(key, now);
            }
        }
        KeyCode::Char(']') => app.focus_next(),
        KeyCode::Char('[') => app.focus_prev(),
        KeyCode::Right if shift => app.extend_selection_by_key(true),
        KeyCode::Left if shift => app.extend_selection_by_key(false),
        KeyCode::Char('j') | KeyCode::Down | KeyCode::PageDown => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up | KeyCode::PageUp => app.scroll_up(),
        _ => {}
    }
    false
}

/// Keys for the open selection toolbar. Returns false for keys it leaves to
/// the reader bindings.
fn handle_toolbar_key(app: &mut App, key: KeyEvent) -> bool {
    let now = Instant::now();
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Tab => app.overlay.select_next(),
        KeyCode::Right if !shift => app.overlay.select_next(),
        KeyCode::BackTab => app.overlay.select_prev(),
        KeyCode::Left if !shift => app.overlay.select_prev(),
        KeyCode::Enter => {
            let action = app.overlay.selected_action();
            app.apply_toolbar_action(action, false, now);
        }
        KeyCode::Char(c) => match ToolbarAction::from_hotkey(c) {
            Some(action) => {
                debug!(hotkey = %c, "toolbar hotkey");
                app.overlay.select(action);
                app.apply_toolbar_action(action, false, now);
            }
            None => return false,
        },
        _ => return false,
    }
    true
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_ask(),
        KeyCode::Enter => app.send_question(),
        KeyCode::Backspace => app.ask_input.backspace(),
        KeyCode::Delete => app.ask_input.delete(),
        KeyCode::Left => app.ask_input.move_left(),
        KeyCode::Right => app.ask_input.move_right(),
        KeyCode::Home => app.ask_input.move_home(),
        KeyCode::End => app.ask_input.move_end(),
        KeyCode::Char(c) => {
            app.ask_input.insert_char(c);
        }
        _ => {}
    }
}
