mod bottom_bar;
mod content;
mod dialogs;
mod note_card;
mod overlay;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    text::Span,
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, DialogState};
use crate::ask::AskInput;
use crate::bottom_bar::BottomBarMode;
use crate::theme::Theme;

pub use bottom_bar::render_bottom_bar;
pub use content::{render_content, wrap_text};
pub use dialogs::render_help_dialog;
pub use overlay::render_overlay;

/// Rows the bottom bar takes in each mode.
pub fn bottom_bar_height(mode: BottomBarMode) -> u16 {
    match mode {
        BottomBarMode::Navigation | BottomBarMode::Progress => 1,
        BottomBarMode::Ask => 4,
        BottomBarMode::Chat => 12,
    }
}

pub fn render(f: &mut Frame, app: &mut App) {
    let vertical_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(bottom_bar_height(app.bottom_bar.mode())),
        ])
        .split(f.area());

    render_content(f, app, vertical_chunks[0]);
    // The overlay follows the selection into this frame's layout.
    app.refresh_overlay();

    render_bottom_bar(f, app, vertical_chunks[1]);
    render_overlay(f, app);

    if app.dialog == DialogState::Help {
        render_help_dialog(f, app);
    }
}

/// Visible slice of a single-line input `width` cells wide, and the cursor
/// column inside it. The slice scrolls so the cursor stays on screen.
pub fn input_window(input: &AskInput, width: u16) -> (String, u16) {
    let chars: Vec<char> = input.text().chars().collect();
    let cursor = input.cursor().min(chars.len());
    let width = width.max(1) as usize;
    let cell = |c: &char| c.width().unwrap_or(0);

    let mut start = 0;
    while chars[start..cursor].iter().map(cell).sum::<usize>() >= width {
        start += 1;
    }
    let mut shown = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = cell(c);
        if used + w > width {
            break;
        }
        shown.push(*c);
        used += w;
    }
    let col = chars[start..cursor].iter().map(cell).sum::<usize>() as u16;
    (shown, col)
}

/// Characters left in the ask input, coloured as the limit approaches.
pub fn remaining_span(theme: &Theme, input: &AskInput) -> Span<'static> {
    let remaining = input.remaining();
    let color = if remaining == 0 {
        theme.error
    } else if input.is_near_limit() {
        theme.warning
    } else {
        theme.muted
    };
    Span::styled(format!(" {remaining}"), Style::default().fg(color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_input_window_fits() {
        let input = AskInput::with_seed("What is Lex?");
        assert_eq!(input_window(&input, 40), ("What is Lex?".to_string(), 12));
    }

    #[test]
    fn test_input_window_scrolls_to_cursor() {
        let input = AskInput::with_seed("abcdefghij");
        let (shown, col) = input_window(&input, 5);
        assert_eq!(shown, "ghij");
        assert_eq!(col, 4);
    }

    #[test]
    fn test_input_window_cursor_at_start() {
        let mut input = AskInput::with_seed("abcdefghij");
        input.move_home();
        assert_eq!(input_window(&input, 5), ("abcde".to_string(), 0));
    }

    #[test]
    fn test_remaining_span_counts_down() {
        let theme = Theme::default();
        let input = AskInput::with_seed("What is Lex?");
        let span = remaining_span(&theme, &input);
        assert_eq!(span.content, " 238");
        assert_eq!(span.style.fg, Some(theme.muted));

        let full = AskInput::with_seed(&"a".repeat(300));
        let span = remaining_span(&theme, &full);
        assert_eq!(span.content, " 0");
        assert_eq!(span.style.fg, Some(theme.error));
    }

    #[test]
    fn test_bar_heights() {
        assert_eq!(bottom_bar_height(BottomBarMode::Navigation), 1);
        assert!(bottom_bar_height(BottomBarMode::Chat) > bottom_bar_height(BottomBarMode::Ask));
    }
}
