use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::{input_window, remaining_span};
use crate::annotation::{truncate_text, OverlayPosition, TOOLBAR_GAP};
use crate::app::App;
use crate::ask::ASK_PLACEHOLDER;
use crate::overlay::{OverlayKind, ToolbarAction};

const ASK_PANEL_WIDTH: u16 = 52;
const ASK_PANEL_HEIGHT: u16 = 5;
const SEPARATOR: &str = "│";

/// Screen rect for a box of `width` x `height` anchored at `position`
/// (relative to `content`). The box sits above the selection with its bottom
/// edge on the gap row, flips below when it would leave `content`, and is
/// clamped to `frame`.
fn place(position: OverlayPosition, width: u16, height: u16, content: Rect, frame: Rect) -> Rect {
    let gap_row = content.y as i32 + position.top;
    let mut y = gap_row - height as i32 + 1;
    if y < content.y as i32 {
        let selection_row = gap_row + TOOLBAR_GAP;
        y = selection_row + 1;
    }
    let max_y = (frame.y + frame.height).saturating_sub(height) as i32;
    let y = y.clamp(frame.y as i32, max_y.max(frame.y as i32)) as u16;

    let centre = content.x as i32 + position.left;
    let max_x = (frame.x + frame.width).saturating_sub(width) as i32;
    let x = (centre - width as i32 / 2).clamp(frame.x as i32, max_x.max(frame.x as i32)) as u16;

    Rect { x, y, width: width.min(frame.width), height: height.min(frame.height) }
}

fn item_label(action: ToolbarAction) -> String {
    format!(" {} ", action.label())
}

fn toolbar_width() -> u16 {
    let items: usize = ToolbarAction::all().iter().map(|a| item_label(*a).width()).sum();
    (items + ToolbarAction::all().len() - 1 + 2) as u16
}

pub fn render_overlay(f: &mut Frame, app: &mut App) {
    let Some(visible) = app.overlay.visible() else {
        app.overlay.set_rendered_area(None);
        app.toolbar_hits.clear();
        return;
    };
    let frame = f.area();
    match visible.kind {
        OverlayKind::Toolbar => {
            let area = place(visible.position, toolbar_width(), 3, app.content_area, frame);
            render_toolbar(f, app, area);
            app.overlay.set_rendered_area(Some(area));
        }
        OverlayKind::Ask => {
            let width = ASK_PANEL_WIDTH.min(frame.width.saturating_sub(2));
            let area = place(visible.position, width, ASK_PANEL_HEIGHT, app.content_area, frame);
            app.toolbar_hits.clear();
            render_ask_panel(f, app, area);
            app.overlay.set_rendered_area(Some(area));
            app.overlay.set_ask_areas(vec![app.bottom_bar_area]);
        }
        OverlayKind::None => {}
    }
}

fn render_toolbar(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = &app.theme;
    f.render_widget(Clear, area);

    let selected = app.overlay.selected_action();
    let mut spans = Vec::new();
    let mut hits = Vec::new();
    let mut x = area.x + 1;
    for (idx, action) in ToolbarAction::all().iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled(SEPARATOR, Style::default().fg(theme.border)));
            x += 1;
        }
        let label = item_label(*action);
        let width = label.width() as u16;
        let style = if *action == selected {
            Style::default().fg(theme.foreground).bg(theme.selection).add_modifier(Modifier::BOLD)
        } else {
            match action {
                ToolbarAction::Note(note_type) => Style::default().fg(theme.note.accent(*note_type)),
                _ => Style::default().fg(theme.foreground),
            }
        };
        spans.push(Span::styled(label, style));
        hits.push((*action, Rect::new(x, area.y + 1, width, 1)));
        x += width;
    }

    let toolbar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border_focused))
            .style(Style::default().bg(theme.background_secondary)),
    );
    f.render_widget(toolbar, area);

    // Items cut off by a narrow frame cannot be clicked.
    let right = area.x + area.width.saturating_sub(1);
    app.toolbar_hits = hits.into_iter().filter(|(_, r)| r.x + r.width <= right).collect();
}

fn render_ask_panel(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(Span::styled(" Ask ", Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .style(Style::default().bg(theme.background_secondary));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < 3 {
        return;
    }

    let seed = app.bottom_bar.seed();
    let quote = truncate_text(seed, (inner.width as usize).saturating_sub(2).max(1));
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!("\u{201c}{quote}\u{201d}"),
            Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
        ))),
        Rect { height: 1, ..inner },
    );

    let input_row = Rect { y: inner.y + 1, height: 1, ..inner };
    if app.ask_input.is_empty() {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                truncate_text(ASK_PLACEHOLDER, inner.width as usize),
                Style::default().fg(theme.muted),
            ))),
            input_row,
        );
        f.set_cursor_position((input_row.x, input_row.y));
    } else {
        let (shown, col) = input_window(&app.ask_input, inner.width);
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(shown, Style::default().fg(theme.foreground)))),
            input_row,
        );
        f.set_cursor_position((input_row.x + col, input_row.y));
    }

    let hint = if app.ask_input.can_send() { "Enter send · Esc cancel" } else { "Two words to send · Esc cancel" };
    let counter = remaining_span(theme, &app.ask_input);
    let padding = (inner.width as usize).saturating_sub(hint.width() + counter.width());
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(hint, Style::default().fg(theme.muted)),
            Span::raw(" ".repeat(padding)),
            counter,
        ])),
        Rect { y: inner.y + 2, height: 1, ..inner },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONTENT: Rect = Rect { x: 0, y: 0, width: 80, height: 20 };
    const FRAME: Rect = Rect { x: 0, y: 0, width: 80, height: 24 };

    #[test]
    fn test_box_sits_above_selection() {
        // Selection on row 10, gap row 9.
        let area = place(OverlayPosition { top: 9, left: 40 }, 20, 3, CONTENT, FRAME);
        assert_eq!(area, Rect::new(30, 7, 20, 3));
    }

    #[test]
    fn test_box_flips_below_near_top() {
        let area = place(OverlayPosition { top: 0, left: 40 }, 20, 3, CONTENT, FRAME);
        assert_eq!(area.y, 2);
    }

    #[test]
    fn test_box_clamped_to_frame_edges() {
        let area = place(OverlayPosition { top: 9, left: 2 }, 20, 3, CONTENT, FRAME);
        assert_eq!(area.x, 0);
        let area = place(OverlayPosition { top: 9, left: 79 }, 20, 3, CONTENT, FRAME);
        assert_eq!(area.x, 60);
    }

    #[test]
    fn test_toolbar_fits_every_action() {
        let labels: usize = ToolbarAction::all().iter().map(|a| a.label().len() + 2).sum();
        assert!(toolbar_width() as usize > labels);
    }
}
