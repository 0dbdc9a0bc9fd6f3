use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::{input_window, remaining_span, wrap_text};
use crate::annotation::{truncate_text, Anchor, ChatMessage, Sender};
use crate::app::App;
use crate::ask::{AskTarget, ASK_PLACEHOLDER};
use crate::bottom_bar::BottomBarMode;
use crate::overlay::OverlayKind;
use crate::theme::Theme;

const SEED_CHARS: usize = 80;

pub fn render_bottom_bar(f: &mut Frame, app: &mut App, area: Rect) {
    app.bottom_bar_area = area;
    match app.bottom_bar.mode() {
        BottomBarMode::Navigation => render_navigation(f, app, area),
        BottomBarMode::Progress => render_progress(f, app, area),
        BottomBarMode::Ask => render_ask(f, app, area),
        BottomBarMode::Chat => render_chat(f, app, area),
    }
}

fn logo(theme: &Theme) -> Span<'static> {
    Span::styled(
        " ◆ Lectern ",
        Style::default().fg(theme.bar.background).bg(theme.primary).add_modifier(Modifier::BOLD),
    )
}

fn mode_span(theme: &Theme, mode: BottomBarMode) -> Span<'static> {
    Span::styled(format!(" {} ", mode.label()), Style::default().fg(theme.bar.background).bg(theme.bar.mode))
}

/// One status line with `left` and `right` pushed to opposite edges.
fn justified(theme: &Theme, left: Vec<Span<'static>>, right: Vec<Span<'static>>, width: u16) -> Paragraph<'static> {
    let left_width: usize = left.iter().map(|s| s.width()).sum();
    let right_width: usize = right.iter().map(|s| s.width()).sum();
    let padding = (width as usize).saturating_sub(left_width + right_width);

    let mut spans = left;
    spans.push(Span::raw(" ".repeat(padding)));
    spans.extend(right);
    Paragraph::new(Line::from(spans)).style(Style::default().fg(theme.bar.foreground).bg(theme.bar.background))
}

fn render_navigation(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let title = Span::styled(format!(" {} ", app.document.title), Style::default().fg(theme.bar.foreground));
    let left = vec![logo(theme), Span::raw(" "), mode_span(theme, BottomBarMode::Navigation), title];

    let mut right = Vec::new();
    if app.asks.any_pending() {
        right.push(Span::styled("answering... ", Style::default().fg(theme.info)));
    } else if app.worker.in_flight() > 0 {
        right.push(Span::styled(format!("{} notes loading ", app.worker.in_flight()), Style::default().fg(theme.info)));
    }
    right.push(Span::styled(" / ask  p progress ", Style::default().fg(theme.muted)));
    right.push(Span::styled(" ? for help ", Style::default().fg(theme.foreground).bg(theme.border)));

    f.render_widget(justified(theme, left, right, area.width), area);
}

fn render_progress(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let progress = app.progress();
    let separator = Span::styled(" │ ", Style::default().fg(theme.muted));

    let left = vec![logo(theme), Span::raw(" "), mode_span(theme, BottomBarMode::Progress)];
    let right = vec![
        Span::styled(
            format!("{} words ~{}min", progress.words, progress.minutes),
            Style::default().fg(theme.success),
        ),
        separator.clone(),
        Span::styled(format!("{} annotations", progress.anchors), Style::default().fg(theme.info)),
        separator,
        Span::styled(
            format!(" {}% read ", progress.percent_read),
            Style::default().fg(theme.bar.background).bg(theme.secondary),
        ),
    ];

    f.render_widget(justified(theme, left, right, area.width), area);
}

fn bar_block(theme: &Theme, title: String) -> Block<'static> {
    Block::default()
        .title(Span::styled(title, Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .style(Style::default().bg(theme.background_secondary))
}

/// Draw the input line at `area` and park the terminal cursor in it. The
/// remaining character count sits at the right edge.
fn render_input(f: &mut Frame, app: &App, area: Rect, show_cursor: bool) {
    let theme = &app.theme;
    let counter = remaining_span(theme, &app.ask_input);
    let counter_width = (counter.width() as u16).min(area.width);
    f.render_widget(
        Paragraph::new(Line::from(counter)),
        Rect { x: area.x + area.width - counter_width, width: counter_width, ..area },
    );
    let area = Rect { width: area.width - counter_width, ..area };

    if app.ask_input.is_empty() {
        let hint = Span::styled(ASK_PLACEHOLDER, Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC));
        f.render_widget(Paragraph::new(Line::from(vec![Span::styled("› ", Style::default().fg(theme.primary)), hint])), area);
        if show_cursor {
            f.set_cursor_position((area.x + 2, area.y));
        }
        return;
    }
    let (shown, col) = input_window(&app.ask_input, area.width.saturating_sub(2));
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("› ", Style::default().fg(theme.primary)),
            Span::styled(shown, Style::default().fg(theme.foreground)),
        ])),
        area,
    );
    if show_cursor {
        f.set_cursor_position((area.x + 2 + col, area.y));
    }
}

fn render_ask(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let block = bar_block(theme, " Ask ".to_string());
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let seed = app.bottom_bar.seed();
    let context = if seed.is_empty() {
        Span::styled("Ask anything. Enter to send, Esc to close.", Style::default().fg(theme.muted))
    } else {
        Span::styled(
            format!("About \u{201c}{}\u{201d}", truncate_text(seed, SEED_CHARS)),
            Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
        )
    };
    f.render_widget(Paragraph::new(Line::from(context)), Rect { height: 1, ..inner });

    if inner.height > 1 {
        // The floating ask panel owns the cursor while it is open.
        let show_cursor = app.overlay.kind() != OverlayKind::Ask;
        render_input(f, app, Rect { y: inner.y + inner.height - 1, height: 1, ..inner }, show_cursor);
    }
}

fn message_lines(theme: &Theme, messages: &[ChatMessage], width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in messages {
        let (who, style) = match message.sender {
            Sender::User => ("You", Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)),
            Sender::Ai => ("Lectern", Style::default().fg(theme.success).add_modifier(Modifier::BOLD)),
        };
        lines.push(Line::from(Span::styled(format!("{who}:"), style)));
        for l in wrap_text(&message.message, width.saturating_sub(2).max(1)) {
            lines.push(Line::from(Span::styled(format!("  {l}"), Style::default().fg(theme.foreground))));
        }
    }
    lines
}

fn render_chat(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let anchor = app.chat_anchor();
    let (title, messages, target) = match anchor.and_then(|key| app.document.anchor(key).map(|a| (key, a))) {
        Some((key, Anchor::Ask(ask))) => (
            format!(" Chat: \u{201c}{}\u{201d} ", truncate_text(&ask.context, 40)),
            ask.chat_history.as_slice(),
            AskTarget::Anchor(key),
        ),
        _ => (" Chat ".to_string(), app.asks.free_history(), AskTarget::Free),
    };

    let block = bar_block(theme, title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < 2 {
        return;
    }

    let mut lines = message_lines(theme, messages, inner.width as usize);
    if app.asks.is_pending(target) {
        lines.push(Line::from(Span::styled("Thinking...", Style::default().fg(theme.muted))));
    }
    if let Some(reason) = app.asks.error_for(target) {
        lines.push(Line::from(Span::styled(
            format!("Couldn't get an answer: {reason}"),
            Style::default().fg(theme.error),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No messages yet.",
            Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    // Newest messages stay in view.
    let history_rows = inner.height - 1;
    let skip = lines.len().saturating_sub(history_rows as usize);
    let visible: Vec<Line<'static>> = lines.into_iter().skip(skip).collect();
    f.render_widget(Paragraph::new(visible), Rect { height: history_rows, ..inner });

    render_input(f, app, Rect { y: inner.y + history_rows, height: 1, ..inner }, true);
}
