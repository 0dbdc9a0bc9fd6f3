use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::wrap_text;
use crate::annotation::{truncate_text, AnchorRef, NoteType};
use crate::app::CardArea;
use crate::note::prompt::{detect_services, revealed_blocks, ContentBlock};
use crate::note::NoteView;
use crate::theme::Theme;

const QUOTE_CHARS: usize = 120;
const CLOSE_LABEL: &str = " ✕ ";

/// A note card ready to draw: pre-wrapped lines plus the rows that react to
/// clicks.
#[derive(Debug, Clone)]
pub struct NoteCard {
    pub title: String,
    pub accent: Color,
    pub lines: Vec<Line<'static>>,
    /// Body line holding the retry affordance.
    pub retry_line: Option<usize>,
    pub removing: bool,
}

impl NoteCard {
    /// Rows including the border.
    pub fn height(&self) -> u16 {
        self.lines.len() as u16 + 2
    }
}

const THINKING: &str = "Thinking...";

pub fn build_note_card(
    theme: &Theme,
    note_type: NoteType,
    highlighted: &str,
    view: Option<NoteView<'_>>,
    removing: bool,
    width: u16,
) -> NoteCard {
    let body_width = width.saturating_sub(4).max(8) as usize;
    let muted = Style::default().fg(theme.muted);
    let text = Style::default().fg(theme.foreground);
    let accent = theme.note.accent(note_type);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut retry_line = None;

    lines.push(Line::from(Span::styled("You highlighted:", muted)));
    let quote = format!("\u{201c}{}\u{201d}", truncate_text(highlighted, QUOTE_CHARS));
    for l in wrap_text(&quote, body_width) {
        lines.push(Line::from(Span::styled(l, muted.add_modifier(Modifier::ITALIC))));
    }
    lines.push(Line::from(""));

    let title = if removing {
        lines.push(Line::from(Span::styled("Removing...", muted)));
        note_type.label().to_string()
    } else {
        match view {
            None => {
                lines.push(Line::from(Span::styled(THINKING, muted)));
                note_type.label().to_string()
            }
            Some(NoteView::Loading { header, lines: typed, thinking }) => {
                for typed_line in typed {
                    for l in wrap_text(typed_line, body_width) {
                        lines.push(Line::from(Span::styled(l, text)));
                    }
                }
                if thinking {
                    lines.push(Line::from(Span::styled(THINKING, muted)));
                }
                header.to_string()
            }
            Some(NoteView::Error { message }) => {
                lines.push(Line::from(Span::styled(message.to_string(), Style::default().fg(theme.error))));
                retry_line = Some(lines.len());
                lines.push(Line::from(Span::styled(
                    "↻ Retry (r)",
                    Style::default().fg(theme.primary).add_modifier(Modifier::UNDERLINED),
                )));
                "Note unavailable".to_string()
            }
            Some(NoteView::Ready { banner, bullets, content, revealing }) => {
                if content.trim().is_empty() {
                    lines.push(Line::from(Span::styled(
                        "Nothing here yet.",
                        muted.add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    // The reveal types into the same blocks the finished card shows.
                    for (idx, block) in revealed_blocks(content, &bullets).into_iter().enumerate() {
                        if idx > 0 {
                            lines.push(Line::from(""));
                        }
                        match block {
                            ContentBlock::Paragraph(p) => {
                                for l in wrap_text(&p, body_width) {
                                    lines.push(Line::from(Span::styled(l, text)));
                                }
                            }
                            ContentBlock::List(items) => {
                                push_bullets(&mut lines, items.iter().map(String::as_str), body_width, text, accent);
                            }
                        }
                    }
                    let services = detect_services(&format!("{highlighted} {content}"));
                    if !revealing && !services.is_empty() {
                        lines.push(Line::from(""));
                        lines.push(Line::from(vec![
                            Span::styled("Related: ", muted),
                            Span::styled(services.join(" · "), Style::default().fg(theme.info)),
                        ]));
                    }
                }
                banner.to_string()
            }
        }
    };

    NoteCard { title, accent, lines, retry_line, removing }
}

fn push_bullets<'a>(
    lines: &mut Vec<Line<'static>>,
    items: impl Iterator<Item = &'a str>,
    width: usize,
    text: Style,
    accent: Color,
) {
    for item in items {
        for (i, l) in wrap_text(item, width.saturating_sub(2).max(1)).into_iter().enumerate() {
            let marker = if i == 0 { "• " } else { "  " };
            lines.push(Line::from(vec![
                Span::styled(marker, Style::default().fg(accent)),
                Span::styled(l, text),
            ]));
        }
    }
}

pub fn render_note_card(f: &mut Frame, theme: &Theme, card: &NoteCard, area: Rect) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    f.render_widget(Clear, area);

    let mut border = Style::default().fg(card.accent);
    let mut body = Style::default().bg(theme.note.background);
    if card.removing {
        border = Style::default().fg(theme.note.border).add_modifier(Modifier::DIM);
        body = body.add_modifier(Modifier::DIM);
    }

    let block = Block::default()
        .title(Line::from(Span::styled(
            format!(" ✦ {} ", card.title),
            border.add_modifier(Modifier::BOLD),
        )))
        .title(Line::from(Span::styled(CLOSE_LABEL, Style::default().fg(theme.muted))).right_aligned())
        .borders(Borders::ALL)
        .border_style(border)
        .style(body);

    let paragraph = Paragraph::new(card.lines.clone()).block(block);
    f.render_widget(paragraph, area);
}

/// Click targets of a card drawn in `area`.
pub fn card_area(key: AnchorRef, card: &NoteCard, area: Rect) -> CardArea {
    let close_width = CLOSE_LABEL.chars().count() as u16;
    let close = Rect::new(
        (area.x + area.width).saturating_sub(close_width + 1),
        area.y,
        close_width,
        1,
    );
    let retry = card.retry_line.and_then(|line| {
        let row = area.y + 1 + line as u16;
        (row + 1 < area.y + area.height).then(|| Rect::new(area.x + 1, row, area.width.saturating_sub(2), 1))
    });
    CardArea { key, area, close, retry }
}
