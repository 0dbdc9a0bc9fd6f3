use std::time::Instant;

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::note_card;
use crate::annotation::{
    render_segments, Anchor, AnchorId, AnchorRef, HighlightState, LayoutRun, NoteType, ParagraphLayout, Segment,
    Selection,
};
use crate::app::{App, CardArea};
use crate::document::Paragraph as DocParagraph;
use crate::theme::Theme;

/// Badge drawn after a highlight that carries a conversation.
pub const BADGE: &str = " 💬";
const SIDE_PADDING: u16 = 2;

/// One cell-producing unit of a paragraph flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowItem {
    Char { offset: usize, ch: char },
    Badge,
}

impl FlowItem {
    fn width(&self) -> u16 {
        match self {
            FlowItem::Char { ch, .. } => ch.width().unwrap_or(0) as u16,
            FlowItem::Badge => BADGE.width() as u16,
        }
    }

    fn is_space(&self) -> bool {
        matches!(self, FlowItem::Char { ch, .. } if ch.is_whitespace())
    }

    fn is_newline(&self) -> bool {
        matches!(self, FlowItem::Char { ch: '\n', .. })
    }
}

/// Greedy word wrap into lines no wider than `width`. Trailing spaces may
/// hang past the edge; a newline ends its line and stays on it so every
/// offset keeps a run.
pub fn wrap_flow(items: &[FlowItem], width: u16) -> Vec<Vec<FlowItem>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line: Vec<FlowItem> = Vec::new();
    let mut used = 0u16;

    for item in items {
        let w = item.width();
        if used + w > width && !line.is_empty() && !item.is_space() {
            let keep = line.iter().rposition(FlowItem::is_space).map(|p| p + 1).unwrap_or(line.len());
            let rest = line.split_off(keep);
            lines.push(std::mem::replace(&mut line, rest));
            used = line.iter().map(FlowItem::width).sum();
        }
        line.push(*item);
        used += w;
        if item.is_newline() {
            lines.push(std::mem::take(&mut line));
            used = 0;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Word-wrap plain text for cards and the bottom bar.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let items: Vec<FlowItem> = text.chars().enumerate().map(|(offset, ch)| FlowItem::Char { offset, ch }).collect();
    let width = width.min(u16::MAX as usize) as u16;
    let mut lines: Vec<String> = wrap_flow(&items, width)
        .iter()
        .map(|line| {
            let s: String = line
                .iter()
                .filter_map(|i| match i {
                    FlowItem::Char { ch, .. } if *ch != '\n' => Some(*ch),
                    _ => None,
                })
                .collect();
            s.trim_end().to_string()
        })
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Split one wrapped line into layout runs starting at column `x`.
pub fn line_runs(line: &[FlowItem], x: u16, y: u16) -> Vec<LayoutRun> {
    let mut runs = Vec::new();
    let mut text = String::new();
    let mut run_x = x;
    let mut col = x;

    for item in line {
        match item {
            FlowItem::Char { ch, .. } => text.push(*ch),
            FlowItem::Badge => {
                if !text.is_empty() {
                    runs.push(LayoutRun::source(std::mem::take(&mut text), run_x, y));
                }
                runs.push(LayoutRun::decoration(BADGE, col, y));
                run_x = col + item.width();
            }
        }
        col += item.width();
    }
    if !text.is_empty() {
        runs.push(LayoutRun::source(text, run_x, y));
    }
    runs
}

/// A paragraph cut at its note blocks: text flows with cards in between.
enum Piece {
    Flow(Vec<FlowItem>),
    Card {
        anchor: AnchorId,
        note_type: NoteType,
        highlighted: String,
        removing: bool,
    },
}

fn pieces(paragraph: &DocParagraph, segments: Vec<Segment>) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut flow = Vec::new();
    let push_chars = |flow: &mut Vec<FlowItem>, range: Selection, text: &str| {
        flow.extend(text.chars().enumerate().map(|(i, ch)| FlowItem::Char { offset: range.start + i, ch }));
    };

    for segment in segments {
        match segment {
            Segment::Text { range, text } => push_chars(&mut flow, range, &text),
            Segment::Highlight { anchor_id, range, text, .. } => {
                push_chars(&mut flow, range, &text);
                let talked = paragraph.store.anchor(anchor_id).map(Anchor::has_conversation).unwrap_or(false);
                if talked {
                    flow.push(FlowItem::Badge);
                }
            }
            Segment::NoteBlock { anchor_id, note_type, highlighted, removing, .. } => {
                if !flow.is_empty() {
                    pieces.push(Piece::Flow(std::mem::take(&mut flow)));
                }
                pieces.push(Piece::Card { anchor: anchor_id, note_type, highlighted, removing });
            }
        }
    }
    if !flow.is_empty() {
        pieces.push(Piece::Flow(flow));
    }
    pieces
}

/// Per-offset highlight marks: state and whether the anchor is fading out.
fn highlight_marks(paragraph: &DocParagraph, segments: &[Segment]) -> Vec<Option<(HighlightState, bool)>> {
    let mut marks = vec![None; paragraph.char_len()];
    for segment in segments {
        if let Segment::Highlight { anchor_id, range, state, .. } = segment {
            let removing = paragraph.store.is_removing(*anchor_id);
            for mark in marks.iter_mut().take(range.end).skip(range.start) {
                *mark = Some((*state, removing));
            }
        }
    }
    marks
}

fn char_style(theme: &Theme, mark: Option<(HighlightState, bool)>, selected: bool) -> Style {
    let mut style = Style::default().fg(theme.foreground);
    if let Some((state, removing)) = mark {
        let bg = match state {
            HighlightState::Active => theme.highlight.active,
            HighlightState::Conversation => theme.highlight.conversation,
            HighlightState::Plain => theme.highlight.plain,
        };
        style = style.fg(theme.highlight.text).bg(bg);
        if state == HighlightState::Active {
            style = style.add_modifier(Modifier::BOLD);
        }
        if removing {
            style = style.add_modifier(Modifier::DIM);
        }
    }
    if selected {
        style = style.bg(theme.selection);
    }
    style
}

fn styled_line<'a>(
    theme: &Theme,
    line: &[FlowItem],
    marks: &[Option<(HighlightState, bool)>],
    selection: Option<Selection>,
) -> Line<'a> {
    let mut spans: Vec<Span<'a>> = Vec::new();
    let mut buf = String::new();
    let mut current: Option<Style> = None;

    for item in line {
        let (text, style) = match item {
            FlowItem::Char { ch: '\n', .. } => continue,
            FlowItem::Char { offset, ch } => {
                let selected = selection.map(|s| s.start <= *offset && *offset < s.end).unwrap_or(false);
                let mark = marks.get(*offset).copied().flatten();
                (ch.to_string(), char_style(theme, mark, selected))
            }
            FlowItem::Badge => (BADGE.to_string(), Style::default().fg(theme.info)),
        };
        if current != Some(style) {
            if let Some(prev) = current {
                spans.push(Span::styled(std::mem::take(&mut buf), prev));
            }
            current = Some(style);
        }
        buf.push_str(&text);
    }
    if let Some(style) = current {
        spans.push(Span::styled(buf, style));
    }
    Line::from(spans)
}

struct Placed {
    layout: ParagraphLayout,
    cards: Vec<CardArea>,
    next_y: u16,
}

/// Lay out and draw one paragraph from row `y`. Rows past `bottom` still
/// get runs so offsets stay paragraph-relative, but are not drawn.
fn render_paragraph(
    f: &mut Frame,
    app: &App,
    paragraph: &DocParagraph,
    area: Rect,
    y: u16,
    bottom: u16,
    now: Instant,
) -> Placed {
    let theme = &app.theme;
    let segments = render_segments(&paragraph.text, &paragraph.store.views(), paragraph.store.active());
    let marks = highlight_marks(paragraph, &segments);
    let selection = app.selection_range(paragraph.id);

    let mut layout = ParagraphLayout::new(paragraph.id, Rect::new(area.x, y, area.width, 0));
    let mut cards = Vec::new();
    let mut row = y;

    for piece in pieces(paragraph, segments) {
        match piece {
            Piece::Flow(items) => {
                for line in wrap_flow(&items, area.width) {
                    layout.runs.extend(line_runs(&line, area.x, row));
                    if row < bottom {
                        let text = styled_line(theme, &line, &marks, selection);
                        f.render_widget(Paragraph::new(text), Rect::new(area.x, row, area.width, 1));
                    }
                    row = row.saturating_add(1);
                }
            }
            Piece::Card { anchor, note_type, highlighted, removing } => {
                let key = AnchorRef { paragraph: paragraph.id, anchor };
                let view = app.registry.get(key).and_then(|lc| lc.view(now));
                let card = note_card::build_note_card(theme, note_type, &highlighted, view, removing, area.width);
                let height = card.height();
                if row < bottom {
                    let visible = Rect::new(area.x, row, area.width, height.min(bottom - row));
                    note_card::render_note_card(f, theme, &card, visible);
                    cards.push(note_card::card_area(key, &card, visible));
                }
                row = row.saturating_add(height);
            }
        }
    }

    layout.area.height = row.saturating_sub(y);
    Placed { layout, cards, next_y: row }
}

pub fn render_content(f: &mut Frame, app: &mut App, area: Rect) {
    let now = Instant::now();
    let theme = &app.theme;

    let block = Block::default()
        .title(format!(" {} ", app.document.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.background));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text_area = Rect {
        x: inner.x + SIDE_PADDING.min(inner.width / 2),
        width: inner.width.saturating_sub(SIDE_PADDING * 2),
        ..inner
    };
    let bottom = inner.y + inner.height;

    let mut layouts = Vec::new();
    let mut card_areas = Vec::new();
    let mut visible = 0;
    let mut y = inner.y;

    for paragraph in app.document.paragraphs().iter().skip(app.scroll) {
        if y >= bottom {
            break;
        }
        visible += 1;
        let placed = render_paragraph(f, app, paragraph, text_area, y, bottom, now);
        layouts.push(placed.layout);
        card_areas.extend(placed.cards);
        // Blank row between paragraphs
        y = placed.next_y.saturating_add(1);
    }

    app.content_area = inner;
    app.layouts = layouts;
    app.card_areas = card_areas;
    app.visible_paragraphs = visible;
}
