//! Selection resolution
//!
//! The content pane lays each paragraph out as a list of runs, one per wrapped
//! line fragment. Source runs carry paragraph text; decoration runs (badges,
//! markers) are drawn inline but never count towards character offsets.

use ratatui::layout::Rect;
use unicode_width::UnicodeWidthChar;

use super::{ParagraphId, Selection};

/// Rows left between the top of a selection and the overlay anchored above it.
pub const TOOLBAR_GAP: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Source,
    Decoration,
}

/// One on-screen fragment of a rendered paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRun {
    pub kind: RunKind,
    pub text: String,
    /// Screen column of the first character.
    pub x: u16,
    /// Screen row.
    pub y: u16,
}

impl LayoutRun {
    pub fn source(text: impl Into<String>, x: u16, y: u16) -> Self {
        Self { kind: RunKind::Source, text: text.into(), x, y }
    }

    pub fn decoration(text: impl Into<String>, x: u16, y: u16) -> Self {
        Self { kind: RunKind::Decoration, text: text.into(), x, y }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Display width of the first `chars` characters.
    pub fn width_of_prefix(&self, chars: usize) -> u16 {
        self.text
            .chars()
            .take(chars)
            .map(|c| c.width().unwrap_or(0) as u16)
            .sum()
    }

    /// Character offset under screen column `col`, clamped to the run.
    pub fn offset_at_col(&self, col: u16) -> usize {
        if col <= self.x {
            return 0;
        }
        let target = col - self.x;
        let mut used = 0u16;
        for (i, c) in self.text.chars().enumerate() {
            let w = c.width().unwrap_or(0) as u16;
            if used + w > target {
                return i;
            }
            used += w;
        }
        self.char_count()
    }
}

/// The rendered geometry of exactly one paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphLayout {
    pub paragraph: ParagraphId,
    /// Screen area the paragraph text occupies (note cards excluded).
    pub area: Rect,
    pub runs: Vec<LayoutRun>,
}

/// A selection endpoint: a character offset inside one layout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPoint {
    pub paragraph: ParagraphId,
    pub run: usize,
    pub offset: usize,
}

/// The reader's in-progress selection, in drag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSelection {
    pub anchor: TextPoint,
    pub focus: TextPoint,
}

impl LiveSelection {
    pub fn collapsed(point: TextPoint) -> Self {
        Self { anchor: point, focus: point }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn extend_to(&mut self, point: TextPoint) {
        self.focus = point;
    }

    /// Rebuild a selection of `range` against a fresh layout, e.g. after the
    /// pane was re-wrapped or scrolled.
    pub fn from_range(layout: &ParagraphLayout, range: Selection) -> Option<Self> {
        Some(Self {
            anchor: layout.point_at_offset(range.start)?,
            focus: layout.point_at_offset(range.end)?,
        })
    }
}

/// Overlay anchor point relative to a container's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayPosition {
    pub top: i32,
    pub left: i32,
}

impl ParagraphLayout {
    pub fn new(paragraph: ParagraphId, area: Rect) -> Self {
        Self { paragraph, area, runs: Vec::new() }
    }

    pub fn contains(&self, point: &TextPoint) -> bool {
        point.paragraph == self.paragraph && point.run < self.runs.len()
    }

    /// Map a screen cell to a point on the nearest source run of that row.
    pub fn hit_test(&self, col: u16, row: u16) -> Option<TextPoint> {
        let on_row = || {
            self.runs
                .iter()
                .enumerate()
                .filter(move |(_, r)| r.y == row && r.kind == RunKind::Source)
        };
        let idx = on_row()
            .filter(|(_, r)| r.x <= col)
            .max_by_key(|(_, r)| r.x)
            .or_else(|| on_row().min_by_key(|(_, r)| r.x))
            .map(|(idx, _)| idx)?;
        Some(TextPoint {
            paragraph: self.paragraph,
            run: idx,
            offset: self.runs[idx].offset_at_col(col),
        })
    }

    /// Paragraph-relative character offset of `point`.
    ///
    /// Counts every source character preceding the point; decoration runs
    /// contribute nothing and a point inside one snaps to its start.
    pub fn offset_of(&self, point: &TextPoint) -> usize {
        let before: usize = self
            .runs
            .iter()
            .take(point.run)
            .filter(|r| r.kind == RunKind::Source)
            .map(|r| r.char_count())
            .sum();
        match self.runs.get(point.run) {
            Some(run) if run.kind == RunKind::Source => before + point.offset.min(run.char_count()),
            _ => before,
        }
    }

    /// Point at paragraph offset `offset`, preferring the start of a run
    /// over the end of the previous one.
    pub fn point_at_offset(&self, offset: usize) -> Option<TextPoint> {
        let mut consumed = 0usize;
        let mut last_source = None;
        for (idx, run) in self.runs.iter().enumerate() {
            if run.kind != RunKind::Source {
                continue;
            }
            let count = run.char_count();
            if offset < consumed + count {
                return Some(TextPoint { paragraph: self.paragraph, run: idx, offset: offset - consumed });
            }
            consumed += count;
            last_source = Some((idx, count));
        }
        last_source.map(|(idx, count)| TextPoint { paragraph: self.paragraph, run: idx, offset: count })
    }

    /// Bounding rectangle, in screen cells, of the characters in `range`.
    pub fn selection_rect(&self, range: Selection) -> Option<Rect> {
        let mut consumed = 0usize;
        let mut bounds: Option<(u16, u16, u16, u16)> = None;

        for run in self.runs.iter().filter(|r| r.kind == RunKind::Source) {
            let count = run.char_count();
            let run_start = consumed;
            let run_end = consumed + count;
            consumed = run_end;

            let from = range.start.max(run_start);
            let to = range.end.min(run_end);
            if from >= to {
                continue;
            }
            let x0 = run.x + run.width_of_prefix(from - run_start);
            let x1 = run.x + run.width_of_prefix(to - run_start);
            let (y0, y1) = (run.y, run.y + 1);
            bounds = Some(match bounds {
                None => (x0, y0, x1, y1),
                Some((bx0, by0, bx1, by1)) => (bx0.min(x0), by0.min(y0), bx1.max(x1), by1.max(y1)),
            });
        }

        bounds.map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Resolve a live selection into offsets of the paragraph laid out in `layout`.
///
/// Returns `None` for no selection, a collapsed one, or one with an endpoint
/// outside the container.
pub fn resolve_offsets(
    selection: Option<&LiveSelection>,
    layout: &ParagraphLayout,
    text_len: usize,
) -> Option<Selection> {
    let selection = selection?;
    if selection.is_collapsed() {
        return None;
    }
    if !layout.contains(&selection.anchor) || !layout.contains(&selection.focus) {
        return None;
    }

    let a = layout.offset_of(&selection.anchor);
    let b = layout.offset_of(&selection.focus);
    let range = Selection::clamped(a, b, text_len);
    if range.is_empty() {
        None
    } else {
        Some(range)
    }
}

/// Where an overlay should anchor for the current selection: the horizontal
/// centre of the selection's bounding box, `TOOLBAR_GAP` rows above its top,
/// relative to `container`.
pub fn selection_anchor_point(
    selection: Option<&LiveSelection>,
    layout: &ParagraphLayout,
    text_len: usize,
    container: Rect,
) -> Option<OverlayPosition> {
    let range = resolve_offsets(selection, layout, text_len)?;
    let rect = layout.selection_rect(range)?;
    Some(OverlayPosition {
        top: rect.y as i32 - container.y as i32 - TOOLBAR_GAP,
        left: rect.x as i32 - container.x as i32 + rect.width as i32 / 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const P: ParagraphId = ParagraphId(0);

    // "AWS Lex helps you build chatbots." wrapped at 18 columns, with a
    // decoration badge after the first line.
    fn layout() -> ParagraphLayout {
        let mut layout = ParagraphLayout::new(P, Rect::new(2, 5, 18, 2));
        layout.runs.push(LayoutRun::source("AWS Lex helps you ", 2, 5));
        layout.runs.push(LayoutRun::decoration("[*]", 20, 5));
        layout.runs.push(LayoutRun::source("build chatbots.", 2, 6));
        layout
    }

    fn point(run: usize, offset: usize) -> TextPoint {
        TextPoint { paragraph: P, run, offset }
    }

    #[test]
    fn test_no_selection() {
        assert_eq!(resolve_offsets(None, &layout(), 33), None);
    }

    #[test]
    fn test_collapsed_selection() {
        let sel = LiveSelection::collapsed(point(0, 4));
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), None);
    }

    #[test]
    fn test_forward_selection() {
        let sel = LiveSelection { anchor: point(0, 4), focus: point(0, 7) };
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), Some(Selection { start: 4, end: 7 }));
    }

    #[test]
    fn test_backward_drag_is_normalized() {
        let sel = LiveSelection { anchor: point(0, 7), focus: point(0, 4) };
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), Some(Selection { start: 4, end: 7 }));
    }

    #[test]
    fn test_decoration_runs_do_not_count() {
        // "build" starts at paragraph offset 18 even though a badge precedes it.
        let sel = LiveSelection { anchor: point(2, 0), focus: point(2, 5) };
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), Some(Selection { start: 18, end: 23 }));
    }

    #[test]
    fn test_endpoint_in_other_paragraph() {
        let mut sel = LiveSelection { anchor: point(0, 0), focus: point(0, 3) };
        sel.focus.paragraph = ParagraphId(1);
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), None);
    }

    #[test]
    fn test_endpoint_outside_runs() {
        let sel = LiveSelection { anchor: point(0, 0), focus: point(9, 3) };
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), None);
    }

    #[test]
    fn test_offsets_clamped_to_text_length() {
        let sel = LiveSelection { anchor: point(2, 0), focus: point(2, 50) };
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 20), Some(Selection { start: 18, end: 20 }));
    }

    #[test]
    fn test_hit_test() {
        let layout = layout();
        assert_eq!(layout.hit_test(6, 5), Some(point(0, 4)));
        assert_eq!(layout.hit_test(0, 6), Some(point(2, 0)));
        // Past the end of a row snaps to the run end.
        assert_eq!(layout.hit_test(40, 6), Some(point(2, 15)));
        assert_eq!(layout.hit_test(3, 9), None);
    }

    #[test]
    fn test_point_at_offset() {
        let layout = layout();
        assert_eq!(layout.point_at_offset(18), Some(point(2, 0)));
        assert_eq!(layout.point_at_offset(4), Some(point(0, 4)));
        assert_eq!(layout.point_at_offset(33), Some(point(2, 15)));
    }

    #[test]
    fn test_selection_rect_single_line() {
        let rect = layout().selection_rect(Selection { start: 4, end: 7 });
        assert_eq!(rect, Some(Rect::new(6, 5, 3, 1)));
    }

    #[test]
    fn test_selection_rect_spans_lines() {
        let rect = layout().selection_rect(Selection { start: 14, end: 23 });
        assert_eq!(rect, Some(Rect::new(2, 5, 18, 2)));
    }

    #[test]
    fn test_anchor_point_sits_above_selection() {
        let layout = layout();
        let sel = LiveSelection { anchor: point(0, 4), focus: point(0, 7) };
        let container = Rect::new(0, 2, 40, 20);
        let pos = selection_anchor_point(Some(&sel), &layout, 33, container);
        assert_eq!(pos, Some(OverlayPosition { top: 5 - 2 - TOOLBAR_GAP, left: 6 + 1 }));
    }

    #[test]
    fn test_from_range_survives_rewrap() {
        let mut narrow = ParagraphLayout::new(P, Rect::new(2, 5, 10, 4));
        narrow.runs.push(LayoutRun::source("AWS Lex ", 2, 5));
        narrow.runs.push(LayoutRun::source("helps you ", 2, 6));
        narrow.runs.push(LayoutRun::source("build ", 2, 7));
        narrow.runs.push(LayoutRun::source("chatbots.", 2, 8));

        let range = Selection { start: 8, end: 23 };
        let sel = LiveSelection::from_range(&narrow, range).unwrap();
        assert_eq!(resolve_offsets(Some(&sel), &narrow, 33), Some(range));

        let sel = LiveSelection::from_range(&layout(), range).unwrap();
        assert_eq!(resolve_offsets(Some(&sel), &layout(), 33), Some(range));
    }

    #[test]
    fn test_wide_chars_hit_test() {
        let mut layout = ParagraphLayout::new(P, Rect::new(0, 0, 10, 1));
        layout.runs.push(LayoutRun::source("a中b", 0, 0));
        assert_eq!(layout.hit_test(2, 0), Some(point(0, 1)));
        assert_eq!(layout.hit_test(3, 0), Some(point(0, 2)));
        assert_eq!(layout.runs[0].width_of_prefix(3), 4);
    }
}
