//! Floating overlays
//!
//! At most one overlay is open at a time: the selection toolbar or the ask
//! panel. Both anchor to the live selection and follow it when the content
//! pane scrolls or re-wraps.

use crossterm::event::KeyCode;
use ratatui::layout::Rect;
use tracing::debug;

use crate::annotation::{
    resolve_offsets, selection_anchor_point, LiveSelection, NoteType, OverlayPosition, ParagraphId,
    ParagraphLayout, Selection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayKind {
    #[default]
    None,
    Toolbar,
    Ask,
}

/// Entries of the selection toolbar, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    Ask,
    Highlight,
    Note(NoteType),
}

impl ToolbarAction {
    pub fn all() -> &'static [ToolbarAction] {
        &[
            ToolbarAction::Ask,
            ToolbarAction::Highlight,
            ToolbarAction::Note(NoteType::Explain),
            ToolbarAction::Note(NoteType::Example),
            ToolbarAction::Note(NoteType::Simplify),
            ToolbarAction::Note(NoteType::Blank),
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolbarAction::Ask => "Ask",
            ToolbarAction::Highlight => "Highlight",
            ToolbarAction::Note(note_type) => note_type.label(),
        }
    }

    pub fn hotkey(&self) -> char {
        match self {
            ToolbarAction::Ask => 'a',
            ToolbarAction::Highlight => 'h',
            ToolbarAction::Note(NoteType::Explain) => 'e',
            ToolbarAction::Note(NoteType::Example) => 'x',
            ToolbarAction::Note(NoteType::Simplify) => 's',
            ToolbarAction::Note(NoteType::Blank) => 'n',
        }
    }

    pub fn from_hotkey(c: char) -> Option<ToolbarAction> {
        Self::all().iter().copied().find(|a| a.hotkey() == c)
    }
}

/// An overlay that should be drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleOverlay {
    pub kind: OverlayKind,
    pub position: OverlayPosition,
    pub container: ParagraphId,
}

#[derive(Debug, Default)]
pub struct OverlayCoordinator {
    kind: OverlayKind,
    position: Option<OverlayPosition>,
    container: Option<ParagraphId>,
    /// Swallows the pointer-down that opened the ask panel.
    skip_next_dismiss: bool,
    /// Screen area the overlay occupied in the last frame.
    rendered_area: Option<Rect>,
    /// Areas that belong to the ask UI and never dismiss it.
    ask_areas: Vec<Rect>,
    selected: usize,
}

fn contains(rect: &Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

impl OverlayCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    pub fn container(&self) -> Option<ParagraphId> {
        self.container
    }

    /// Open `kind`, replacing whatever was open.
    pub fn open(&mut self, kind: OverlayKind, position: OverlayPosition, container: ParagraphId) {
        debug!(?kind, ?position, paragraph = container.0, "overlay open");
        self.kind = kind;
        self.position = Some(position);
        self.container = Some(container);
        self.selected = 0;
        self.rendered_area = None;
    }

    pub fn close(&mut self) {
        if self.kind != OverlayKind::None {
            debug!(kind = ?self.kind, "overlay close");
        }
        self.kind = OverlayKind::None;
        self.position = None;
        self.container = None;
        self.skip_next_dismiss = false;
        self.rendered_area = None;
        self.ask_areas.clear();
    }

    /// Swap the toolbar for the ask panel at the same spot. The click that
    /// triggered this must not dismiss the panel it just opened.
    pub fn open_ask_from_toolbar(&mut self) {
        if let (Some(position), Some(container)) = (self.position, self.container) {
            self.open(OverlayKind::Ask, position, container);
            self.skip_next_dismiss = true;
        }
    }

    /// Drop the one-shot guard when the swap came from the keyboard.
    pub fn disarm_dismiss_guard(&mut self) {
        self.skip_next_dismiss = false;
    }

    /// A drag ended. Opens the toolbar when the selection resolves inside
    /// `layout`'s paragraph and returns the resolved range; otherwise leaves
    /// the overlay alone.
    pub fn on_mouse_up(
        &mut self,
        selection: Option<&LiveSelection>,
        layout: &ParagraphLayout,
        text_len: usize,
        content_area: Rect,
    ) -> Option<Selection> {
        let range = resolve_offsets(selection, layout, text_len)?;
        let position = selection_anchor_point(selection, layout, text_len, content_area)?;
        self.open(OverlayKind::Toolbar, position, layout.paragraph);
        Some(range)
    }

    /// Returns true when the press dismissed the overlay.
    pub fn on_pointer_down(&mut self, col: u16, row: u16) -> bool {
        if self.kind == OverlayKind::None {
            return false;
        }
        if self.skip_next_dismiss {
            self.skip_next_dismiss = false;
            return false;
        }
        let inside_overlay = self.rendered_area.map(|r| contains(&r, col, row)).unwrap_or(false);
        let inside_ask_ui = self.ask_areas.iter().any(|r| contains(r, col, row));
        if inside_overlay || inside_ask_ui {
            return false;
        }
        self.close();
        true
    }

    pub fn on_key(&mut self, code: KeyCode) -> bool {
        if code == KeyCode::Esc && self.kind != OverlayKind::None {
            self.close();
            return true;
        }
        false
    }

    /// Recompute the anchor point after a scroll or resize; closes the
    /// overlay when the selection can no longer be resolved.
    pub fn reposition(
        &mut self,
        selection: Option<&LiveSelection>,
        layout: Option<&ParagraphLayout>,
        text_len: usize,
        content_area: Rect,
    ) {
        if self.kind == OverlayKind::None {
            return;
        }
        let position = layout.and_then(|l| selection_anchor_point(selection, l, text_len, content_area));
        match position {
            Some(position) => self.position = Some(position),
            None => {
                debug!("selection vanished, closing overlay");
                self.close();
            }
        }
    }

    /// The overlay to draw, if any. A closed overlay never renders, even if
    /// stale geometry lingers.
    pub fn visible(&self) -> Option<VisibleOverlay> {
        if self.kind == OverlayKind::None {
            return None;
        }
        Some(VisibleOverlay { kind: self.kind, position: self.position?, container: self.container? })
    }

    pub fn set_rendered_area(&mut self, area: Option<Rect>) {
        self.rendered_area = area;
    }

    pub fn rendered_area(&self) -> Option<Rect> {
        self.rendered_area
    }

    pub fn set_ask_areas(&mut self, areas: Vec<Rect>) {
        self.ask_areas = areas;
    }

    // ==================== Toolbar Navigation ====================

    pub fn selected_action(&self) -> ToolbarAction {
        let actions = ToolbarAction::all();
        actions[self.selected.min(actions.len() - 1)]
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % ToolbarAction::all().len();
    }

    pub fn select_prev(&mut self) {
        let len = ToolbarAction::all().len();
        self.selected = (self.selected + len - 1) % len;
    }

    pub fn select(&mut self, action: ToolbarAction) {
        if let Some(idx) = ToolbarAction::all().iter().position(|a| *a == action) {
            self.selected = idx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{LayoutRun, TextPoint, TOOLBAR_GAP};
    use pretty_assertions::assert_eq;

    const P: ParagraphId = ParagraphId(0);

    fn layout() -> ParagraphLayout {
        let mut layout = ParagraphLayout::new(P, Rect::new(2, 5, 40, 1));
        layout.runs.push(LayoutRun::source("AWS Lex helps you build chatbots.", 2, 5));
        layout
    }

    fn lex() -> LiveSelection {
        LiveSelection {
            anchor: TextPoint { paragraph: P, run: 0, offset: 4 },
            focus: TextPoint { paragraph: P, run: 0, offset: 7 },
        }
    }

    fn opened() -> OverlayCoordinator {
        let mut overlay = OverlayCoordinator::new();
        overlay.on_mouse_up(Some(&lex()), &layout(), 33, Rect::new(0, 0, 80, 24));
        overlay
    }

    #[test]
    fn test_mouse_up_opens_toolbar() {
        let mut overlay = OverlayCoordinator::new();
        let range = overlay.on_mouse_up(Some(&lex()), &layout(), 33, Rect::new(0, 0, 80, 24));

        assert_eq!(range, Some(Selection { start: 4, end: 7 }));
        assert_eq!(
            overlay.visible(),
            Some(VisibleOverlay {
                kind: OverlayKind::Toolbar,
                position: OverlayPosition { top: 5 - TOOLBAR_GAP, left: 6 + 1 },
                container: P,
            })
        );
    }

    #[test]
    fn test_collapsed_mouse_up_keeps_open_overlay() {
        let mut overlay = opened();
        let click = LiveSelection::collapsed(TextPoint { paragraph: P, run: 0, offset: 2 });
        assert_eq!(overlay.on_mouse_up(Some(&click), &layout(), 33, Rect::new(0, 0, 80, 24)), None);
        assert_eq!(overlay.kind(), OverlayKind::Toolbar);
    }

    #[test]
    fn test_close_hides_even_with_stale_geometry() {
        let mut overlay = opened();
        overlay.open(OverlayKind::Toolbar, OverlayPosition { top: 3, left: 7 }, P);
        overlay.close();
        assert_eq!(overlay.visible(), None);

        // Only the kind gates visibility.
        overlay.kind = OverlayKind::None;
        overlay.position = Some(OverlayPosition { top: 3, left: 7 });
        overlay.container = Some(P);
        assert_eq!(overlay.visible(), None);
    }

    #[test]
    fn test_missing_geometry_renders_nothing() {
        let mut overlay = OverlayCoordinator::new();
        overlay.kind = OverlayKind::Ask;
        assert_eq!(overlay.visible(), None);
    }

    #[test]
    fn test_pointer_down_outside_dismisses() {
        let mut overlay = opened();
        overlay.set_rendered_area(Some(Rect::new(0, 2, 30, 3)));

        assert!(!overlay.on_pointer_down(5, 3));
        assert_eq!(overlay.kind(), OverlayKind::Toolbar);

        assert!(overlay.on_pointer_down(50, 20));
        assert_eq!(overlay.visible(), None);
    }

    #[test]
    fn test_ask_areas_do_not_dismiss() {
        let mut overlay = opened();
        overlay.open_ask_from_toolbar();
        overlay.on_pointer_down(0, 0);
        overlay.set_ask_areas(vec![Rect::new(0, 20, 80, 4)]);

        assert!(!overlay.on_pointer_down(10, 22));
        assert_eq!(overlay.kind(), OverlayKind::Ask);
    }

    #[test]
    fn test_guard_swallows_one_check() {
        let mut overlay = opened();
        overlay.open_ask_from_toolbar();
        assert_eq!(overlay.kind(), OverlayKind::Ask);

        assert!(!overlay.on_pointer_down(70, 20));
        assert_eq!(overlay.kind(), OverlayKind::Ask);

        assert!(overlay.on_pointer_down(70, 20));
        assert_eq!(overlay.kind(), OverlayKind::None);
    }

    #[test]
    fn test_disarmed_guard_lets_first_click_dismiss() {
        let mut overlay = opened();
        overlay.open_ask_from_toolbar();
        overlay.disarm_dismiss_guard();

        assert!(overlay.on_pointer_down(70, 20));
        assert_eq!(overlay.kind(), OverlayKind::None);
    }

    #[test]
    fn test_escape_dismisses() {
        let mut overlay = opened();
        assert!(!overlay.on_key(KeyCode::Enter));
        assert!(overlay.on_key(KeyCode::Esc));
        assert_eq!(overlay.visible(), None);
        assert!(!overlay.on_key(KeyCode::Esc));
    }

    #[test]
    fn test_reposition_follows_scroll() {
        let mut overlay = opened();
        let mut scrolled = layout();
        scrolled.area.y = 2;
        scrolled.runs[0].y = 2;

        overlay.reposition(Some(&lex()), Some(&scrolled), 33, Rect::new(0, 0, 80, 24));
        assert_eq!(overlay.visible().unwrap().position, OverlayPosition { top: 2 - TOOLBAR_GAP, left: 7 });
    }

    #[test]
    fn test_reposition_closes_on_lost_selection() {
        let mut overlay = opened();
        overlay.reposition(Some(&lex()), None, 33, Rect::new(0, 0, 80, 24));
        assert_eq!(overlay.visible(), None);
    }

    #[test]
    fn test_toolbar_navigation_wraps() {
        let mut overlay = opened();
        assert_eq!(overlay.selected_action(), ToolbarAction::Ask);
        overlay.select_prev();
        assert_eq!(overlay.selected_action(), ToolbarAction::Note(NoteType::Blank));
        overlay.select_next();
        overlay.select_next();
        assert_eq!(overlay.selected_action(), ToolbarAction::Highlight);
        assert_eq!(ToolbarAction::from_hotkey('s'), Some(ToolbarAction::Note(NoteType::Simplify)));
    }
}
