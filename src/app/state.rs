use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use tracing::{debug, info};

use crate::annotation::{
    resolve_offsets, Anchor, AnchorRef, ChatMessage, InsertOutcome, LiveSelection, NoteAnchor, ParagraphId,
    ParagraphLayout, RunKind, Selection, TextPoint,
};
use crate::ask::{compose_prompt, AskInput, AskSessions, AskTarget};
use crate::bottom_bar::{BottomBar, BottomBarMode};
use crate::config::Config;
use crate::document::{Document, ReadingProgress};
use crate::note::{CompletionClient, CompletionWorker, NoteRegistry, RequestTarget};
use crate::overlay::{OverlayCoordinator, OverlayKind, ToolbarAction};
use crate::theme::Theme;

/// Redraw interval while something on screen is moving.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DialogState {
    None,
    Help,
}

/// Clickable parts of a note card in the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardArea {
    pub key: AnchorRef,
    pub area: Rect,
    pub close: Rect,
    pub retry: Option<Rect>,
}

pub struct App {
    pub theme: Theme,
    pub document: Document,
    pub registry: NoteRegistry,
    pub worker: CompletionWorker,
    pub overlay: OverlayCoordinator,
    pub bottom_bar: BottomBar,
    pub dialog: DialogState,

    // Ask input shared by the ask panel and the bottom bar
    pub ask_input: AskInput,
    pub asks: AskSessions,
    /// Selection the ask panel was opened from; becomes an ask anchor when
    /// the first question is sent.
    pub ask_origin: Option<(ParagraphId, Selection)>,

    // Mouse selection state
    pub selection: Option<LiveSelection>,
    pub mouse_button_held: bool,
    /// Anchor targeted by `r`, `d` and the chat bar.
    pub focused: Option<AnchorRef>,

    // Geometry reported by the last frame
    pub layouts: Vec<ParagraphLayout>,
    pub card_areas: Vec<CardArea>,
    pub toolbar_hits: Vec<(ToolbarAction, Rect)>,
    pub content_area: Rect,
    pub bottom_bar_area: Rect,
    /// First paragraph on screen.
    pub scroll: usize,
    pub visible_paragraphs: usize,
}

fn contains(rect: &Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Hit-test a drag position against one paragraph, pinning rows above or
/// below it to the paragraph's first or last character.
fn clamped_hit(layout: &ParagraphLayout, col: u16, row: u16) -> Option<TextPoint> {
    let rows: Vec<u16> = layout.runs.iter().filter(|r| r.kind == RunKind::Source).map(|r| r.y).collect();
    let first = *rows.iter().min()?;
    let last = *rows.iter().max()?;
    if row < first {
        layout.point_at_offset(0)
    } else if row > last {
        layout.point_at_offset(usize::MAX)
    } else {
        layout.hit_test(col, row)
    }
}

impl App {
    pub fn new(
        config: &Config,
        theme: Theme,
        document: Document,
        client: Arc<dyn CompletionClient + Send + Sync>,
    ) -> Self {
        let registry = NoteRegistry::new(config.note_settings());
        info!(
            title = %document.title,
            paragraphs = document.paragraphs().len(),
            "document loaded"
        );
        Self {
            theme,
            document,
            registry,
            worker: CompletionWorker::new(client),
            overlay: OverlayCoordinator::new(),
            bottom_bar: BottomBar::default(),
            dialog: DialogState::None,
            ask_input: AskInput::default(),
            asks: AskSessions::default(),
            ask_origin: None,
            selection: None,
            mouse_button_held: false,
            focused: None,
            layouts: Vec::new(),
            card_areas: Vec::new(),
            toolbar_hits: Vec::new(),
            content_area: Rect::default(),
            bottom_bar_area: Rect::default(),
            scroll: 0,
            visible_paragraphs: 0,
        }
    }

    pub fn layout_for(&self, paragraph: ParagraphId) -> Option<&ParagraphLayout> {
        self.layouts.iter().find(|l| l.paragraph == paragraph)
    }

    /// Whether typed characters go to the ask input.
    pub fn input_focused(&self) -> bool {
        self.overlay.kind() == OverlayKind::Ask
            || matches!(self.bottom_bar.mode(), BottomBarMode::Ask | BottomBarMode::Chat)
    }

    /// Whether the loop should wake up on its own to redraw.
    pub fn needs_frame(&self, now: Instant) -> bool {
        self.registry.is_animating(now)
            || self.worker.in_flight() > 0
            || self.document.next_removal_deadline().is_some()
            || self.mouse_button_held
    }

    pub fn progress(&self) -> ReadingProgress {
        let total = self.document.paragraphs().len();
        let fraction = if total == 0 {
            1.0
        } else {
            (self.scroll + self.visible_paragraphs).min(total) as f64 / total as f64
        };
        self.document.progress(fraction)
    }

    // ==================== Scrolling ====================

    pub fn scroll_down(&mut self) {
        if self.scroll + 1 < self.document.paragraphs().len() {
            self.scroll += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    /// Follow the pending selection after the content pane moved. Called
    /// once the new frame's layouts are known.
    pub fn refresh_overlay(&mut self) {
        let kind = self.overlay.kind();
        let Some(container) = self.overlay.container() else {
            return;
        };
        let range = match kind {
            OverlayKind::Ask => self.ask_origin.map(|(_, r)| r),
            _ => self.document.pending().map(|(_, r)| r),
        };
        let text_len = self.document.paragraph(container).map(|p| p.char_len()).unwrap_or(0);
        let layout = self.layouts.iter().find(|l| l.paragraph == container);
        let selection = layout.zip(range).and_then(|(l, r)| LiveSelection::from_range(l, r));
        self.overlay.reposition(selection.as_ref(), layout, text_len, self.content_area);

        if kind == OverlayKind::Toolbar && self.overlay.kind() == OverlayKind::None {
            self.document.clear_pending_selection();
        }
    }

    // ==================== Selection ====================

    /// Start a drag at a screen cell. Returns false when the cell holds no
    /// paragraph text.
    pub fn begin_selection(&mut self, col: u16, row: u16) -> bool {
        let point = self.layouts.iter().find_map(|l| l.hit_test(col, row));
        self.selection = point.map(LiveSelection::collapsed);
        self.mouse_button_held = point.is_some();
        point.is_some()
    }

    pub fn extend_selection(&mut self, col: u16, row: u16) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        let Some(layout) = self.layouts.iter().find(|l| l.paragraph == selection.anchor.paragraph) else {
            return;
        };
        if let Some(point) = clamped_hit(layout, col, row) {
            selection.extend_to(point);
        }
    }

    /// The drag ended: a click activates the anchor under it, a range opens
    /// the toolbar.
    pub fn finish_selection(&mut self) {
        self.mouse_button_held = false;
        let Some(selection) = self.selection.take() else {
            return;
        };
        let paragraph = selection.anchor.paragraph;
        let Some(text_len) = self.document.paragraph(paragraph).map(|p| p.char_len()) else {
            return;
        };
        let Some(layout) = self.layouts.iter().find(|l| l.paragraph == paragraph) else {
            return;
        };

        if selection.is_collapsed() {
            let offset = layout.offset_of(&selection.focus);
            self.click_text(paragraph, offset);
            return;
        }

        match self.overlay.on_mouse_up(Some(&selection), layout, text_len, self.content_area) {
            Some(range) => {
                debug!(paragraph = paragraph.0, ?range, "selection resolved");
                self.document.set_pending_selection(paragraph, Some(range));
            }
            None => self.document.clear_pending_selection(),
        }
    }

    /// Grow or shrink the pending selection by one character, starting one
    /// at the top of the first visible paragraph.
    pub fn extend_selection_by_key(&mut self, forward: bool) {
        let (paragraph, start, end) = match self.document.pending() {
            Some((p, r)) if forward => (p, r.start, r.end + 1),
            Some((p, r)) => (p, r.start, r.end.saturating_sub(1).max(r.start + 1)),
            None => (ParagraphId(self.scroll), 0, 1),
        };
        let Some(text_len) = self.document.paragraph(paragraph).map(|p| p.char_len()) else {
            return;
        };
        let range = Selection::clamped(start, end, text_len);
        let Some(layout) = self.layouts.iter().find(|l| l.paragraph == paragraph) else {
            return;
        };
        let Some(selection) = LiveSelection::from_range(layout, range) else {
            return;
        };
        if let Some(range) = self.overlay.on_mouse_up(Some(&selection), layout, text_len, self.content_area) {
            self.document.set_pending_selection(paragraph, Some(range));
        }
    }

    /// Range to paint as selected: the drag in progress, else the pending
    /// selection.
    pub fn selection_range(&self, paragraph: ParagraphId) -> Option<Selection> {
        if let Some(selection) = self.selection.as_ref().filter(|s| s.anchor.paragraph == paragraph) {
            let layout = self.layout_for(paragraph)?;
            let text_len = self.document.paragraph(paragraph)?.char_len();
            return resolve_offsets(Some(selection), layout, text_len);
        }
        if let Some((p, range)) = self.ask_origin {
            if p == paragraph {
                return Some(range);
            }
        }
        self.document.pending().filter(|(p, _)| *p == paragraph).map(|(_, r)| r)
    }

    fn click_text(&mut self, paragraph: ParagraphId, offset: usize) {
        let hit = self.document.paragraph(paragraph).and_then(|p| p.store.anchor_at(offset));
        if let Some(anchor) = hit {
            self.activate_anchor(AnchorRef { paragraph, anchor });
        }
    }

    /// Make `key` the active highlight. Ask anchors open their conversation.
    pub fn activate_anchor(&mut self, key: AnchorRef) {
        let Some(anchor) = self.document.anchor(key) else {
            return;
        };
        let is_ask = matches!(anchor, Anchor::Ask(_));
        self.focused = Some(key);
        self.document.set_active_anchor(Some(key));
        if is_ask {
            self.bottom_bar.open_chat();
        }
        debug!(paragraph = key.paragraph.0, anchor = %key.anchor, "anchor activated");
    }

    pub fn clear_focus(&mut self) {
        self.focused = None;
        self.document.set_active_anchor(None);
    }

    /// Live anchors in reading order.
    pub fn anchor_refs(&self) -> Vec<AnchorRef> {
        self.document
            .paragraphs()
            .iter()
            .flat_map(|p| {
                p.store
                    .all()
                    .into_iter()
                    .filter(|e| !e.is_removing())
                    .map(move |e| AnchorRef { paragraph: p.id, anchor: e.anchor.id() })
            })
            .collect()
    }

    pub fn focus_next(&mut self) {
        self.cycle_focus(true);
    }

    pub fn focus_prev(&mut self) {
        self.cycle_focus(false);
    }

    fn cycle_focus(&mut self, forward: bool) {
        let refs = self.anchor_refs();
        if refs.is_empty() {
            return;
        }
        let current = self.focused.and_then(|f| refs.iter().position(|r| *r == f));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % refs.len(),
            (Some(i), false) => (i + refs.len() - 1) % refs.len(),
            (None, true) => 0,
            (None, false) => refs.len() - 1,
        };
        let key = refs[next];
        self.activate_anchor(key);
        if self.layout_for(key.paragraph).is_none() {
            self.scroll = key.paragraph.0;
        }
    }

    // ==================== Toolbar ====================

    /// Run a toolbar entry against the pending selection. `from_pointer`
    /// tells whether a click (which must not dismiss the ask panel it opens)
    /// triggered it.
    pub fn apply_toolbar_action(&mut self, action: ToolbarAction, from_pointer: bool, now: Instant) {
        let Some((paragraph, range)) = self.document.pending() else {
            self.overlay.close();
            return;
        };
        let Some(p) = self.document.paragraph_mut(paragraph) else {
            return;
        };

        let outcome = match action {
            ToolbarAction::Ask => {
                let seed = p.slice(range).to_string();
                self.ask_origin = Some((paragraph, range));
                self.ask_input = AskInput::default();
                self.overlay.open_ask_from_toolbar();
                if !from_pointer {
                    self.overlay.disarm_dismiss_guard();
                }
                self.bottom_bar.open_ask(Some(&seed));
                return;
            }
            ToolbarAction::Highlight => p.store.insert_highlight(&p.text),
            ToolbarAction::Note(note_type) => {
                let question = p.slice(range).to_string();
                p.store.insert_note(note_type, question)
            }
        };
        log_insert(action, paragraph, &outcome);

        self.overlay.close();
        self.document.clear_pending_selection();
        if let Some(anchor) = outcome.inserted() {
            let key = AnchorRef { paragraph, anchor };
            self.focused = Some(key);
            self.document.set_active_anchor(Some(key));
        }
        if matches!(action, ToolbarAction::Note(_)) {
            self.sync_notes(now);
        }
    }

    /// Leave the ask panel and bar without sending.
    pub fn cancel_ask(&mut self) {
        if self.overlay.kind() == OverlayKind::Ask {
            self.overlay.close();
        }
        if self.ask_origin.take().is_some() {
            self.document.clear_pending_selection();
        }
        self.bottom_bar.open_navigation();
    }

    // ==================== Questions ====================

    /// Send the ask input. Questions opened from a selection create an ask
    /// anchor on that range; in chat mode they continue the focused anchor's
    /// conversation; anything else is a free question.
    pub fn send_question(&mut self) {
        if !self.ask_input.can_send() {
            debug!("question too short to send");
            return;
        }
        let Some(question) = self.ask_input.take() else {
            return;
        };

        let (target, context) = if let Some((paragraph, range)) = self.ask_origin.take() {
            self.overlay.close();
            self.anchor_question(paragraph, range, &question)
        } else if let Some(key) = self.chat_anchor() {
            let context = self.document.anchor(key).and_then(Anchor::as_ask).map(|a| a.context.clone());
            if let Some(p) = self.document.paragraph_mut(key.paragraph) {
                p.store.push_chat_message(key.anchor, ChatMessage::user(&question));
            }
            (AskTarget::Anchor(key), context)
        } else {
            self.bottom_bar.open_chat();
            (AskTarget::Free, None)
        };

        self.asks.begin(target, &question);
        let prompt = compose_prompt(context.as_deref(), &question);
        info!(?target, "question sent");
        self.worker.dispatch(RequestTarget::Ask(target), prompt);
    }

    /// The ask anchor whose conversation the chat bar shows.
    pub fn chat_anchor(&self) -> Option<AnchorRef> {
        if self.bottom_bar.mode() != BottomBarMode::Chat {
            return None;
        }
        let key = self.focused?;
        self.document.anchor(key)?.as_ask().map(|_| key)
    }

    fn anchor_question(
        &mut self,
        paragraph: ParagraphId,
        range: Selection,
        question: &str,
    ) -> (AskTarget, Option<String>) {
        self.document.set_pending_selection(paragraph, Some(range));
        let Some(p) = self.document.paragraph_mut(paragraph) else {
            return (AskTarget::Free, None);
        };
        let context = p.slice(range).to_string();
        let outcome = p.store.insert_ask(&p.text, vec![ChatMessage::user(question)]);
        log_insert(ToolbarAction::Ask, paragraph, &outcome);

        let key = match outcome {
            InsertOutcome::Inserted(anchor) => Some(AnchorRef { paragraph, anchor }),
            // Asking again about an existing highlight continues it.
            InsertOutcome::Overlap(anchor) | InsertOutcome::Duplicate(anchor)
                if p.store.anchor(anchor).map(|a| a.as_ask().is_some()).unwrap_or(false) =>
            {
                p.store.push_chat_message(anchor, ChatMessage::user(question));
                Some(AnchorRef { paragraph, anchor })
            }
            _ => None,
        };
        self.document.clear_pending_selection();

        match key {
            Some(key) => {
                self.activate_anchor(key);
                (AskTarget::Anchor(key), Some(context))
            }
            None => {
                self.bottom_bar.open_chat();
                (AskTarget::Free, Some(context))
            }
        }
    }

    // ==================== Notes ====================

    /// Mount lifecycles for new notes, unmount removed ones, and dispatch
    /// whatever requests that produces.
    pub fn sync_notes(&mut self, now: Instant) {
        for paragraph in self.document.paragraphs() {
            let live: Vec<(&NoteAnchor, String)> = paragraph
                .store
                .all()
                .into_iter()
                .filter(|e| !e.is_removing())
                .filter_map(|e| e.anchor.as_note())
                .map(|n| (n, paragraph.slice(n.selection).to_string()))
                .collect();
            for (key, request) in self.registry.sync(paragraph.id, &live, now) {
                self.worker.dispatch(
                    RequestTarget::Note { anchor: key, generation: request.generation },
                    request.prompt,
                );
            }
        }
    }

    pub fn retry_note(&mut self, key: AnchorRef, now: Instant) {
        if let Some(request) = self.registry.retry(key, now) {
            info!(anchor = %key.anchor, "retrying note");
            self.worker.dispatch(RequestTarget::Note { anchor: key, generation: request.generation }, request.prompt);
        }
    }

    /// First phase of deleting an anchor; it fades out until purged.
    pub fn delete_anchor(&mut self, key: AnchorRef, now: Instant) {
        let marked = self
            .document
            .paragraph_mut(key.paragraph)
            .map(|p| p.store.mark_for_removal(key.anchor, now))
            .unwrap_or(false);
        if !marked {
            return;
        }
        info!(paragraph = key.paragraph.0, anchor = %key.anchor, "anchor removed");
        if self.focused == Some(key) {
            if self.bottom_bar.mode() == BottomBarMode::Chat {
                self.bottom_bar.open_navigation();
            }
            self.clear_focus();
        }
        self.sync_notes(now);
    }

    // ==================== Background work ====================

    /// Apply finished completions. Returns true when anything changed.
    pub fn poll_responses(&mut self, now: Instant) -> bool {
        let done = self.worker.poll();
        let changed = !done.is_empty();
        for completion in done {
            match completion.target {
                RequestTarget::Note { anchor, generation } => {
                    self.registry.on_response(anchor, generation, completion.result, now);
                }
                RequestTarget::Ask(target) => {
                    let result = completion.result.map_err(|e| e.to_string());
                    let Some(message) = self.asks.finish(target, result) else {
                        continue;
                    };
                    if let AskTarget::Anchor(key) = target {
                        let stored = self
                            .document
                            .paragraph_mut(key.paragraph)
                            .map(|p| p.store.push_chat_message(key.anchor, message))
                            .unwrap_or(false);
                        if !stored {
                            debug!(anchor = %key.anchor, "answer for a removed anchor dropped");
                        }
                    }
                }
            }
        }
        changed
    }

    /// Advance every timer. Returns true when a redraw is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        let purged = self.document.purge_expired(now);
        for key in &purged {
            self.registry.unmount(*key);
            self.asks.forget(*key);
            if self.focused == Some(*key) {
                self.focused = None;
            }
        }
        let polled = self.poll_responses(now);
        let advanced = self.registry.tick(now);
        !purged.is_empty() || polled || advanced || self.registry.is_animating(now)
    }

    // ==================== Pointer routing ====================

    /// Route a left press that landed on a card. Returns false when the
    /// press missed every card.
    pub fn click_card(&mut self, col: u16, row: u16, now: Instant) -> bool {
        let Some(card) = self.card_areas.iter().find(|c| contains(&c.area, col, row)).copied() else {
            return false;
        };
        if contains(&card.close, col, row) {
            self.delete_anchor(card.key, now);
        } else if card.retry.map(|r| contains(&r, col, row)).unwrap_or(false) {
            self.retry_note(card.key, now);
        } else {
            self.activate_anchor(card.key);
        }
        true
    }

    pub fn toolbar_action_at(&self, col: u16, row: u16) -> Option<ToolbarAction> {
        self.toolbar_hits.iter().find(|(_, r)| contains(r, col, row)).map(|(a, _)| *a)
    }

    pub fn in_bottom_bar(&self, col: u16, row: u16) -> bool {
        contains(&self.bottom_bar_area, col, row)
    }
}

fn log_insert(action: ToolbarAction, paragraph: ParagraphId, outcome: &InsertOutcome) {
    match outcome {
        InsertOutcome::Inserted(id) => info!(action = action.label(), paragraph = paragraph.0, anchor = %id, "anchor created"),
        other => debug!(action = action.label(), paragraph = paragraph.0, outcome = ?other, "anchor not created"),
    }
}
