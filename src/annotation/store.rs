use std::time::{Duration, Instant};

use tracing::debug;

use super::segments::AnchorView;
use super::{char_slice, Anchor, AnchorId, AskAnchor, ChatMessage, NoteAnchor, NoteType, Selection};

/// How long a deleted anchor keeps rendering while its card animates out.
pub const DEFAULT_REMOVAL_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorEntry {
    pub anchor: Anchor,
    /// Set once the anchor is marked for removal; purged at this instant.
    pub remove_at: Option<Instant>,
}

impl AnchorEntry {
    pub fn is_removing(&self) -> bool {
        self.remove_at.is_some()
    }

    pub fn view(&self) -> AnchorView<'_> {
        AnchorView { anchor: &self.anchor, removing: self.is_removing() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(AnchorId),
    /// A note with the identical range already exists.
    Duplicate(AnchorId),
    /// The range intersects an existing anchor.
    Overlap(AnchorId),
    /// The id already names an anchor in this store, live or removing.
    IdTaken(AnchorId),
    /// Nothing was selected, or the range is empty.
    Empty,
}

impl InsertOutcome {
    pub fn inserted(&self) -> Option<AnchorId> {
        match self {
            InsertOutcome::Inserted(id) => Some(*id),
            _ => None,
        }
    }
}

/// Ordered anchors of one paragraph plus its pending selection.
#[derive(Debug, Clone)]
pub struct AnchorStore {
    text_len: usize,
    /// Insertion order; sorting happens on read.
    entries: Vec<AnchorEntry>,
    next_id: u64,
    active: Option<AnchorId>,
    pending: Option<Selection>,
    removal_delay: Duration,
}

impl AnchorStore {
    #[cfg(test)]
    pub fn new(text_len: usize) -> Self {
        Self::with_removal_delay(text_len, DEFAULT_REMOVAL_DELAY)
    }

    pub fn with_removal_delay(text_len: usize, removal_delay: Duration) -> Self {
        Self {
            text_len,
            entries: Vec::new(),
            next_id: 1,
            active: None,
            pending: None,
            removal_delay,
        }
    }

    fn allocate_id(&mut self) -> AnchorId {
        let id = AnchorId(self.next_id);
        self.next_id += 1;
        id
    }

    // ==================== Pending Selection ====================

    pub fn set_pending_selection(&mut self, selection: Option<Selection>) {
        self.pending = selection
            .map(|s| Selection::clamped(s.start, s.end, self.text_len))
            .filter(|s| !s.is_empty());
    }

    pub fn pending_selection(&self) -> Option<Selection> {
        self.pending
    }

    pub fn clear_pending_selection(&mut self) {
        self.pending = None;
    }

    // ==================== Insertion ====================

    /// Append `anchor`, clamping its range to the paragraph.
    ///
    /// The pending selection is cleared whatever the outcome.
    pub fn insert(&mut self, mut anchor: Anchor) -> InsertOutcome {
        self.pending = None;

        let id = anchor.id();
        if self.query(id).is_some() {
            debug!(%id, "rejecting reused anchor id");
            return InsertOutcome::IdTaken(id);
        }

        let raw = anchor.selection();
        let range = Selection::clamped(raw.start, raw.end, self.text_len);
        match &mut anchor {
            Anchor::Ask(a) => a.selection = range,
            Anchor::Note(n) => n.selection = range,
        }

        if range.is_empty() {
            debug!(?range, "rejecting empty anchor");
            return InsertOutcome::Empty;
        }

        if anchor.is_note() {
            if let Some(existing) = self
                .entries
                .iter()
                .filter(|e| !e.is_removing())
                .find(|e| e.anchor.is_note() && e.anchor.selection() == range)
            {
                debug!(?range, existing = %existing.anchor.id(), "rejecting duplicate note");
                return InsertOutcome::Duplicate(existing.anchor.id());
            }
        }

        if let Some(existing) = self
            .entries
            .iter()
            .filter(|e| !e.is_removing())
            .find(|e| e.anchor.selection().overlaps(&range))
        {
            debug!(?range, existing = %existing.anchor.id(), "rejecting overlapping anchor");
            return InsertOutcome::Overlap(existing.anchor.id());
        }

        self.next_id = self.next_id.max(id.0 + 1);
        self.entries.push(AnchorEntry { anchor, remove_at: None });
        InsertOutcome::Inserted(id)
    }

    /// Create a note from the pending selection.
    pub fn insert_note(&mut self, note_type: NoteType, question: impl Into<String>) -> InsertOutcome {
        let Some(selection) = self.pending else {
            return InsertOutcome::Empty;
        };
        let id = self.allocate_id();
        self.insert(Anchor::Note(NoteAnchor {
            id,
            selection,
            note_type,
            question: question.into(),
        }))
    }

    /// Create a conversation-less highlight from the pending selection.
    pub fn insert_highlight(&mut self, paragraph_text: &str) -> InsertOutcome {
        self.insert_ask(paragraph_text, Vec::new())
    }

    /// Create an ask anchor over the pending selection seeded with `history`.
    pub fn insert_ask(&mut self, paragraph_text: &str, history: Vec<ChatMessage>) -> InsertOutcome {
        let Some(selection) = self.pending else {
            return InsertOutcome::Empty;
        };
        let id = self.allocate_id();
        let context = char_slice(paragraph_text, selection.start, selection.end).to_string();
        self.insert(Anchor::Ask(AskAnchor { id, selection, chat_history: history, context }))
    }

    // ==================== Removal ====================

    /// First phase of deletion: the anchor keeps rendering, flagged, until
    /// `removal_delay` has passed.
    pub fn mark_for_removal(&mut self, id: AnchorId, now: Instant) -> bool {
        let delay = self.removal_delay;
        match self.entries.iter_mut().find(|e| e.anchor.id() == id) {
            Some(entry) if entry.remove_at.is_none() => {
                entry.remove_at = Some(now + delay);
                true
            }
            _ => false,
        }
    }

    /// Second phase: drop every anchor whose removal deadline has passed.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<AnchorId> {
        let mut purged = Vec::new();
        self.entries.retain(|e| match e.remove_at {
            Some(at) if at <= now => {
                purged.push(e.anchor.id());
                false
            }
            _ => true,
        });
        if let Some(active) = self.active {
            if purged.contains(&active) {
                self.active = None;
            }
        }
        purged
    }

    pub fn is_removing(&self, id: AnchorId) -> bool {
        self.query(id).map(AnchorEntry::is_removing).unwrap_or(false)
    }

    pub fn next_removal_deadline(&self) -> Option<Instant> {
        self.entries.iter().filter_map(|e| e.remove_at).min()
    }

    // ==================== Queries ====================

    pub fn query(&self, id: AnchorId) -> Option<&AnchorEntry> {
        self.entries.iter().find(|e| e.anchor.id() == id)
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.query(id).map(|e| &e.anchor)
    }

    /// Every anchor, including those being removed, by ascending start.
    /// Equal starts keep insertion order.
    pub fn all(&self) -> Vec<&AnchorEntry> {
        let mut sorted: Vec<&AnchorEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.anchor.selection().start);
        sorted
    }

    pub fn views(&self) -> Vec<AnchorView<'_>> {
        self.all().into_iter().map(AnchorEntry::view).collect()
    }

    /// The live anchor covering character `offset`, if any.
    pub fn anchor_at(&self, offset: usize) -> Option<AnchorId> {
        self.entries
            .iter()
            .filter(|e| !e.is_removing())
            .find(|e| {
                let s = e.anchor.selection();
                s.start <= offset && offset < s.end
            })
            .map(|e| e.anchor.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ==================== Focus & Conversations ====================

    pub fn set_active(&mut self, id: Option<AnchorId>) {
        match id {
            None => self.active = None,
            Some(id) if self.query(id).is_some() => self.active = Some(id),
            Some(_) => {}
        }
    }

    pub fn active(&self) -> Option<AnchorId> {
        self.active
    }

    pub fn push_chat_message(&mut self, id: AnchorId, message: ChatMessage) -> bool {
        let found = self.entries.iter_mut().find_map(|e| match &mut e.anchor {
            Anchor::Ask(a) if a.id == id => Some(a),
            _ => None,
        });
        match found {
            Some(ask) => {
                ask.chat_history.push(message);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "AWS Lex helps you build chatbots.";

    fn store() -> AnchorStore {
        AnchorStore::new(TEXT.chars().count())
    }

    fn note(store: &mut AnchorStore, start: usize, end: usize, note_type: NoteType) -> InsertOutcome {
        store.set_pending_selection(Some(Selection { start, end }));
        store.insert_note(note_type, "")
    }

    fn starts(store: &AnchorStore) -> Vec<usize> {
        store.all().iter().map(|e| e.anchor.selection().start).collect()
    }

    #[test]
    fn test_insert_note_from_pending_selection() {
        let mut store = store();
        let outcome = note(&mut store, 4, 7, NoteType::Explain);
        let id = outcome.inserted().unwrap();

        let anchor = store.anchor(id).unwrap().as_note().unwrap().clone();
        assert_eq!(anchor.selection, Selection { start: 4, end: 7 });
        assert_eq!(anchor.note_type, NoteType::Explain);
        assert_eq!(store.pending_selection(), None);
    }

    #[test]
    fn test_insert_without_pending_selection() {
        let mut store = store();
        assert_eq!(store.insert_note(NoteType::Example, ""), InsertOutcome::Empty);
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_note_rejected() {
        let mut store = store();
        let first = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        let outcome = note(&mut store, 4, 7, NoteType::Simplify);

        assert_eq!(outcome, InsertOutcome::Duplicate(first));
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_selection(), None);
    }

    #[test]
    fn test_partial_overlap_rejected() {
        let mut store = store();
        let first = note(&mut store, 4, 13, NoteType::Explain).inserted().unwrap();
        assert_eq!(note(&mut store, 8, 17, NoteType::Explain), InsertOutcome::Overlap(first));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_adjacent_ranges_allowed() {
        let mut store = store();
        assert!(note(&mut store, 0, 3, NoteType::Explain).inserted().is_some());
        assert!(note(&mut store, 3, 7, NoteType::Explain).inserted().is_some());
    }

    #[test]
    fn test_highlight_over_note_range_is_overlap() {
        let mut store = store();
        let first = note(&mut store, 4, 7, NoteType::Blank).inserted().unwrap();
        store.set_pending_selection(Some(Selection { start: 4, end: 7 }));
        assert_eq!(store.insert_highlight(TEXT), InsertOutcome::Overlap(first));
    }

    #[test]
    fn test_insert_clamps_range() {
        let mut store = store();
        let id = store
            .insert(Anchor::Note(NoteAnchor {
                id: AnchorId(99),
                selection: Selection { start: 30, end: 80 },
                note_type: NoteType::Blank,
                question: String::new(),
            }))
            .inserted()
            .unwrap();
        assert_eq!(store.anchor(id).unwrap().selection(), Selection { start: 30, end: 33 });
    }

    fn blank(id: u64, start: usize, end: usize) -> Anchor {
        Anchor::Note(NoteAnchor {
            id: AnchorId(id),
            selection: Selection { start, end },
            note_type: NoteType::Blank,
            question: String::new(),
        })
    }

    #[test]
    fn test_insert_rejects_reused_id() {
        let mut store = store();
        assert_eq!(store.insert(blank(1, 0, 3)), InsertOutcome::Inserted(AnchorId(1)));
        assert_eq!(store.insert(blank(1, 10, 14)), InsertOutcome::IdTaken(AnchorId(1)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.anchor(AnchorId(1)).unwrap().selection(), Selection { start: 0, end: 3 });
    }

    #[test]
    fn test_reused_id_rejected_while_removing() {
        let mut store = store();
        store.insert(blank(1, 0, 3));
        store.mark_for_removal(AnchorId(1), Instant::now());
        assert_eq!(store.insert(blank(1, 10, 14)), InsertOutcome::IdTaken(AnchorId(1)));
    }

    #[test]
    fn test_allocated_ids_skip_explicit_ones() {
        let mut store = store();
        store.insert(blank(7, 0, 3));
        let next = note(&mut store, 10, 14, NoteType::Explain).inserted().unwrap();
        assert_eq!(next, AnchorId(8));
    }

    #[test]
    fn test_all_sorted_regardless_of_insertion_order() {
        let mut store = store();
        note(&mut store, 10, 14, NoteType::Explain);
        note(&mut store, 0, 3, NoteType::Explain);
        note(&mut store, 18, 23, NoteType::Explain);
        assert_eq!(starts(&store), vec![0, 10, 18]);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = store();
        let a = note(&mut store, 0, 3, NoteType::Explain).inserted().unwrap();
        let b = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_two_phase_removal() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        let t0 = Instant::now();

        assert!(store.mark_for_removal(id, t0));
        assert!(store.is_removing(id));

        assert!(store.purge_expired(t0 + Duration::from_millis(399)).is_empty());
        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].is_removing());

        assert_eq!(store.purge_expired(t0 + Duration::from_millis(400)), vec![id]);
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_mark_unknown_id_is_noop() {
        let mut store = store();
        assert!(!store.mark_for_removal(AnchorId(42), Instant::now()));
    }

    #[test]
    fn test_mark_twice_keeps_first_deadline() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        let t0 = Instant::now();
        store.mark_for_removal(id, t0);
        assert!(!store.mark_for_removal(id, t0 + Duration::from_millis(300)));
        assert_eq!(store.next_removal_deadline(), Some(t0 + DEFAULT_REMOVAL_DELAY));
    }

    #[test]
    fn test_removing_anchor_does_not_block_reinsert() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        store.mark_for_removal(id, Instant::now());
        assert!(note(&mut store, 4, 7, NoteType::Explain).inserted().is_some());
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn test_set_active() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        store.set_active(Some(id));
        assert_eq!(store.active(), Some(id));

        store.set_active(Some(AnchorId(1000)));
        assert_eq!(store.active(), Some(id));

        store.set_active(None);
        assert_eq!(store.active(), None);
    }

    #[test]
    fn test_purge_clears_active() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        let t0 = Instant::now();
        store.set_active(Some(id));
        store.mark_for_removal(id, t0);
        store.purge_expired(t0 + DEFAULT_REMOVAL_DELAY);
        assert_eq!(store.active(), None);
    }

    #[test]
    fn test_ask_anchor_chat_history() {
        let mut store = store();
        store.set_pending_selection(Some(Selection { start: 0, end: 7 }));
        let id = store.insert_ask(TEXT, vec![ChatMessage::user("What is Lex?")]).inserted().unwrap();

        assert!(store.push_chat_message(id, ChatMessage::ai("A chatbot service.")));
        let ask = store.anchor(id).unwrap().as_ask().unwrap();
        assert_eq!(ask.context, "AWS Lex");
        assert_eq!(
            ask.chat_history,
            vec![ChatMessage::user("What is Lex?"), ChatMessage::ai("A chatbot service.")]
        );
    }

    #[test]
    fn test_push_chat_message_to_note_is_noop() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        assert!(!store.push_chat_message(id, ChatMessage::user("hi")));
    }

    #[test]
    fn test_anchor_at() {
        let mut store = store();
        let id = note(&mut store, 4, 7, NoteType::Explain).inserted().unwrap();
        assert_eq!(store.anchor_at(4), Some(id));
        assert_eq!(store.anchor_at(6), Some(id));
        assert_eq!(store.anchor_at(7), None);
    }

    #[test]
    fn test_pending_selection_collapsed_is_dropped() {
        let mut store = store();
        store.set_pending_selection(Some(Selection { start: 5, end: 5 }));
        assert_eq!(store.pending_selection(), None);
    }
}
