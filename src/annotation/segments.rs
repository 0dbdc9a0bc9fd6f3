use super::{char_slice, Anchor, AnchorId, NoteType, Selection};

/// Read-only view of an anchor handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct AnchorView<'a> {
    pub anchor: &'a Anchor,
    pub removing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    /// The anchor the reader last clicked.
    Active,
    /// An ask anchor with at least one message.
    Conversation,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text {
        range: Selection,
        text: String,
    },
    Highlight {
        anchor_id: AnchorId,
        range: Selection,
        text: String,
        state: HighlightState,
    },
    /// Card slot rendered right after a note's highlight.
    NoteBlock {
        anchor_id: AnchorId,
        note_type: NoteType,
        question: String,
        highlighted: String,
        removing: bool,
    },
}

#[cfg(test)]
impl Segment {
    /// Paragraph text carried by this segment; empty for note blocks.
    pub fn text(&self) -> &str {
        match self {
            Segment::Text { text, .. } | Segment::Highlight { text, .. } => text,
            Segment::NoteBlock { .. } => "",
        }
    }

    pub fn is_note_block(&self) -> bool {
        matches!(self, Segment::NoteBlock { .. })
    }
}

/// Partition `text` into plain runs, highlights, and note blocks.
///
/// The `Text` and `Highlight` segments concatenate back to `text`. Anchors
/// starting before the end of a previous one are trimmed to what is left.
pub fn render_segments(text: &str, anchors: &[AnchorView<'_>], active: Option<AnchorId>) -> Vec<Segment> {
    let text_len = text.chars().count();

    let mut sorted: Vec<&AnchorView<'_>> = anchors.iter().collect();
    sorted.sort_by_key(|v| v.anchor.selection().start);

    let mut segments = Vec::with_capacity(sorted.len() * 3 + 1);
    let mut cursor = 0;

    for view in sorted {
        let anchor = view.anchor;
        let original = anchor.selection();
        let end = original.end.min(text_len);
        let start = original.start.max(cursor).min(end);

        if start > cursor {
            segments.push(Segment::Text {
                range: Selection { start: cursor, end: start },
                text: char_slice(text, cursor, start).to_string(),
            });
        }

        if end > start {
            let state = if active == Some(anchor.id()) {
                HighlightState::Active
            } else if anchor.has_conversation() {
                HighlightState::Conversation
            } else {
                HighlightState::Plain
            };
            segments.push(Segment::Highlight {
                anchor_id: anchor.id(),
                range: Selection { start, end },
                text: char_slice(text, start, end).to_string(),
                state,
            });
        }

        if let Anchor::Note(note) = anchor {
            segments.push(Segment::NoteBlock {
                anchor_id: note.id,
                note_type: note.note_type,
                question: note.question.clone(),
                highlighted: char_slice(text, original.start, original.end).to_string(),
                removing: view.removing,
            });
        }

        cursor = cursor.max(end);
    }

    if cursor < text_len {
        segments.push(Segment::Text {
            range: Selection { start: cursor, end: text_len },
            text: char_slice(text, cursor, text_len).to_string(),
        });
    }

    segments
}
