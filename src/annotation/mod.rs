//! Anchored annotations
//!
//! Everything that binds reader state to a character range of a paragraph:
//! - Resolving a live mouse/keyboard selection into paragraph offsets
//! - The per-paragraph anchor store (insert, two-phase removal, focus)
//! - Partitioning paragraph text into renderable segments

pub mod resolver;
pub mod segments;
pub mod store;

pub use resolver::{
    resolve_offsets, selection_anchor_point, LayoutRun, LiveSelection, OverlayPosition,
    ParagraphLayout, RunKind, TextPoint, TOOLBAR_GAP,
};
pub use segments::{render_segments, HighlightState, Segment};
pub use store::{AnchorStore, InsertOutcome};

use std::fmt;

/// Identifier of a paragraph inside the loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParagraphId(pub usize);

/// Identifier of an anchor, unique within its paragraph's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Globally unique handle on an anchor: its paragraph plus its id there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorRef {
    pub paragraph: ParagraphId,
    pub anchor: AnchorId,
}

/// Character range `[start, end)` inside one paragraph's text.
///
/// Offsets count Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// Builds a range clamped into `[0, text_len]` with `start <= end`,
    /// whichever order the endpoints come in.
    pub fn clamped(a: usize, b: usize, text_len: usize) -> Self {
        let a = a.min(text_len);
        let b = b.min(text_len);
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &Selection) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub message: String,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self { sender: Sender::User, message: message.into() }
    }

    pub fn ai(message: impl Into<String>) -> Self {
        Self { sender: Sender::Ai, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteType {
    Explain,
    Example,
    Simplify,
    Blank,
}

impl NoteType {
    pub fn label(&self) -> &'static str {
        match self {
            NoteType::Explain => "Explain",
            NoteType::Example => "Example",
            NoteType::Simplify => "Simplify",
            NoteType::Blank => "Note",
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, NoteType::Blank)
    }
}

/// Conversation bound to a highlighted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskAnchor {
    pub id: AnchorId,
    pub selection: Selection,
    pub chat_history: Vec<ChatMessage>,
    /// The highlighted text at creation time.
    pub context: String,
}

/// AI-generated (or blank) note pinned under a highlighted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteAnchor {
    pub id: AnchorId,
    pub selection: Selection,
    pub note_type: NoteType,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Ask(AskAnchor),
    Note(NoteAnchor),
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        match self {
            Anchor::Ask(a) => a.id,
            Anchor::Note(n) => n.id,
        }
    }

    pub fn selection(&self) -> Selection {
        match self {
            Anchor::Ask(a) => a.selection,
            Anchor::Note(n) => n.selection,
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Anchor::Note(_))
    }

    pub fn as_note(&self) -> Option<&NoteAnchor> {
        match self {
            Anchor::Note(n) => Some(n),
            Anchor::Ask(_) => None,
        }
    }

    pub fn as_ask(&self) -> Option<&AskAnchor> {
        match self {
            Anchor::Ask(a) => Some(a),
            Anchor::Note(_) => None,
        }
    }

    pub fn has_conversation(&self) -> bool {
        matches!(self, Anchor::Ask(a) if !a.chat_history.is_empty())
    }
}

/// Slice `text` by character offsets, clamping out-of-range bounds.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let from = indices.by_ref().nth(start).unwrap_or(text.len());
    let to = indices.nth(end - start - 1).unwrap_or(text.len());
    &text[from..to]
}

/// Shorten `text` to `max_chars` characters, appending "..." when cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
