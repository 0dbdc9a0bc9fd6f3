//! Ask sessions
//!
//! Questions typed into the ask panel or the bottom bar. Anchored questions
//! live in their `AskAnchor`'s chat history; free-form ones from the bottom
//! bar keep their own transcript here.

use crate::annotation::{AnchorRef, ChatMessage};

pub const ASK_PLACEHOLDER: &str = "Turn curiosity into knowledge. Ask anything....";

/// Longest question the input accepts, in characters.
pub const MAX_TEXT_LENGTH: usize = 250;
/// Words a question needs before it can be sent.
pub const REQUIRED_WORD_COUNT: usize = 2;

/// Where a question's answer should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AskTarget {
    Anchor(AnchorRef),
    Free,
}

/// Single-line text input with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskInput {
    text: String,
    cursor: usize,
}

impl AskInput {
    #[cfg(test)]
    pub fn with_seed(seed: &str) -> Self {
        let mut input = Self::default();
        input.set(seed);
        input
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[cfg(test)]
    pub fn set(&mut self, text: &str) {
        self.text.clear();
        self.cursor = 0;
        self.insert_str(text);
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Characters left before the input is full.
    pub fn remaining(&self) -> usize {
        MAX_TEXT_LENGTH.saturating_sub(self.char_count())
    }

    /// Within the last fifth of the limit.
    pub fn is_near_limit(&self) -> bool {
        self.remaining() <= MAX_TEXT_LENGTH / 5
    }

    /// Whether the trimmed text has enough words to send.
    pub fn can_send(&self) -> bool {
        self.text.split_whitespace().count() >= REQUIRED_WORD_COUNT
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.text.char_indices().nth(char_idx).map(|(i, _)| i).unwrap_or(self.text.len())
    }

    /// Insert at the cursor. Returns false once the input is full.
    pub fn insert_char(&mut self, c: char) -> bool {
        if self.remaining() == 0 {
            return false;
        }
        let idx = self.byte_index(self.cursor);
        self.text.insert(idx, c);
        self.cursor += 1;
        true
    }

    /// Insert pasted text at the cursor. Line breaks become spaces, other
    /// control characters are dropped, and whatever exceeds the limit is cut.
    pub fn insert_str(&mut self, text: &str) -> usize {
        let mut inserted = 0;
        for c in text.chars() {
            let c = if c == '\n' { ' ' } else { c };
            if c.is_control() {
                continue;
            }
            if !self.insert_char(c) {
                break;
            }
            inserted += 1;
        }
        inserted
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index(self.cursor);
        self.text.remove(idx);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.text.remove(idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Take the trimmed question, leaving the input empty. Blank input is
    /// left untouched.
    pub fn take(&mut self) -> Option<String> {
        let question = self.text.trim();
        if question.is_empty() {
            return None;
        }
        let question = question.to_string();
        self.text.clear();
        self.cursor = 0;
        Some(question)
    }
}

/// Prompt sent for a question, quoting the passage it is anchored to.
pub fn compose_prompt(context: Option<&str>, question: &str) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("About this passage: \"{context}\"\n\n{question}"),
        None => question.to_string(),
    }
}

/// In-flight questions, the free transcript, and the last failure.
#[derive(Debug, Default)]
pub struct AskSessions {
    free_history: Vec<ChatMessage>,
    pending: Vec<AskTarget>,
    error: Option<(AskTarget, String)>,
}

impl AskSessions {
    pub fn begin(&mut self, target: AskTarget, question: &str) {
        if target == AskTarget::Free {
            self.free_history.push(ChatMessage::user(question));
        }
        if self.error.as_ref().map(|(t, _)| *t == target).unwrap_or(false) {
            self.error = None;
        }
        self.pending.push(target);
    }

    /// Record the outcome of a question. Free answers go to the free
    /// transcript; anchored answers are returned for the caller to store.
    pub fn finish(&mut self, target: AskTarget, result: Result<String, String>) -> Option<ChatMessage> {
        if let Some(pos) = self.pending.iter().position(|t| *t == target) {
            self.pending.remove(pos);
        }
        match result {
            Ok(answer) => {
                let message = ChatMessage::ai(answer);
                if target == AskTarget::Free {
                    self.free_history.push(message);
                    None
                } else {
                    Some(message)
                }
            }
            Err(reason) => {
                self.error = Some((target, reason));
                None
            }
        }
    }

    pub fn is_pending(&self, target: AskTarget) -> bool {
        self.pending.contains(&target)
    }

    pub fn any_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn error_for(&self, target: AskTarget) -> Option<&str> {
        match &self.error {
            Some((t, reason)) if *t == target => Some(reason),
            _ => None,
        }
    }

    pub fn free_history(&self) -> &[ChatMessage] {
        &self.free_history
    }

    /// Forget an anchored session's pending state once its anchor is gone.
    pub fn forget(&mut self, anchor: AnchorRef) {
        let target = AskTarget::Anchor(anchor);
        self.pending.retain(|t| *t != target);
        if self.error.as_ref().map(|(t, _)| *t == target).unwrap_or(false) {
            self.error = None;
        }
    }
}
