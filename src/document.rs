//! The loaded lesson: an ordered list of immutable paragraphs, each owning
//! the anchors made on it.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::annotation::{char_slice, Anchor, AnchorRef, AnchorStore, ParagraphId, Selection};

/// Average silent reading speed used for the reading-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

const SAMPLE_TITLE: &str = "Build a chatbot with AWS LEX";

const SAMPLE_PARAGRAPHS: &[&str] = &[
    "Let's create your very own banking chatbot, the BankerBot! This project is going to supercharge your skills in Amazon Lex and AWS Lambda, giving you the power to build something interactive and practical.",
    "Amazon Lex is a tool that helps you create programs that can talk or chat with people, just like Siri or Alexa. It understands what people say or type and helps the program respond in a useful way.",
    "This means an Amazon Lex chatbot doesn't just respond, but also uses AI/ML to understand the user's goals and processes requests about their bank balances and transactions. You can even converse with your BankerBot using voice commands!",
    "AWS Lex helps you build chatbots that improve customer interactions. It uses Natural Language Processing to understand what users say, while Intent Recognition identifies their needs. Slot Filling keeps conversations flowing smoothly, and Voice Interaction lets users chat using their voice with AWS Polly. Plus, Analytics tracks interactions to boost performance, and smart Deployment strategies ensure your bot can scale effectively. Together, these features create engaging and efficient conversational agents.",
    "When you're using Amazon Lex to build a chatbot, this threshold is like a minimum score for your chatbot to confidently understand what the user is trying to say. Setting this to 0.4 means that your chatbot needs to be at least 40% confident that it understands what the user is asking to be able to give a response. So if a user's input is ambiguous and your chatbot's confidence score is below 0.4, it'll throw an error message. You'll see how this works in a bit!",
    "How much support and guidance do you want? There are two ✌️ equally awesome ways to can complete your project.",
    "• Edit the first page - [Your Full Name] with your name!\n• Check out the final slide, which is a template for tracking errors - keep in mind that documenting errors is a fantastic way to show your problem solving skills! Keep this slide in mind if you ever run into an error, and make sure to add in some screenshots and explanations as you go.",
];

#[derive(Debug, Clone)]
pub struct Paragraph {
    pub id: ParagraphId,
    pub text: String,
    pub store: AnchorStore,
}

impl Paragraph {
    pub fn new(id: ParagraphId, text: impl Into<String>, removal_delay: Duration) -> Self {
        let text = text.into();
        let store = AnchorStore::with_removal_delay(text.chars().count(), removal_delay);
        Self { id, text, store }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn slice(&self, range: Selection) -> &str {
        char_slice(&self.text, range.start, range.end)
    }
}

/// Reading statistics shown by the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingProgress {
    pub words: usize,
    pub minutes: usize,
    pub percent_read: u16,
    pub anchors: usize,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    paragraphs: Vec<Paragraph>,
    /// Paragraph owning the pending selection.
    active: Option<ParagraphId>,
}

impl Document {
    pub fn sample(removal_delay: Duration) -> Self {
        Self::build(SAMPLE_TITLE.to_string(), SAMPLE_PARAGRAPHS.iter().map(|p| p.to_string()), removal_delay)
    }

    /// Parse plain text: paragraphs are separated by blank lines, and a first
    /// line starting with `# ` is the title.
    pub fn from_text(text: &str, fallback_title: &str, removal_delay: Duration) -> Self {
        let mut title = fallback_title.to_string();
        let mut body = text;
        if let Some(first) = text.lines().next() {
            if let Some(heading) = first.strip_prefix("# ") {
                title = heading.trim().to_string();
                body = &text[first.len()..];
            }
        }

        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in body.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line.trim_end());
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join("\n"));
        }

        Self::build(title, paragraphs.into_iter(), removal_delay)
    }

    pub fn load(path: &Path, removal_delay: Duration) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string());
        Ok(Self::from_text(&text, &fallback, removal_delay))
    }

    fn build(title: String, texts: impl Iterator<Item = String>, removal_delay: Duration) -> Self {
        let paragraphs = texts
            .enumerate()
            .map(|(idx, text)| Paragraph::new(ParagraphId(idx), text, removal_delay))
            .collect();
        Self { title, paragraphs, active: None }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraph(&self, id: ParagraphId) -> Option<&Paragraph> {
        self.paragraphs.get(id.0)
    }

    pub fn paragraph_mut(&mut self, id: ParagraphId) -> Option<&mut Paragraph> {
        self.paragraphs.get_mut(id.0)
    }

    pub fn anchor(&self, at: AnchorRef) -> Option<&Anchor> {
        self.paragraph(at.paragraph)?.store.anchor(at.anchor)
    }

    #[cfg(test)]
    pub fn active_paragraph(&self) -> Option<ParagraphId> {
        self.active
    }

    /// Give `paragraph` the pending selection; every other paragraph loses
    /// its own.
    pub fn set_pending_selection(&mut self, paragraph: ParagraphId, selection: Option<Selection>) {
        for p in &mut self.paragraphs {
            if p.id == paragraph {
                p.store.set_pending_selection(selection);
            } else {
                p.store.clear_pending_selection();
            }
        }
        self.active = self.paragraph(paragraph).map(|p| p.id);
    }

    pub fn clear_pending_selection(&mut self) {
        for p in &mut self.paragraphs {
            p.store.clear_pending_selection();
        }
        self.active = None;
    }

    /// The active paragraph and its pending range.
    pub fn pending(&self) -> Option<(ParagraphId, Selection)> {
        let id = self.active?;
        let range = self.paragraph(id)?.store.pending_selection()?;
        Some((id, range))
    }

    /// Clear the active highlight everywhere but in `keep`.
    pub fn set_active_anchor(&mut self, keep: Option<AnchorRef>) {
        for p in &mut self.paragraphs {
            match keep {
                Some(at) if at.paragraph == p.id => p.store.set_active(Some(at.anchor)),
                _ => p.store.set_active(None),
            }
        }
    }

    pub fn purge_expired(&mut self, now: Instant) -> Vec<AnchorRef> {
        self.paragraphs
            .iter_mut()
            .flat_map(|p| {
                let paragraph = p.id;
                p.store
                    .purge_expired(now)
                    .into_iter()
                    .map(move |anchor| AnchorRef { paragraph, anchor })
            })
            .collect()
    }

    pub fn next_removal_deadline(&self) -> Option<Instant> {
        self.paragraphs.iter().filter_map(|p| p.store.next_removal_deadline()).min()
    }

    pub fn word_count(&self) -> usize {
        self.paragraphs.iter().map(Paragraph::word_count).sum()
    }

    pub fn anchor_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.store.len()).sum()
    }

    pub fn progress(&self, fraction_read: f64) -> ReadingProgress {
        let words = self.word_count();
        ReadingProgress {
            words,
            minutes: words.div_ceil(WORDS_PER_MINUTE).max(1),
            percent_read: (fraction_read.clamp(0.0, 1.0) * 100.0).round() as u16,
            anchors: self.anchor_count(),
        }
    }
}
