use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::client::CompletionError;
use super::prompt::{self, ERROR_MESSAGE};
use super::reveal::{Typewriter, DEFAULT_CHAR_INTERVAL, DEFAULT_LINE_DELAY};
use crate::annotation::{AnchorId, NoteAnchor, NoteType};

pub const DEFAULT_MIN_DISPLAY: Duration = Duration::from_millis(6500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotePhase {
    Idle,
    /// Request in flight, placeholder typing.
    Loading,
    /// Reply received; waiting for the minimum display time and the
    /// placeholder reveal.
    StreamingReveal,
    Ready,
    Error,
}

/// Timing and prompt knobs shared by every note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSettings {
    pub min_display: Duration,
    pub char_interval: Duration,
    pub line_delay: Duration,
    pub learner: String,
}

impl Default for NoteSettings {
    fn default() -> Self {
        Self {
            min_display: DEFAULT_MIN_DISPLAY,
            char_interval: DEFAULT_CHAR_INTERVAL,
            line_delay: DEFAULT_LINE_DELAY,
            learner: prompt::DEFAULT_LEARNER.to_string(),
        }
    }
}

/// A completion to dispatch on behalf of a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRequest {
    pub generation: u64,
    pub prompt: String,
}

/// What a note card should draw at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteView<'a> {
    Loading {
        header: &'static str,
        lines: Vec<&'a str>,
        /// The thinking indicator has been reached.
        thinking: bool,
    },
    Error {
        message: &'a str,
    },
    Ready {
        banner: &'static str,
        /// Bullets typed so far; all of them once the reveal is done.
        bullets: Vec<&'a str>,
        content: &'a str,
        revealing: bool,
    },
}

/// Fetch and reveal state machine for one note anchor.
#[derive(Debug, Clone)]
pub struct NoteLifecycle {
    anchor_id: AnchorId,
    note_type: NoteType,
    highlighted: String,
    question: String,
    settings: NoteSettings,

    phase: NotePhase,
    /// Bumped on every (re)start and cancel; replies carrying an older value
    /// are dropped.
    generation: u64,
    retry_count: u32,

    min_display_until: Option<Instant>,
    placeholder: Option<Typewriter>,
    content: Option<String>,
    bullets: Vec<String>,
    result_reveal: Option<Typewriter>,
    error: Option<String>,
}

impl NoteLifecycle {
    pub fn new(note: &NoteAnchor, highlighted: impl Into<String>, settings: NoteSettings) -> Self {
        Self {
            anchor_id: note.id,
            note_type: note.note_type,
            highlighted: highlighted.into(),
            question: note.question.clone(),
            settings,
            phase: NotePhase::Idle,
            generation: 0,
            retry_count: 0,
            min_display_until: None,
            placeholder: None,
            content: None,
            bullets: Vec::new(),
            result_reveal: None,
            error: None,
        }
    }

    /// Mount: `Idle -> Loading`, or straight to `Ready` for blank notes.
    pub fn start(&mut self, now: Instant) -> Option<NoteRequest> {
        self.reset();
        if self.note_type.is_blank() {
            self.phase = NotePhase::Ready;
            self.content = Some(String::new());
            self.result_reveal = Some(self.typewriter(Vec::new(), now));
            debug!(anchor = %self.anchor_id, "blank note ready");
            return None;
        }
        self.begin_loading(now)
    }

    fn begin_loading(&mut self, now: Instant) -> Option<NoteRequest> {
        self.generation += 1;
        self.phase = NotePhase::Loading;
        self.min_display_until = Some(now + self.settings.min_display);
        self.placeholder = Some(self.typewriter(
            prompt::placeholder_lines(self.note_type, &self.highlighted),
            now,
        ));

        match prompt::build_prompt(self.note_type, &self.highlighted, &self.settings.learner) {
            Some(prompt) => {
                debug!(anchor = %self.anchor_id, generation = self.generation, "note request");
                Some(NoteRequest { generation: self.generation, prompt })
            }
            None => {
                // Nothing to ask about; resolve with empty content.
                self.content = Some(String::new());
                self.phase = NotePhase::StreamingReveal;
                None
            }
        }
    }

    fn typewriter(&self, lines: Vec<String>, now: Instant) -> Typewriter {
        Typewriter::new(lines, now, self.settings.char_interval, self.settings.line_delay)
    }

    fn reset(&mut self) {
        self.phase = NotePhase::Idle;
        self.min_display_until = None;
        self.placeholder = None;
        self.content = None;
        self.bullets.clear();
        self.result_reveal = None;
        self.error = None;
    }

    /// Deliver a completion. Replies for an older generation, or arriving
    /// outside `Loading`, are ignored. Returns whether state changed.
    pub fn on_response(
        &mut self,
        generation: u64,
        result: Result<String, CompletionError>,
        now: Instant,
    ) -> bool {
        if generation != self.generation || self.phase != NotePhase::Loading {
            debug!(anchor = %self.anchor_id, generation, current = self.generation, "dropping stale note reply");
            return false;
        }
        match result {
            Ok(text) => {
                self.bullets = prompt::parse_bullets(&text);
                self.content = Some(text);
                self.phase = NotePhase::StreamingReveal;
                self.tick(now);
            }
            Err(err) => {
                warn!(anchor = %self.anchor_id, error = %err, "note generation failed");
                self.phase = NotePhase::Error;
                self.error = Some(ERROR_MESSAGE.to_string());
                self.min_display_until = None;
                self.placeholder = None;
            }
        }
        true
    }

    /// Advance timers. `StreamingReveal -> Ready` once the minimum display
    /// time has passed and the placeholder is fully typed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.phase != NotePhase::StreamingReveal {
            return false;
        }
        let min_elapsed = self.min_display_until.map(|at| now >= at).unwrap_or(true);
        let revealed = self.placeholder.as_ref().map(|p| p.is_done(now)).unwrap_or(true);
        if !(min_elapsed && revealed) {
            return false;
        }

        self.phase = NotePhase::Ready;
        self.min_display_until = None;
        self.placeholder = None;
        self.result_reveal = Some(self.typewriter(self.bullets.clone(), now));
        debug!(anchor = %self.anchor_id, bullets = self.bullets.len(), "note ready");
        true
    }

    /// Re-enter `Loading` after an error.
    pub fn retry(&mut self, now: Instant) -> Option<NoteRequest> {
        if self.phase != NotePhase::Error {
            return None;
        }
        self.retry_count += 1;
        debug!(anchor = %self.anchor_id, attempt = self.retry_count, "retrying note");
        self.reset();
        self.begin_loading(now)
    }

    /// Start over when the anchor's inputs changed. Returns `None` without
    /// touching state when they did not.
    pub fn restart(&mut self, note: &NoteAnchor, highlighted: &str, now: Instant) -> Option<NoteRequest> {
        if note.note_type == self.note_type
            && highlighted == self.highlighted
            && note.question == self.question
        {
            return None;
        }
        self.cancel();
        self.note_type = note.note_type;
        self.highlighted = highlighted.to_string();
        self.question = note.question.clone();
        self.start(now)
    }

    /// Drop all deadlines and invalidate any request in flight.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.reset();
    }

    /// Whether the card changes over time and needs frequent redraws.
    pub fn is_animating(&self, now: Instant) -> bool {
        match self.phase {
            NotePhase::Loading | NotePhase::StreamingReveal => true,
            NotePhase::Ready => self.result_reveal.as_ref().map(|r| !r.is_done(now)).unwrap_or(false),
            NotePhase::Idle | NotePhase::Error => false,
        }
    }

    pub fn view(&self, now: Instant) -> Option<NoteView<'_>> {
        match self.phase {
            NotePhase::Idle => None,
            NotePhase::Loading | NotePhase::StreamingReveal => {
                let (lines, thinking) = match &self.placeholder {
                    Some(p) => {
                        let mut lines = p.visible(now);
                        let total = p.lines().len();
                        let thinking = total > 0 && lines.len() == total;
                        if thinking {
                            lines.pop();
                        }
                        (lines, thinking)
                    }
                    None => (Vec::new(), true),
                };
                Some(NoteView::Loading { header: prompt::loading_header(self.note_type), lines, thinking })
            }
            NotePhase::Error => Some(NoteView::Error { message: self.error.as_deref().unwrap_or(ERROR_MESSAGE) }),
            NotePhase::Ready => {
                let (bullets, revealing) = match &self.result_reveal {
                    Some(r) => (r.visible(now), !r.is_done(now)),
                    None => (self.bullets.iter().map(String::as_str).collect(), false),
                };
                Some(NoteView::Ready {
                    banner: prompt::banner_label(self.note_type),
                    bullets,
                    content: self.content.as_deref().unwrap_or(""),
                    revealing,
                })
            }
        }
    }
}

// State inspection for tests; rendering goes through `view`.
#[cfg(test)]
impl NoteLifecycle {
    pub fn note_type(&self) -> NoteType {
        self.note_type
    }

    pub fn phase(&self) -> NotePhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn bullets(&self) -> &[String] {
        &self.bullets
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Selection;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn note(note_type: NoteType) -> NoteAnchor {
        NoteAnchor {
            id: AnchorId(1),
            selection: Selection { start: 4, end: 7 },
            note_type,
            question: String::new(),
        }
    }

    fn lifecycle(note_type: NoteType) -> NoteLifecycle {
        NoteLifecycle::new(&note(note_type), "Lex", NoteSettings::default())
    }

    fn placeholder_finish(lc: &NoteLifecycle) -> Instant {
        lc.placeholder.as_ref().unwrap().finishes_at()
    }

    #[test]
    fn test_start_issues_request() {
        let mut lc = lifecycle(NoteType::Explain);
        let req = lc.start(Instant::now()).unwrap();

        assert_eq!(lc.phase(), NotePhase::Loading);
        assert_eq!(req.generation, lc.generation());
        assert!(req.prompt.ends_with("Concept: Lex"));
    }

    #[test]
    fn test_blank_is_ready_without_request() {
        let mut lc = lifecycle(NoteType::Blank);
        let t0 = Instant::now();
        assert_eq!(lc.start(t0), None);
        assert_eq!(lc.phase(), NotePhase::Ready);
        assert!(lc.bullets().is_empty());
        assert!(!lc.is_animating(t0));
    }

    #[test]
    fn test_join_waits_for_min_display() {
        let mut lc = lifecycle(NoteType::Explain);
        let t0 = Instant::now();
        let req = lc.start(t0).unwrap();

        assert!(placeholder_finish(&lc) < t0 + ms(2000));

        lc.tick(t0 + ms(1000));
        assert_eq!(lc.phase(), NotePhase::Loading);

        lc.on_response(req.generation, Ok("- one\n- two".to_string()), t0 + ms(2000));
        assert_eq!(lc.phase(), NotePhase::StreamingReveal);

        lc.tick(t0 + ms(6499));
        assert_ne!(lc.phase(), NotePhase::Ready);

        assert!(lc.tick(t0 + ms(6500)));
        assert_eq!(lc.phase(), NotePhase::Ready);
        assert_eq!(lc.bullets(), &["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_join_waits_for_slow_reply() {
        let mut lc = lifecycle(NoteType::Example);
        let t0 = Instant::now();
        let req = lc.start(t0).unwrap();

        lc.tick(t0 + ms(9000));
        assert_eq!(lc.phase(), NotePhase::Loading);

        lc.on_response(req.generation, Ok("Chatbots for support desks.".to_string()), t0 + ms(9000));
        assert_eq!(lc.phase(), NotePhase::Ready);
    }

    #[test]
    fn test_join_waits_for_placeholder_reveal() {
        let settings = NoteSettings { min_display: ms(10), ..NoteSettings::default() };
        let mut lc = NoteLifecycle::new(&note(NoteType::Simplify), "Lex", settings);
        let t0 = Instant::now();
        let req = lc.start(t0).unwrap();
        let finish = placeholder_finish(&lc);

        lc.on_response(req.generation, Ok("Simple.".to_string()), t0 + ms(20));
        assert_eq!(lc.phase(), NotePhase::StreamingReveal);

        lc.tick(finish - ms(1));
        assert_eq!(lc.phase(), NotePhase::StreamingReveal);
        lc.tick(finish);
        assert_eq!(lc.phase(), NotePhase::Ready);
    }

    #[test]
    fn test_error_then_retry() {
        let mut lc = lifecycle(NoteType::Explain);
        let t0 = Instant::now();
        let req = lc.start(t0).unwrap();

        lc.on_response(req.generation, Err(CompletionError::MissingReply), t0 + ms(100));
        assert_eq!(lc.phase(), NotePhase::Error);
        assert_eq!(lc.error(), Some(ERROR_MESSAGE));
        assert_eq!(lc.view(t0 + ms(100)), Some(NoteView::Error { message: ERROR_MESSAGE }));

        let again = lc.retry(t0 + ms(200)).unwrap();
        assert_eq!(lc.phase(), NotePhase::Loading);
        assert_eq!(lc.retry_count(), 1);
        assert!(again.generation > req.generation);
        assert_eq!(lc.error(), None);
    }

    #[test]
    fn test_retry_only_from_error() {
        let mut lc = lifecycle(NoteType::Explain);
        lc.start(Instant::now());
        assert_eq!(lc.retry(Instant::now()), None);
        assert_eq!(lc.retry_count(), 0);
    }

    #[test]
    fn test_stale_reply_ignored() {
        let mut lc = lifecycle(NoteType::Explain);
        let t0 = Instant::now();
        let first = lc.start(t0).unwrap();
        lc.on_response(first.generation, Err(CompletionError::MissingReply), t0);
        lc.retry(t0);

        assert!(!lc.on_response(first.generation, Ok("late".to_string()), t0 + ms(10)));
        assert_eq!(lc.phase(), NotePhase::Loading);
        assert_eq!(lc.content(), None);
    }

    #[test]
    fn test_cancel_drops_in_flight_reply() {
        let mut lc = lifecycle(NoteType::Explain);
        let t0 = Instant::now();
        let req = lc.start(t0).unwrap();
        lc.cancel();

        assert_eq!(lc.phase(), NotePhase::Idle);
        assert!(!lc.on_response(req.generation, Ok("late".to_string()), t0 + ms(10)));
        assert!(!lc.is_animating(t0 + ms(10)));
    }

    #[test]
    fn test_restart_on_type_change() {
        let mut lc = lifecycle(NoteType::Explain);
        let t0 = Instant::now();
        let first = lc.start(t0).unwrap();

        assert_eq!(lc.restart(&note(NoteType::Explain), "Lex", t0), None);

        let second = lc.restart(&note(NoteType::Simplify), "Lex", t0).unwrap();
        assert!(second.generation > first.generation);
        assert!(second.prompt.starts_with("Simplify"));
        assert_eq!(lc.note_type(), NoteType::Simplify);
    }

    #[test]
    fn test_loading_view_reaches_thinking() {
        let mut lc = lifecycle(NoteType::Explain);
        let t0 = Instant::now();
        lc.start(t0);

        match lc.view(t0) {
            Some(NoteView::Loading { header, lines, thinking }) => {
                assert_eq!(header, "Deepening your knowledge...");
                assert_eq!(lines, vec!["H"]);
                assert!(!thinking);
            }
            other => panic!("unexpected view {other:?}"),
        }

        let finish = placeholder_finish(&lc);
        match lc.view(finish) {
            Some(NoteView::Loading { lines, thinking, .. }) => {
                assert_eq!(lines.len(), 2);
                assert!(thinking);
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn test_ready_reveals_bullets() {
        let settings = NoteSettings { min_display: Duration::ZERO, ..NoteSettings::default() };
        let mut lc = NoteLifecycle::new(&note(NoteType::Explain), "Lex", settings);
        let t0 = Instant::now();
        let req = lc.start(t0).unwrap();
        let ready_at = placeholder_finish(&lc);
        lc.on_response(req.generation, Ok("1. Alpha\n2. Beta".to_string()), ready_at);
        assert_eq!(lc.phase(), NotePhase::Ready);
        assert!(lc.is_animating(ready_at));

        match lc.view(ready_at) {
            Some(NoteView::Ready { banner, bullets, revealing, .. }) => {
                assert_eq!(banner, "Concept Explained");
                assert_eq!(bullets, vec!["A"]);
                assert!(revealing);
            }
            other => panic!("unexpected view {other:?}"),
        }

        let done = ready_at + ms(1000);
        match lc.view(done) {
            Some(NoteView::Ready { bullets, revealing, .. }) => {
                assert_eq!(bullets, vec!["Alpha", "Beta"]);
                assert!(!revealing);
            }
            other => panic!("unexpected view {other:?}"),
        }
        assert!(!lc.is_animating(done));
    }
}
