use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use super::client::CompletionError;
use super::lifecycle::{NoteLifecycle, NoteRequest, NoteSettings};
use crate::annotation::{AnchorRef, NoteAnchor, ParagraphId};

/// Live note lifecycles keyed by paragraph and anchor, mounted and
/// unmounted to mirror the anchor stores.
#[derive(Debug, Default)]
pub struct NoteRegistry {
    notes: HashMap<AnchorRef, NoteLifecycle>,
    settings: NoteSettings,
}

impl NoteRegistry {
    pub fn new(settings: NoteSettings) -> Self {
        Self { notes: HashMap::new(), settings }
    }

    /// Reconcile one paragraph's lifecycles with its live notes (each paired
    /// with its highlighted text). New notes start, changed notes restart,
    /// and notes that disappeared are cancelled and dropped.
    pub fn sync(
        &mut self,
        paragraph: ParagraphId,
        live: &[(&NoteAnchor, String)],
        now: Instant,
    ) -> Vec<(AnchorRef, NoteRequest)> {
        let mut requests = Vec::new();

        self.notes.retain(|key, lifecycle| {
            let keep = key.paragraph != paragraph || live.iter().any(|(n, _)| n.id == key.anchor);
            if !keep {
                lifecycle.cancel();
                debug!(anchor = %key.anchor, "unmounted note");
            }
            keep
        });

        for (note, highlighted) in live {
            let key = AnchorRef { paragraph, anchor: note.id };
            match self.notes.get_mut(&key) {
                Some(lifecycle) => {
                    if let Some(request) = lifecycle.restart(note, highlighted, now) {
                        requests.push((key, request));
                    }
                }
                None => {
                    let mut lifecycle = NoteLifecycle::new(note, highlighted.clone(), self.settings.clone());
                    if let Some(request) = lifecycle.start(now) {
                        requests.push((key, request));
                    }
                    self.notes.insert(key, lifecycle);
                }
            }
        }

        requests
    }

    pub fn unmount(&mut self, key: AnchorRef) {
        if let Some(mut lifecycle) = self.notes.remove(&key) {
            lifecycle.cancel();
        }
    }

    pub fn get(&self, key: AnchorRef) -> Option<&NoteLifecycle> {
        self.notes.get(&key)
    }

    pub fn on_response(
        &mut self,
        key: AnchorRef,
        generation: u64,
        result: Result<String, CompletionError>,
        now: Instant,
    ) -> bool {
        match self.notes.get_mut(&key) {
            Some(lifecycle) => lifecycle.on_response(generation, result, now),
            None => {
                debug!(anchor = %key.anchor, "reply for unmounted note");
                false
            }
        }
    }

    pub fn retry(&mut self, key: AnchorRef, now: Instant) -> Option<NoteRequest> {
        self.notes.get_mut(&key)?.retry(now)
    }

    /// Advance every lifecycle; true when any of them changed phase.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.notes.values_mut().fold(false, |changed, lc| lc.tick(now) || changed)
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.notes.values().any(|lc| lc.is_animating(now))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnchorId, NoteType, Selection};
    use crate::note::lifecycle::NotePhase;
    use std::time::Duration;

    fn note(id: u64, note_type: NoteType) -> NoteAnchor {
        NoteAnchor {
            id: AnchorId(id),
            selection: Selection { start: 0, end: 3 },
            note_type,
            question: String::new(),
        }
    }

    fn key(p: usize, a: u64) -> AnchorRef {
        AnchorRef { paragraph: ParagraphId(p), anchor: AnchorId(a) }
    }

    #[test]
    fn test_sync_mounts_and_requests_once() {
        let mut registry = NoteRegistry::default();
        let explain = note(1, NoteType::Explain);
        let blank = note(2, NoteType::Blank);
        let t0 = Instant::now();

        let live = [(&explain, "AWS".to_string()), (&blank, "Lex".to_string())];
        let requests = registry.sync(ParagraphId(0), &live, t0);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, key(0, 1));
        assert_eq!(registry.len(), 2);

        assert!(registry.sync(ParagraphId(0), &live, t0).is_empty());
    }

    #[test]
    fn test_sync_unmounts_missing_notes_of_that_paragraph_only() {
        let mut registry = NoteRegistry::default();
        let a = note(1, NoteType::Blank);
        let t0 = Instant::now();
        registry.sync(ParagraphId(0), &[(&a, "AWS".to_string())], t0);
        registry.sync(ParagraphId(1), &[(&a, "AWS".to_string())], t0);

        registry.sync(ParagraphId(0), &[], t0);
        assert!(registry.get(key(0, 1)).is_none());
        assert!(registry.get(key(1, 1)).is_some());
    }

    #[test]
    fn test_reply_after_unmount_is_dropped() {
        let mut registry = NoteRegistry::default();
        let a = note(1, NoteType::Explain);
        let t0 = Instant::now();
        let requests = registry.sync(ParagraphId(0), &[(&a, "AWS".to_string())], t0);
        let generation = requests[0].1.generation;

        registry.unmount(key(0, 1));
        assert!(!registry.on_response(key(0, 1), generation, Ok("late".to_string()), t0));
    }

    #[test]
    fn test_tick_and_retry() {
        let mut registry = NoteRegistry::new(NoteSettings { min_display: Duration::ZERO, ..NoteSettings::default() });
        let a = note(1, NoteType::Explain);
        let t0 = Instant::now();
        let requests = registry.sync(ParagraphId(0), &[(&a, "AWS".to_string())], t0);
        let generation = requests[0].1.generation;

        registry.on_response(key(0, 1), generation, Err(CompletionError::Status(502)), t0);
        assert_eq!(registry.get(key(0, 1)).unwrap().phase(), NotePhase::Error);

        let retry = registry.retry(key(0, 1), t0).unwrap();
        registry.on_response(key(0, 1), retry.generation, Ok("fine".to_string()), t0);
        assert!(registry.is_animating(t0));

        assert!(registry.tick(t0 + Duration::from_secs(5)));
        assert_eq!(registry.get(key(0, 1)).unwrap().phase(), NotePhase::Ready);
    }
}
