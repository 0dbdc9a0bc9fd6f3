use std::time::{Duration, Instant};

pub const DEFAULT_CHAR_INTERVAL: Duration = Duration::from_millis(12);
pub const DEFAULT_LINE_DELAY: Duration = Duration::from_millis(200);

/// Character-by-character reveal of a list of lines, one line at a time.
///
/// The first character of a line shows as soon as the line starts, each
/// further character after `char_interval`, and the next line starts
/// `line_delay` after the previous one completed. The reveal is a pure
/// function of the elapsed time, so a frame can sample it at any instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Typewriter {
    lines: Vec<String>,
    /// Offset from `started` at which each line begins.
    starts: Vec<Duration>,
    started: Instant,
    char_interval: Duration,
    finish: Duration,
}

impl Typewriter {
    pub fn new(lines: Vec<String>, started: Instant, char_interval: Duration, line_delay: Duration) -> Self {
        let mut starts = Vec::with_capacity(lines.len());
        let mut at = Duration::ZERO;
        let mut finish = Duration::ZERO;
        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                at = finish + line_delay;
            }
            starts.push(at);
            let steps = line.chars().count().saturating_sub(1) as u32;
            finish = at + char_interval * steps;
        }
        Self { lines, starts, started, char_interval, finish }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn finishes_at(&self) -> Instant {
        self.started + self.finish
    }

    pub fn is_done(&self, now: Instant) -> bool {
        now >= self.finishes_at()
    }

    fn visible_chars(&self, idx: usize, elapsed: Duration) -> Option<usize> {
        let start = *self.starts.get(idx)?;
        if elapsed < start {
            return None;
        }
        let total = self.lines[idx].chars().count();
        let ticks = if self.char_interval.is_zero() {
            total
        } else {
            ((elapsed - start).as_nanos() / self.char_interval.as_nanos()) as usize
        };
        Some(total.min(ticks + 1))
    }

    /// Revealed prefix of every line that has started by `now`.
    pub fn visible(&self, now: Instant) -> Vec<&str> {
        if now < self.started {
            return Vec::new();
        }
        let elapsed = now.saturating_duration_since(self.started);
        (0..self.lines.len())
            .map_while(|idx| {
                let chars = self.visible_chars(idx, elapsed)?;
                let line = &self.lines[idx];
                let end = line.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(line.len());
                Some(&line[..end])
            })
            .collect()
    }
}
