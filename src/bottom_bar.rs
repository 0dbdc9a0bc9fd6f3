/// Modes of the persistent bar at the bottom of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BottomBarMode {
    #[default]
    Navigation,
    Ask,
    Chat,
    Progress,
}

impl BottomBarMode {
    pub fn label(&self) -> &'static str {
        match self {
            BottomBarMode::Navigation => "NAV",
            BottomBarMode::Ask => "ASK",
            BottomBarMode::Chat => "CHAT",
            BottomBarMode::Progress => "PROGRESS",
        }
    }
}

/// Flat state machine: every transition is legal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BottomBar {
    mode: BottomBarMode,
    /// Passage quoted above the ask input, set by `open_ask`.
    seed: String,
}

impl BottomBar {
    pub fn mode(&self) -> BottomBarMode {
        self.mode
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    #[cfg(test)]
    pub fn set_mode(&mut self, mode: BottomBarMode) {
        self.mode = mode;
    }

    pub fn open_ask(&mut self, seed: Option<&str>) {
        self.mode = BottomBarMode::Ask;
        self.seed = seed.unwrap_or_default().to_string();
    }

    pub fn open_chat(&mut self) {
        self.mode = BottomBarMode::Chat;
    }

    pub fn open_progress(&mut self) {
        self.mode = BottomBarMode::Progress;
    }

    pub fn open_navigation(&mut self) {
        self.mode = BottomBarMode::Navigation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_in_navigation() {
        let bar = BottomBar::default();
        assert_eq!(bar.mode(), BottomBarMode::Navigation);
        assert_eq!(bar.seed(), "");
    }

    #[test]
    fn test_open_ask_stores_seed() {
        let mut bar = BottomBar::default();
        bar.open_ask(Some("AWS Lex"));
        assert_eq!(bar.mode(), BottomBarMode::Ask);
        assert_eq!(bar.seed(), "AWS Lex");

        bar.open_ask(None);
        assert_eq!(bar.seed(), "");
    }

    #[test]
    fn test_any_transition_is_legal() {
        let mut bar = BottomBar::default();
        bar.open_progress();
        bar.open_chat();
        assert_eq!(bar.mode(), BottomBarMode::Chat);
        bar.set_mode(BottomBarMode::Progress);
        bar.open_navigation();
        assert_eq!(bar.mode(), BottomBarMode::Navigation);
    }
}
