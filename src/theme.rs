use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::annotation::NoteType;
use crate::config::DEFAULT_THEME;

// ============================================================================
// Theme File Format (TOML parsing structures)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThemeFile {
    #[serde(default)]
    pub base: BaseColors,
    #[serde(default)]
    pub accent: AccentColors,
    #[serde(default)]
    pub semantic: SemanticColors,
    #[serde(default)]
    pub ui: UiColorsFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseColors {
    #[serde(default = "defaults::background")]
    pub background: String,
    #[serde(default = "defaults::background_secondary")]
    pub background_secondary: String,
    #[serde(default = "defaults::foreground")]
    pub foreground: String,
    #[serde(default = "defaults::muted")]
    pub muted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccentColors {
    #[serde(default = "defaults::primary")]
    pub primary: String,
    #[serde(default = "defaults::secondary")]
    pub secondary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticColors {
    #[serde(default = "defaults::error")]
    pub error: String,
    #[serde(default = "defaults::warning")]
    pub warning: String,
    #[serde(default = "defaults::success")]
    pub success: String,
    #[serde(default = "defaults::info")]
    pub info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiColorsFile {
    #[serde(default = "defaults::border")]
    pub border: String,
    #[serde(default = "defaults::border_focused")]
    pub border_focused: String,
    #[serde(default = "defaults::selection")]
    pub selection: String,
    #[serde(default)]
    pub highlight: HighlightColors,
    #[serde(default)]
    pub note: NoteColors,
    #[serde(default)]
    pub bar: BarColors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightColors {
    #[serde(default = "defaults::highlight")]
    pub plain: String,
    #[serde(default = "defaults::highlight_active")]
    pub active: String,
    #[serde(default = "defaults::highlight_conversation")]
    pub conversation: String,
    #[serde(default = "defaults::highlight_text")]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteColors {
    #[serde(default = "defaults::background_secondary")]
    pub background: String,
    #[serde(default = "defaults::border")]
    pub border: String,
    #[serde(default = "defaults::secondary")]
    pub explain: String,
    #[serde(default = "defaults::success")]
    pub example: String,
    #[serde(default = "defaults::primary")]
    pub simplify: String,
    #[serde(default = "defaults::muted")]
    pub blank: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarColors {
    #[serde(default = "defaults::background_secondary")]
    pub background: String,
    #[serde(default = "defaults::foreground")]
    pub foreground: String,
    #[serde(default = "defaults::highlight_text")]
    pub mode: String,
}

mod defaults {
    pub fn background() -> String { "#1d1b1a".to_string() }
    pub fn background_secondary() -> String { "#2a2725".to_string() }
    pub fn foreground() -> String { "#e8e3df".to_string() }
    pub fn muted() -> String { "#8a817c".to_string() }
    pub fn primary() -> String { "#7aa2f7".to_string() }
    pub fn secondary() -> String { "#bb9af7".to_string() }
    pub fn error() -> String { "#f7768e".to_string() }
    pub fn warning() -> String { "#e0af68".to_string() }
    pub fn success() -> String { "#9ece6a".to_string() }
    pub fn info() -> String { "#7dcfff".to_string() }
    pub fn border() -> String { "#403b39".to_string() }
    pub fn border_focused() -> String { "#7aa2f7".to_string() }
    pub fn selection() -> String { "#3d4a6b".to_string() }
    pub fn highlight() -> String { "#5c5326".to_string() }
    pub fn highlight_active() -> String { "#8a7a1f".to_string() }
    pub fn highlight_conversation() -> String { "#2f4f6b".to_string() }
    pub fn highlight_text() -> String { "#fff8d6".to_string() }
}

impl Default for BaseColors {
    fn default() -> Self {
        Self {
            background: defaults::background(),
            background_secondary: defaults::background_secondary(),
            foreground: defaults::foreground(),
            muted: defaults::muted(),
        }
    }
}

impl Default for AccentColors {
    fn default() -> Self {
        Self { primary: defaults::primary(), secondary: defaults::secondary() }
    }
}

impl Default for SemanticColors {
    fn default() -> Self {
        Self {
            error: defaults::error(),
            warning: defaults::warning(),
            success: defaults::success(),
            info: defaults::info(),
        }
    }
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: defaults::border(),
            border_focused: defaults::border_focused(),
            selection: defaults::selection(),
            highlight: HighlightColors::default(),
            note: NoteColors::default(),
            bar: BarColors::default(),
        }
    }
}

impl Default for HighlightColors {
    fn default() -> Self {
        Self {
            plain: defaults::highlight(),
            active: defaults::highlight_active(),
            conversation: defaults::highlight_conversation(),
            text: defaults::highlight_text(),
        }
    }
}

impl Default for NoteColors {
    fn default() -> Self {
        Self {
            background: defaults::background_secondary(),
            border: defaults::border(),
            explain: defaults::secondary(),
            example: defaults::success(),
            simplify: defaults::primary(),
            blank: defaults::muted(),
        }
    }
}

impl Default for BarColors {
    fn default() -> Self {
        Self {
            background: defaults::background_secondary(),
            foreground: defaults::foreground(),
            mode: defaults::highlight_text(),
        }
    }
}

impl ThemeFile {
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(theme) => Some(theme),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse theme");
                None
            }
        }
    }

    pub fn load_from_str(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    fn get_bundled_theme(name: &str) -> Option<Self> {
        let content = match name {
            DEFAULT_THEME => include_str!("../themes/lectern-paper.toml"),
            _ => return None,
        };
        Self::load_from_str(content)
    }

    /// User themes shadow bundled ones of the same name.
    pub fn load_by_name(name: &str, themes_dir: &Path) -> Option<Self> {
        let theme_path: PathBuf = themes_dir.join(format!("{}.toml", name));
        if theme_path.exists() {
            if let Some(theme) = Self::load_from_file(&theme_path) {
                return Some(theme);
            }
        }
        Self::get_bundled_theme(name)
    }
}

// ============================================================================
// Runtime Theme (parsed colors for UI rendering)
// ============================================================================

#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color,
    pub background_secondary: Color,
    pub foreground: Color,
    pub muted: Color,

    pub primary: Color,
    pub secondary: Color,

    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub info: Color,

    pub border: Color,
    pub border_focused: Color,
    pub selection: Color,

    pub highlight: HighlightTheme,
    pub note: NoteTheme,
    pub bar: BarTheme,
}

#[derive(Debug, Clone)]
pub struct HighlightTheme {
    pub plain: Color,
    pub active: Color,
    pub conversation: Color,
    pub text: Color,
}

#[derive(Debug, Clone)]
pub struct NoteTheme {
    pub background: Color,
    pub border: Color,
    pub explain: Color,
    pub example: Color,
    pub simplify: Color,
    pub blank: Color,
}

impl NoteTheme {
    pub fn accent(&self, note_type: NoteType) -> Color {
        match note_type {
            NoteType::Explain => self.explain,
            NoteType::Example => self.example,
            NoteType::Simplify => self.simplify,
            NoteType::Blank => self.blank,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarTheme {
    pub background: Color,
    pub foreground: Color,
    pub mode: Color,
}

impl Theme {
    pub fn from_file(tf: &ThemeFile) -> Self {
        Self {
            background: parse_hex_color(&tf.base.background),
            background_secondary: parse_hex_color(&tf.base.background_secondary),
            foreground: parse_hex_color(&tf.base.foreground),
            muted: parse_hex_color(&tf.base.muted),

            primary: parse_hex_color(&tf.accent.primary),
            secondary: parse_hex_color(&tf.accent.secondary),

            error: parse_hex_color(&tf.semantic.error),
            warning: parse_hex_color(&tf.semantic.warning),
            success: parse_hex_color(&tf.semantic.success),
            info: parse_hex_color(&tf.semantic.info),

            border: parse_hex_color(&tf.ui.border),
            border_focused: parse_hex_color(&tf.ui.border_focused),
            selection: parse_hex_color(&tf.ui.selection),

            highlight: HighlightTheme {
                plain: parse_hex_color(&tf.ui.highlight.plain),
                active: parse_hex_color(&tf.ui.highlight.active),
                conversation: parse_hex_color(&tf.ui.highlight.conversation),
                text: parse_hex_color(&tf.ui.highlight.text),
            },
            note: NoteTheme {
                background: parse_hex_color(&tf.ui.note.background),
                border: parse_hex_color(&tf.ui.note.border),
                explain: parse_hex_color(&tf.ui.note.explain),
                example: parse_hex_color(&tf.ui.note.example),
                simplify: parse_hex_color(&tf.ui.note.simplify),
                blank: parse_hex_color(&tf.ui.note.blank),
            },
            bar: BarTheme {
                background: parse_hex_color(&tf.ui.bar.background),
                foreground: parse_hex_color(&tf.ui.bar.foreground),
                mode: parse_hex_color(&tf.ui.bar.mode),
            },
        }
    }

    pub fn from_name(name: &str, themes_dir: &Path) -> Self {
        match ThemeFile::load_by_name(name, themes_dir) {
            Some(theme_file) => Self::from_file(&theme_file),
            None => {
                warn!(theme = name, "unknown theme, using built-in colors");
                Self::default()
            }
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_file(&ThemeFile::default())
    }
}

fn parse_hex_color(hex: &str) -> Color {
    let hex = hex.trim_matches('\'').trim_start_matches('#');
    if hex.len() == 6 && hex.is_ascii() {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            return Color::Rgb(r, g, b);
        }
    }
    Color::White
}
