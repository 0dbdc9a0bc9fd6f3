use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::App;

const KEYS: &[(&str, &[(&str, &str)])] = &[
    (
        "Reading",
        &[
            ("j/k      ", "Scroll one paragraph"),
            ("p        ", "Reading progress"),
            ("[ / ]    ", "Previous / next annotation"),
        ],
    ),
    (
        "Selecting",
        &[
            ("drag     ", "Select text, opens the toolbar"),
            ("S-←/→    ", "Select with the keyboard"),
            ("Tab/Enter", "Pick a toolbar action"),
            ("a h      ", "Ask / Highlight"),
            ("e x s n  ", "Explain / Example / Simplify / Note"),
        ],
    ),
    (
        "Annotations",
        &[
            ("r        ", "Retry the focused note"),
            ("d        ", "Remove the focused annotation"),
            ("c        ", "Open its conversation"),
        ],
    ),
    (
        "Questions",
        &[
            ("/        ", "Ask anything"),
            ("Enter    ", "Send"),
            ("Esc      ", "Close"),
        ],
    ),
    (
        "Other",
        &[("?        ", "Show this help"), ("q        ", "Quit")],
    ),
];

pub fn render_help_dialog(f: &mut Frame, app: &App) {
    let area = f.area();
    let theme = &app.theme;

    let dialog_width = 56.min(area.width.saturating_sub(4));
    let dialog_height = 30.min(area.height.saturating_sub(2));

    let dialog_area = Rect {
        x: (area.width.saturating_sub(dialog_width)) / 2,
        y: (area.height.saturating_sub(dialog_height)) / 2,
        width: dialog_width,
        height: dialog_height,
    };

    f.render_widget(Clear, dialog_area);

    let key_style = Style::default().fg(theme.warning);
    let desc_style = Style::default().fg(theme.foreground);
    let header_style = Style::default().fg(theme.primary).add_modifier(Modifier::BOLD);

    let mut content = vec![Line::from("")];
    for (section, keys) in KEYS {
        content.push(Line::from(Span::styled(format!("  {section}"), header_style)));
        for (key, desc) in keys.iter() {
            content.push(Line::from(vec![
                Span::styled(format!("  {key} "), key_style),
                Span::styled(*desc, desc_style),
            ]));
        }
        content.push(Line::from(""));
    }
    content.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
    )));

    let dialog = Paragraph::new(content)
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border_focused))
                .style(Style::default().bg(theme.background)),
        )
        .alignment(Alignment::Left);

    f.render_widget(dialog, dialog_area);
}
