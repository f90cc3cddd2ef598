//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom status bar; notices render on a red background until the next
/// successful record.
pub(crate) fn status_bar(msg: &str, alert: bool) -> Paragraph<'_> {
    let bg = if alert { Color::Red } else { Color::DarkGray };
    Paragraph::new(format!(" {msg}"))
        .style(Style::default().bg(bg).fg(Color::White))
}
