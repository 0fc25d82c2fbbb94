//! Toast notification component
//!
//! Shows coordinator notices (saved, created, failures) without stealing
//! focus. Renders in the bottom-right corner on top of all other content.

use crate::tui::theme::Theme;
use ratatui::{
    layout::{Alignment, Rect},
    style::Style,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthStr;

/// A toast notification that auto-dismisses
pub struct Toast {
    pub message: String,
    /// Failures are drawn in the error colour and linger longer
    pub is_error: bool,
    created_at: Instant,
    duration: Duration,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
            created_at: Instant::now(),
            duration: Duration::from_secs(2),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            created_at: Instant::now(),
            duration: Duration::from_secs(5),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.duration
    }

    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let width = (self.message.width() as u16 + 4).min(area.width.saturating_sub(4));
        let height = 3;

        let x = area.right().saturating_sub(width + 2);
        let y = area.bottom().saturating_sub(height + 2);
        let toast_area = Rect::new(x, y, width, height);

        let accent = if self.is_error {
            theme.error
        } else {
            theme.highlight
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(theme.border_type)
            .border_style(Style::default().fg(accent))
            .style(Style::default().bg(theme.background));

        let text = Paragraph::new(self.message.as_str())
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.foreground))
            .block(block);

        f.render_widget(Clear, toast_area);
        f.render_widget(text, toast_area);
    }
}
