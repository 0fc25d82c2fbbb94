// Colour palettes for the editor
//
// Two fixed palettes selected by the `theme` config key.

use crate::config::ThemeMode;
use ratatui::style::Color;
use ratatui::widgets::BorderType;

/// Resolved colours used by every render function
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,

    // ─── Chrome ──────────────────────────────────────────────
    pub title: Color,
    pub border: Color,
    /// Border of the focused pane and of overlays
    pub highlight: Color,
    pub border_type: BorderType,

    // ─── Text ────────────────────────────────────────────────
    pub background: Color,
    pub foreground: Color,
    pub muted: Color,
    pub selection: Color,
    pub selection_fg: Color,

    // ─── Status ──────────────────────────────────────────────
    pub error: Color,
    pub success: Color,
    pub warning: Color,
}

impl Theme {
    pub fn from_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::dark(),
            ThemeMode::Light => Self::light(),
        }
    }

    fn dark() -> Self {
        Self {
            name: "dark",
            title: Color::Cyan,
            border: Color::DarkGray,
            highlight: Color::Yellow,
            border_type: BorderType::Rounded,
            background: Color::Rgb(24, 24, 32),
            foreground: Color::Rgb(220, 220, 220),
            muted: Color::Gray,
            selection: Color::Rgb(60, 60, 90),
            selection_fg: Color::White,
            error: Color::LightRed,
            success: Color::LightGreen,
            warning: Color::LightYellow,
        }
    }

    fn light() -> Self {
        Self {
            name: "light",
            title: Color::Blue,
            border: Color::Gray,
            highlight: Color::Magenta,
            border_type: BorderType::Plain,
            background: Color::Rgb(250, 250, 250),
            foreground: Color::Rgb(30, 30, 30),
            muted: Color::DarkGray,
            selection: Color::Rgb(200, 215, 240),
            selection_fg: Color::Black,
            error: Color::Red,
            success: Color::Green,
            warning: Color::Rgb(180, 120, 0),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
