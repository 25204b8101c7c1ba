//! Color theme definitions for the UI.
//!
//! Two built-in themes: dark (default) and light.

use ratatui::style::Color;
use std::borrow::Cow;

/// All themeable colors in the application
#[derive(Clone, Debug)]
pub struct Theme {
    name: Cow<'static, str>,

    // UI chrome
    pub border: Color,
    pub text: Color,
    pub text_dim: Color,
    pub header_fg: Color,
    pub header_bg: Color,

    // Status indicators
    pub success: Color, // low loss (<10%)
    pub warning: Color, // medium loss (10-50%)
    pub error: Color,   // high loss (>50%), timeout

    // Charts
    pub line: Color,
    pub bar: Color,
    pub bar_value: Color,

    pub shortcut: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: Cow::Borrowed("dark"),
            border: Color::Cyan,
            text: Color::White,
            text_dim: Color::Gray,
            header_fg: Color::Black,
            header_bg: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            line: Color::Green,
            bar: Color::Red,
            bar_value: Color::Yellow,
            shortcut: Color::Yellow,
        }
    }

    pub fn light() -> Self {
        Self {
            name: Cow::Borrowed("light"),
            border: Color::Blue,
            text: Color::Black,
            text_dim: Color::DarkGray,
            header_fg: Color::White,
            header_bg: Color::Blue,
            success: Color::Green,
            warning: Color::Rgb(181, 137, 0),
            error: Color::Red,
            line: Color::Green,
            bar: Color::Red,
            bar_value: Color::Black,
            shortcut: Color::Blue,
        }
    }

    /// Look up a theme by name, falling back to dark
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn list() -> &'static [&'static str] {
        &["dark", "light"]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color for a loss percentage
    pub fn loss_color(&self, loss_pct: f64) -> Color {
        if loss_pct > 50.0 {
            self.error
        } else if loss_pct > 10.0 {
            self.warning
        } else {
            self.success
        }
    }
}
