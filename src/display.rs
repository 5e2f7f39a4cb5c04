//! Module: display
//!
//! Purpose: What the screen shows, independent of how pixels get there.
//!
//! Architecture:
//! - [`Display`]: the collaborator seam (clear / draw_text / present)
//! - [`Screen`]: a view model built from menu state, link state and the
//!   latest message; rendering is a straight walk over its lines
//! - [`LogDisplay`]: a `Display` that writes frames to the log
//!
//! Safety: Safe. No unsafe blocks.

use log::info;

use crate::input::{wrapped_slice, AppState, Menu, Power};
use crate::link::LinkState;

/// Options visible at once in a menu.
pub const MENU_WINDOW: usize = 4;

/// Monochrome palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
}

/// Text-drawing display collaborator.
pub trait Display: Send {
    fn clear(&mut self);
    fn draw_text(&mut self, x: u16, y: u16, text: &str, font_size: u8, fg: Color, bg: Color);
    fn present(&mut self);
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub x: u16,
    pub y: u16,
    pub text: String,
    pub font_size: u8,
    pub highlighted: bool,
}

impl TextLine {
    fn new(x: u16, y: u16, text: impl Into<String>, font_size: u8) -> Self {
        Self {
            x,
            y,
            text: text.into(),
            font_size,
            highlighted: false,
        }
    }
}

/// Everything on screen for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    pub lines: Vec<TextLine>,
}

impl Screen {
    /// Build the frame for the current state.
    ///
    /// With the menu closed: a status line and the latest message in the
    /// user's font size. With a menu open: its title and a window of options
    /// starting at the highlighted one.
    pub fn build(app: &AppState, link: LinkState, message: &str) -> Self {
        let mut lines = Vec::new();

        let title = match app.menu() {
            Menu::Off => {
                let status = format!("{} | {}", power_label(app), link_label(link));
                lines.push(TextLine::new(0, 0, status, 8));
                if !message.is_empty() {
                    lines.push(TextLine::new(10, 16, message, app.settings().font_size()));
                }
                return Self { lines };
            }
            Menu::MainMenu => "Menu",
            Menu::LanguageSelect => "Language",
            Menu::FontSelect => "Font Size",
        };

        lines.push(TextLine::new(10, 4, title, 16));
        let labels = app.option_labels();
        let count = labels.len().min(MENU_WINDOW);
        for (row, label) in wrapped_slice(&labels, app.selection(), count).enumerate() {
            let mut line = TextLine::new(10, 28 + row as u16 * 20, label.as_str(), 12);
            line.highlighted = row == 0;
            lines.push(line);
        }

        Self { lines }
    }

    pub fn render(&self, display: &mut dyn Display) {
        display.clear();
        for line in &self.lines {
            let (fg, bg) = if line.highlighted {
                (Color::Black, Color::White)
            } else {
                (Color::White, Color::Black)
            };
            display.draw_text(line.x, line.y, &line.text, line.font_size, fg, bg);
        }
        display.present();
    }

    /// Line texts, top to bottom.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }
}

fn power_label(app: &AppState) -> &'static str {
    match app.power() {
        Power::On => "ON",
        Power::Off => "OFF",
    }
}

fn link_label(link: LinkState) -> &'static str {
    match link {
        LinkState::Disconnected => "offline",
        LinkState::Associating => "joining",
        LinkState::Connected => "online",
        LinkState::Failed => "no wifi",
    }
}

/// Display that logs each presented frame.
#[derive(Debug, Default)]
pub struct LogDisplay {
    pending: Vec<String>,
    last_frame: Vec<String>,
    frames: u32,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of the most recent presented frame.
    pub fn last_frame(&self) -> &[String] {
        &self.last_frame
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

impl Display for LogDisplay {
    fn clear(&mut self) {
        self.pending.clear();
    }

    fn draw_text(&mut self, _x: u16, _y: u16, text: &str, _font_size: u8, fg: Color, _bg: Color) {
        let marker = if fg == Color::Black { "> " } else { "  " };
        self.pending.push(format!("{}{}", marker, text));
    }

    fn present(&mut self) {
        self.frames = self.frames.wrapping_add(1);
        self.last_frame = std::mem::take(&mut self.pending);
        info!(target: "display", "frame {}: {}", self.frames, self.last_frame.join(" / "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_FONT_SIZES, DEFAULT_LANGUAGES};
    use crate::input::{Button, Gesture, Settings};

    fn app() -> AppState {
        AppState::new(
            Settings::new(
                DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
                DEFAULT_FONT_SIZES.to_vec(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_idle_screen_shows_status_and_message() {
        let screen = Screen::build(&app(), LinkState::Connected, "hola");
        assert_eq!(screen.texts(), vec!["OFF | online", "hola"]);
        assert_eq!(screen.lines[1].font_size, 12);
    }

    #[test]
    fn test_language_menu_window_wraps() {
        let mut app = app();
        app.apply(Gesture::Long(Button::Select));
        app.apply(Gesture::Short(Button::Select));
        app.apply(Gesture::Short(Button::Select));
        for _ in 0..5 {
            app.apply(Gesture::Short(Button::Scroll));
        }

        let screen = Screen::build(&app, LinkState::Connected, "");
        assert_eq!(screen.texts(), vec!["Language", "French", "Portugues", "English", "Spanish"]);
        assert!(screen.lines[1].highlighted);
        assert!(!screen.lines[2].highlighted);
    }

    #[test]
    fn test_log_display_records_frame() {
        let mut display = LogDisplay::new();
        let screen = Screen::build(&app(), LinkState::Failed, "");
        screen.render(&mut display);
        assert_eq!(display.frames(), 1);
        assert_eq!(display.last_frame(), &["  OFF | no wifi".to_string()]);
    }
}
