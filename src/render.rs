//! Output rendering shared by inboxes and mails.

use crate::error::{Error, Result};
use crossterm::style::Stylize;
use serde::Serialize;

/// Something that can be shown to a human or dumped as JSON.
pub trait Render {
    /// Human-readable text, with ANSI colours when `colour` is set.
    fn render(&self, colour: bool) -> Result<String>;

    /// Compact JSON document.
    fn to_json(&self) -> Result<String>;
}

pub(crate) fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Serialization)
}

/// Colour helper that degrades to plain text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(&self, text: &str, style: fn(String) -> crossterm::style::StyledContent<String>) -> String {
        if self.enabled {
            style(text.to_string()).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(text, <String as Stylize>::yellow)
    }

    pub fn cyan(&self, text: &str) -> String {
        self.paint(text, <String as Stylize>::cyan)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(text, <String as Stylize>::red)
    }

    pub fn magenta(&self, text: &str) -> String {
        self.paint(text, <String as Stylize>::magenta)
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(text, <String as Stylize>::green)
    }
}

/// Current terminal width, 80 columns when it cannot be read.
pub(crate) fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .ok()
        .filter(|cols| *cols > 0)
        .unwrap_or(80)
}
