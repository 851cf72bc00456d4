//! Cell, style and color types for the terminal screen.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::palette;

/// Terminal color: the default color, a 256-color palette entry, or true RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Default terminal color
    #[default]
    Default,

    /// 256-color palette index (0-15 named, 16-231 cube, 232-255 grayscale)
    Palette(u8),

    /// True color RGB (24-bit)
    Rgb {
        /// Red component
        r: u8,
        /// Green component
        g: u8,
        /// Blue component
        b: u8,
    },
}

impl Color {
    /// Hex rendering used on the wire.
    ///
    /// Returns an empty string for [`Color::Default`], otherwise `#rrggbb`.
    pub fn to_hex(&self) -> String {
        match *self {
            Color::Default => String::new(),
            Color::Palette(index) => palette::resolve_palette(index),
            Color::Rgb { r, g, b } => format!("#{r:02x}{g:02x}{b:02x}"),
        }
    }

    /// Check if this is the default color.
    pub fn is_default(&self) -> bool {
        matches!(self, Color::Default)
    }
}

/// Resolved text style of a cell.
///
/// Two styles are equal iff every field matches; token run merging relies on
/// this, so an explicit `Palette(0)` never equals `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct Style {
    /// Bold text
    pub bold: bool,
    /// Italic text
    pub italic: bool,
    /// Underlined text
    pub underline: bool,
    /// Dimmed text
    pub dim: bool,
    /// Reverse video (fg/bg swapped by the renderer)
    pub inverse: bool,
    /// Strikethrough text
    pub strikethrough: bool,
    /// Foreground color
    pub foreground: Color,
    /// Background color
    pub background: Color,
}

impl Style {
    /// Check if style is entirely default (no attributes, default colors).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Style with bold enabled.
    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Style with the given foreground color.
    pub fn with_foreground(mut self, color: Color) -> Self {
        self.foreground = color;
        self
    }

    /// Style with the given background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }
}

/// Out-of-band block marker attached to cells.
///
/// Set by shell-integration (OSC 133) sequences and carried into the `code`
/// field of serialized tokens. Independent of [`Style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlockMark {
    /// Shell prompt text
    Prompt,
    /// Command line typed by the user
    Input,
    /// Output of a command
    Output,
}

impl BlockMark {
    /// Wire name of the marker.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockMark::Prompt => "prompt",
            BlockMark::Input => "input",
            BlockMark::Output => "output",
        }
    }
}

/// Single grid position in the screen buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Glyph shown in the cell (space if empty)
    pub character: char,
    /// Resolved style
    pub style: Style,
    /// Active hyperlink target when the cell was written
    pub link: Option<Arc<str>>,
    /// Active block marker when the cell was written
    pub mark: Option<BlockMark>,
    /// Second column of a wide glyph; renders as nothing
    pub spacer: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            character: ' ',
            style: Style::default(),
            link: None,
            mark: None,
            spacer: false,
        }
    }
}

impl Cell {
    /// Create a new cell with a character and default styling.
    pub fn new(character: char) -> Self {
        Self {
            character,
            ..Default::default()
        }
    }

    /// Create a cell with a character and style.
    pub fn styled(character: char, style: Style) -> Self {
        Self {
            character,
            style,
            ..Default::default()
        }
    }

    /// Blank cell used by erase operations: a space carrying only `background`.
    pub fn blank_with_background(background: Color) -> Self {
        Self {
            style: Style {
                background,
                ..Style::default()
            },
            ..Default::default()
        }
    }

    /// Check if cell is blank (space with default style, no link or mark).
    pub fn is_blank(&self) -> bool {
        self.character == ' '
            && !self.spacer
            && self.style.is_default()
            && self.link.is_none()
            && self.mark.is_none()
    }

    /// Check if two cells belong to the same styled run.
    pub fn same_run(&self, other: &Cell) -> bool {
        self.style == other.style && self.link == other.link && self.mark == other.mark
    }
}
