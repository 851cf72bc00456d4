//! Styled tokens and the events emitted to an external sink.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{BlockMark, Cell, Dimensions};

/// A maximal run of cells in one row sharing identical style, link and mark.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Token {
    /// Text of the run
    pub text: String,
    /// Bold text
    pub bold: bool,
    /// Italic text
    pub italic: bool,
    /// Underlined text
    pub underline: bool,
    /// Dimmed text
    pub dim: bool,
    /// Reverse video
    pub inverse: bool,
    /// Strikethrough text
    pub strikethrough: bool,
    /// Foreground as `#rrggbb`, empty for the default color
    pub fg: String,
    /// Background as `#rrggbb`, empty for the default color
    pub bg: String,
    /// Hyperlink target (OSC 8)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Block marker (OSC 133)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Token {
    /// Start a token carrying the style, link and mark of `cell`, with no text.
    pub fn from_cell(cell: &Cell) -> Self {
        let style = &cell.style;
        Self {
            text: String::new(),
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            dim: style.dim,
            inverse: style.inverse,
            strikethrough: style.strikethrough,
            fg: style.foreground.to_hex(),
            bg: style.background.to_hex(),
            link: cell.link.as_deref().map(str::to_string),
            code: cell.mark.as_ref().map(|mark| BlockMark::as_str(mark).to_string()),
        }
    }

    /// Create an unstyled token.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Check if the token carries no styling, link or marker.
    pub fn is_default_style(&self) -> bool {
        !self.bold
            && !self.italic
            && !self.underline
            && !self.dim
            && !self.inverse
            && !self.strikethrough
            && self.fg.is_empty()
            && self.bg.is_empty()
            && self.link.is_none()
            && self.code.is_none()
    }
}

/// One rendered update of a session's screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TerminalOutput {
    /// Tokens, one inner vector per screen row
    pub tokens: Vec<Vec<Token>>,
    /// Plain-text rendering of the screen
    pub content: String,
    /// Whether the session's output buffer ever dropped content
    pub truncated: bool,
    /// Screen size at render time
    pub terminal_size: Dimensions,
    /// Backend supplying the byte stream
    pub backend_name: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

/// Event delivered to subscribers of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Rendered screen update
    TerminalOutput(TerminalOutput),

    /// A chunk was classified as binary and not rendered
    BinaryContent {
        /// Human-readable explanation
        message: String,
        /// Size of the rejected chunk in bytes
        data_size: usize,
    },

    /// Window title set by OSC 0/2
    TitleChanged {
        /// New title
        title: String,
    },

    /// Process exited
    Exited {
        /// Exit code, if the backend reports one
        code: Option<i32>,
    },

    /// Backend stream failed
    Failed {
        /// Failure description
        reason: String,
    },
}

impl SessionEvent {
    /// Event emitted when the content gate rejects a chunk.
    pub fn binary_content(data_size: usize) -> Self {
        SessionEvent::BinaryContent {
            message: format!("Binary content detected ({data_size} bytes), rendering skipped"),
            data_size,
        }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::TerminalOutput(_) => "terminal_output",
            SessionEvent::BinaryContent { .. } => "binary_content",
            SessionEvent::TitleChanged { .. } => "title_changed",
            SessionEvent::Exited { .. } => "exited",
            SessionEvent::Failed { .. } => "failed",
        }
    }
}

/// Current wall-clock time as float seconds since the Unix epoch.
pub fn timestamp_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
