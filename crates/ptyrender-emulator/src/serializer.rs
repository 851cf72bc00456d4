//! Conversion of the screen buffer into styled tokens and plain text.

use ptyrender_core::{Cell, Token};

use crate::screen::{significant_len, Screen};

/// A screen rendered for delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Tokens, one inner vector per screen row
    pub tokens: Vec<Vec<Token>>,
    /// Plain text, rows joined by `\n`
    pub content: String,
}

/// Tokenize one row.
///
/// Cells past the last non-blank cell are dropped, spacer cells contribute
/// nothing and adjacent cells with identical style, link and mark merge into
/// one token. A blank row yields no tokens.
pub fn serialize_row(cells: &[Cell]) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut run_start: Option<&Cell> = None;

    for cell in &cells[..significant_len(cells)] {
        if cell.spacer {
            continue;
        }

        match (run_start, tokens.last_mut()) {
            (Some(start), Some(token)) if start.same_run(cell) => {
                token.text.push(cell.character);
            }
            _ => {
                let mut token = Token::from_cell(cell);
                token.text.push(cell.character);
                tokens.push(token);
                run_start = Some(cell);
            }
        }
    }

    tokens
}

/// Render the whole screen to tokens and plain text.
pub fn serialize(screen: &Screen) -> Rendered {
    Rendered {
        tokens: screen.rows().map(serialize_row).collect(),
        content: screen.to_plain_text(),
    }
}
