//! ANSI/VT escape sequence parser using the VTE crate.

use std::fmt;

use vte::{Params, Perform};

use ptyrender_core::{BlockMark, Dimensions, Result};

use crate::decoder::Utf8Decoder;
use crate::screen::{EraseRegion, Screen};
use crate::sgr::apply_sgr_groups;

/// Side effects of one `feed` call that are not part of the screen state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOutcome {
    /// Printed text, with a newline for every line feed
    pub transcript: String,
    /// Window titles set via OSC 0/2, in order
    pub titles: Vec<String>,
    /// Number of BEL characters executed
    pub bells: usize,
}

impl FeedOutcome {
    /// Check if the feed produced no side effects.
    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty() && self.titles.is_empty() && self.bells == 0
    }
}

/// ANSI parser wrapping the VTE state machine.
///
/// The state machine lives as long as the parser, so an escape sequence or
/// UTF-8 character split across two `feed` calls is handled exactly as if it
/// arrived in one.
pub struct Parser {
    machine: vte::Parser,
    sequence: Sequence,
    decoder: Utf8Decoder,
    performer: Performer,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("screen", &self.performer.screen)
            .field("pending_bytes", &self.decoder.pending_len())
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Create a new parser with the given screen.
    pub fn new(screen: Screen) -> Self {
        Self {
            machine: vte::Parser::new(),
            sequence: Sequence::Ground,
            decoder: Utf8Decoder::new(),
            performer: Performer::new(screen),
        }
    }

    /// Create a parser over a blank screen of the given size.
    pub fn with_dimensions(dimensions: Dimensions) -> Self {
        Self::new(Screen::new(dimensions))
    }

    /// Get a reference to the screen.
    pub fn screen(&self) -> &Screen {
        &self.performer.screen
    }

    /// Get a mutable reference to the screen.
    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.performer.screen
    }

    /// Consume the parser and return the screen.
    pub fn into_screen(self) -> Screen {
        self.performer.screen
    }

    /// Resize the underlying screen.
    pub fn resize(&mut self, dimensions: Dimensions) -> Result<()> {
        self.performer.screen.resize(dimensions)
    }

    /// Feed raw bytes through the decoder and the VTE state machine.
    ///
    /// Malformed input is absorbed; this never fails.
    pub fn feed(&mut self, bytes: &[u8]) -> FeedOutcome {
        let decoded = self.decoder.decode(bytes);
        for byte in decoded {
            self.advance(byte);
        }
        self.performer.take_outcome()
    }

    /// Flush bytes held back by the decoder at end of stream.
    ///
    /// An incomplete UTF-8 sequence left over is rendered byte-per-character.
    pub fn finish(&mut self) -> FeedOutcome {
        for byte in self.decoder.finish() {
            self.advance(byte);
        }
        self.performer.take_outcome()
    }

    /// Step the state machine by one decoded byte.
    ///
    /// A byte that cannot continue the escape or control sequence in
    /// progress cancels it, and is then processed from the ground state.
    fn advance(&mut self, byte: u8) {
        if self.sequence.rejects(byte) {
            tracing::trace!(byte, state = ?self.sequence, "Aborting malformed sequence");
            self.machine.advance(&mut self.performer, CAN);
            self.sequence = Sequence::Ground;
        }
        self.sequence = self.sequence.next(byte);
        self.machine.advance(&mut self.performer, byte);
    }
}

/// Cancels any sequence in progress.
const CAN: u8 = 0x18;

/// Position of the state machine relative to an escape sequence.
///
/// Mirrors the transitions of `vte::Parser` closely enough to know when a
/// sequence is being accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    Ground,
    Escape,
    EscapeIntermediate,
    Csi,
    /// OSC body; BEL terminates it
    Osc,
    /// DCS, SOS, PM or APC body
    String,
}

impl Sequence {
    /// Check if `byte` falls outside the continuation set of this sequence.
    fn rejects(self, byte: u8) -> bool {
        byte >= 0x80
            && matches!(
                self,
                Sequence::Escape | Sequence::EscapeIntermediate | Sequence::Csi
            )
    }

    fn next(self, byte: u8) -> Self {
        match byte {
            0x18 | 0x1A => return Sequence::Ground,
            0x1B => return Sequence::Escape,
            _ => {}
        }
        match self {
            Sequence::Ground => Sequence::Ground,
            Sequence::Escape => match byte {
                b'[' => Sequence::Csi,
                b']' => Sequence::Osc,
                b'P' | b'X' | b'^' | b'_' => Sequence::String,
                0x20..=0x2F => Sequence::EscapeIntermediate,
                0x30..=0x7E => Sequence::Ground,
                _ => self,
            },
            Sequence::EscapeIntermediate => match byte {
                0x30..=0x7E => Sequence::Ground,
                _ => self,
            },
            Sequence::Csi => match byte {
                0x40..=0x7E => Sequence::Ground,
                _ => self,
            },
            Sequence::Osc => match byte {
                0x07 => Sequence::Ground,
                _ => self,
            },
            Sequence::String => match byte {
                0x9C => Sequence::Ground,
                _ => self,
            },
        }
    }
}

/// Applies parsed actions to the screen.
#[derive(Debug)]
struct Performer {
    screen: Screen,
    outcome: FeedOutcome,
}

impl Performer {
    fn new(screen: Screen) -> Self {
        Self {
            screen,
            outcome: FeedOutcome::default(),
        }
    }

    fn take_outcome(&mut self) -> FeedOutcome {
        std::mem::take(&mut self.outcome)
    }

    /// Set or clear DEC private modes (`CSI ? Pm h` / `CSI ? Pm l`).
    fn set_private_modes(&mut self, params: &Params, enabled: bool) {
        for param in params.iter() {
            match param.first() {
                Some(25) => self.screen.set_cursor_visible(enabled),
                Some(7) => self.screen.set_autowrap(enabled),
                Some(mode) => tracing::trace!(mode, enabled, "Ignoring private mode"),
                None => {}
            }
        }
    }

    fn set_block_mark(&mut self, kind: &[u8]) {
        match kind.first() {
            Some(b'A') => self.screen.set_mark(Some(BlockMark::Prompt)),
            Some(b'B') => self.screen.set_mark(Some(BlockMark::Input)),
            Some(b'C') => self.screen.set_mark(Some(BlockMark::Output)),
            Some(b'D') => self.screen.set_mark(None),
            _ => {}
        }
    }
}

/// Value of parameter `idx`, or `default` when it is missing.
fn param_or(params: &Params, idx: usize, default: u16) -> u16 {
    params
        .iter()
        .nth(idx)
        .and_then(|group| group.first().copied())
        .unwrap_or(default)
}

/// Count parameter: missing or zero means one.
fn count(params: &Params, idx: usize) -> u16 {
    param_or(params, idx, 1).max(1)
}

fn join_params(parts: &[&[u8]]) -> String {
    String::from_utf8_lossy(&parts.join(&b';')).into_owned()
}

impl Perform for Performer {
    fn print(&mut self, c: char) {
        if c.is_control() {
            return;
        }
        self.screen.write(c);
        self.outcome.transcript.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // BEL
            0x07 => self.outcome.bells += 1,
            // BS
            0x08 => self.screen.backspace(),
            // HT
            0x09 => self.screen.tab(),
            // LF, VT, FF
            0x0A..=0x0C => {
                self.screen.linefeed();
                self.outcome.transcript.push('\n');
            }
            // CR
            0x0D => self.screen.carriage_return(),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(command) = params.first() else {
            return;
        };

        match *command {
            b"0" | b"2" => {
                let title = join_params(&params[1..]);
                self.outcome.titles.push(title);
            }
            b"8" => {
                let uri = if params.len() > 2 {
                    join_params(&params[2..])
                } else {
                    String::new()
                };
                if uri.is_empty() {
                    self.screen.set_link(None);
                } else {
                    self.screen.set_link(Some(&uri));
                }
            }
            b"133" => {
                if let Some(kind) = params.get(1) {
                    self.set_block_mark(kind);
                }
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, c: char) {
        if ignore {
            return;
        }

        match (intermediates, c) {
            ([], 'A') => self.screen.cursor_up(count(params, 0)),
            ([], 'B') => self.screen.cursor_down(count(params, 0)),
            ([], 'C') => self.screen.cursor_forward(count(params, 0)),
            ([], 'D') => self.screen.cursor_backward(count(params, 0)),

            // CNL / CPL
            ([], 'E') => {
                self.screen.cursor_down(count(params, 0));
                self.screen.carriage_return();
            }
            ([], 'F') => {
                self.screen.cursor_up(count(params, 0));
                self.screen.carriage_return();
            }

            // CHA / HPA
            ([], 'G') | ([], '`') => {
                let row = self.screen.cursor().position.row;
                self.screen.move_cursor(row, count(params, 0) - 1);
            }

            // CUP / HVP
            ([], 'H') | ([], 'f') => {
                let row = count(params, 0) - 1;
                let col = count(params, 1) - 1;
                self.screen.move_cursor(row, col);
            }

            // VPA
            ([], 'd') => {
                let col = self.screen.cursor().position.col;
                self.screen.move_cursor(count(params, 0) - 1, col);
            }

            // ED
            ([], 'J') => match param_or(params, 0, 0) {
                0 => self.screen.erase(EraseRegion::ScreenToEnd),
                1 => self.screen.erase(EraseRegion::ScreenFromStart),
                2 | 3 => self.screen.erase(EraseRegion::WholeScreen),
                _ => {}
            },

            // EL
            ([], 'K') => match param_or(params, 0, 0) {
                0 => self.screen.erase(EraseRegion::LineToEnd),
                1 => self.screen.erase(EraseRegion::LineFromStart),
                2 => self.screen.erase(EraseRegion::WholeLine),
                _ => {}
            },

            ([], 'L') => self.screen.insert_lines(count(params, 0)),
            ([], 'M') => self.screen.delete_lines(count(params, 0)),
            ([], 'P') => self.screen.delete_chars(count(params, 0)),
            ([], '@') => self.screen.insert_chars(count(params, 0)),
            ([], 'X') => self.screen.erase_chars(count(params, 0)),
            ([], 'S') => self.screen.scroll_up(count(params, 0)),
            ([], 'T') => self.screen.scroll_down(count(params, 0)),

            // DECSTBM
            ([], 'r') => {
                let rows = self.screen.dimensions().rows;
                let top = count(params, 0) - 1;
                let bottom = match param_or(params, 1, 0) {
                    0 => rows,
                    bottom => bottom,
                };
                self.screen.set_scroll_region(top, bottom - 1);
            }

            ([], 'm') => {
                let groups: Vec<&[u16]> = params.iter().collect();
                let style = apply_sgr_groups(*self.screen.current_style(), &groups);
                self.screen.set_current_style(style);
            }

            ([], 's') => self.screen.save_cursor(),
            ([], 'u') => self.screen.restore_cursor(),

            ([b'?'], 'h') => self.set_private_modes(params, true),
            ([b'?'], 'l') => self.set_private_modes(params, false),

            _ => tracing::trace!(?intermediates, action = %c, "Ignoring CSI sequence"),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }

        match byte {
            // DECSC / DECRC
            b'7' => self.screen.save_cursor(),
            b'8' => self.screen.restore_cursor(),
            // IND
            b'D' => self.screen.linefeed(),
            // NEL
            b'E' => {
                self.screen.carriage_return();
                self.screen.linefeed();
            }
            // RI
            b'M' => self.screen.reverse_index(),
            // RIS
            b'c' => self.screen.reset(),
            _ => {}
        }
    }
}
