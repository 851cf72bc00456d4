//! # ptyrender-emulator
//!
//! Terminal emulation for ptyrender.
//!
//! This crate provides:
//! - VTE-driven parser for ANSI/VT escape sequences
//! - Screen buffer with cursor, scroll region and wide-glyph handling
//! - SGR style resolution
//! - Token serialization of the screen
//! - UTF-8 decoding with a single-byte fallback
//! - The binary content gate
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends only on ptyrender-core
//! and performs no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod gate;
pub mod parser;
pub mod screen;
pub mod serializer;
pub mod sgr;

// Re-export commonly used types
pub use decoder::Utf8Decoder;
pub use gate::ContentGate;
pub use parser::{FeedOutcome, Parser};
pub use screen::{Cursor, EraseRegion, Screen};
pub use serializer::{serialize, serialize_row, Rendered};
pub use sgr::{apply_sgr, apply_sgr_groups};
