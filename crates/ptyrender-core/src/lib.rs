//! # ptyrender-core
//!
//! Core types for ptyrender.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other ptyrender crates. It provides:
//!
//! - Geometry types (Position, Dimensions)
//! - Cell, style and color types for the screen buffer
//! - The fixed 256-entry color palette
//! - Tokens and session events delivered to sinks
//! - Session identifiers, platform detection and configuration
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other ptyrender crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod palette;
pub mod platform;
pub mod session;

// Re-export commonly used types
pub use cell::{BlockMark, Cell, Color, Style};
pub use config::{
    BackendSettings, Config, GateSettings, OutputSettings, ServerSettings, TerminalSettings,
};
pub use error::{AttemptOutcome, BackendAttempt, Error, Result};
pub use event::{timestamp_now, SessionEvent, TerminalOutput, Token};
pub use geometry::{Dimensions, Position};
pub use palette::{palette_rgb, resolve_palette};
pub use platform::Platform;
pub use session::{SessionId, SessionStatus};
