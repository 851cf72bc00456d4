//! # ptyrender-session
//!
//! Running commands behind PTY backends and rendering their output.
//!
//! This crate provides:
//! - The backend capability interface and the unix-pty, portable-pty and
//!   subprocess backends
//! - Backend selection with ordered fallback and cached availability
//! - Per-session tasks feeding output through the emulator
//! - Bounded drop-oldest event delivery
//! - The session registry
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on ptyrender-core
//! and ptyrender-emulator to manage terminal session lifecycles.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod events;
pub mod manager;
pub mod output;
pub mod session;

// Re-export commonly used types
pub use backend::{
    BackendHandle, BackendKind, BackendRegistry, Capabilities, ChunkReader, ExecRequest,
    PtyBackend, Running,
};
pub use events::{EventQueue, EventReceiver};
pub use manager::{SessionInfo, SessionManager};
pub use output::{Appended, OutputBuffer};
pub use session::{Session, SessionHandle, SessionSettings, Snapshot};
