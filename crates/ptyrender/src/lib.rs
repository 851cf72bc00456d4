//! ptyrender command-line front end.
//!
//! The binary is in main.rs; this library holds argument parsing, the
//! event streaming loop and the event schema export.

pub mod cli;
pub mod runner;
pub mod schema;

pub use cli::Cli;
pub use runner::{run, stream_events, Outcome};
pub use schema::event_schema;
