//! PTY backends: the capability interface and its implementations.
//!
//! A backend spawns a command and exposes its output as a stream of byte
//! chunks. Three implementations are provided, in fallback order:
//!
//! - `unix-pty`: a native Unix pseudo-terminal (openpty + setsid)
//! - `portable-pty`: the cross-platform PTY layer (ConPTY on Windows)
//! - `subprocess`: plain pipes, no terminal features, always available

use std::fmt;
use std::io;
use std::path::PathBuf;

use ptyrender_core::{Dimensions, Platform, Result};

pub mod portable;
pub mod registry;
pub mod subprocess;
#[cfg(unix)]
pub mod unix;

pub use portable::PortablePtyBackend;
pub use registry::{BackendRegistry, Running};
pub use subprocess::SubprocessBackend;
#[cfg(unix)]
pub use unix::UnixPtyBackend;

/// Broad class of a backend, used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendKind {
    /// Platform-native pseudo-terminal
    NativePty,
    /// Cross-platform PTY emulation layer
    EmulatedPty,
    /// Non-PTY subprocess; loses interactive terminal features
    Subprocess,
}

impl BackendKind {
    /// Selection tier; lower tiers are tried first.
    pub fn tier(self) -> u8 {
        match self {
            BackendKind::NativePty => 0,
            BackendKind::EmulatedPty => 1,
            BackendKind::Subprocess => 2,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::NativePty => write!(f, "native-pty"),
            BackendKind::EmulatedPty => write!(f, "emulated-pty"),
            BackendKind::Subprocess => write!(f, "subprocess"),
        }
    }
}

/// Optional features a backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Window size changes reach the child
    pub resize: bool,
    /// The child can be signalled
    pub signal: bool,
    /// The child sees a terminal in raw mode
    pub raw_mode: bool,
}

impl Capabilities {
    /// Every capability.
    pub const FULL: Capabilities = Capabilities {
        resize: true,
        signal: true,
        raw_mode: true,
    };
}

/// What to run and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Program to execute
    pub command: String,
    /// Program arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Initial terminal size
    pub dimensions: Dimensions,
    /// `TERM` value exported to the child
    pub term: String,
    /// Maximum bytes per output chunk
    pub chunk_size: usize,
}

impl ExecRequest {
    /// Create a request with default size and `TERM`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            dimensions: Dimensions::default(),
            term: "xterm-256color".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the initial terminal size.
    pub fn dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the `TERM` value.
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Set the maximum bytes per output chunk.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Command line for log messages.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A way of running a command behind a terminal-like byte stream.
pub trait PtyBackend: Send + Sync {
    /// Stable backend name, used in configuration and events.
    fn name(&self) -> &'static str;

    /// Backend class.
    fn kind(&self) -> BackendKind;

    /// Platforms this backend can run on.
    fn platforms(&self) -> &'static [Platform];

    /// Supported optional features.
    fn capabilities(&self) -> Capabilities;

    /// Check if the backend can be used right now.
    ///
    /// Should be cheap; the registry caches the answer.
    fn is_available(&self) -> bool;

    /// Spawn the requested command.
    fn start(&self, request: &ExecRequest) -> Result<Box<dyn BackendHandle>>;
}

/// A running command.
pub trait BackendHandle: Send {
    /// Take the output reader. Succeeds once.
    fn take_reader(&mut self) -> Result<Box<dyn ChunkReader>>;

    /// Write input to the command.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Change the terminal size seen by the command.
    fn resize_pty(&mut self, dimensions: Dimensions) -> Result<()>;

    /// Exit code if the command has finished.
    fn try_wait(&mut self) -> Result<Option<i32>>;

    /// Stop the command.
    fn terminate(&mut self) -> Result<()>;
}

/// Blocking source of output chunks.
pub trait ChunkReader: Send {
    /// Read the next chunk; `None` at end of stream.
    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Adapts any blocking reader into a [`ChunkReader`].
pub struct ReadChunks<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: io::Read + Send> ReadChunks<R> {
    /// Wrap `inner`, reading at most `chunk_size` bytes per chunk.
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0u8; chunk_size.max(1)],
        }
    }
}

impl<R: io::Read + Send> ChunkReader for ReadChunks<R> {
    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            match self.inner.read(&mut self.buffer) {
                Ok(0) => return Ok(None),
                Ok(n) => return Ok(Some(self.buffer[..n].to_vec())),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // The PTY master reports EIO once the last slave descriptor closes
                #[cfg(unix)]
                Err(e) if e.raw_os_error() == Some(libc::EIO) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Default bytes per read.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
