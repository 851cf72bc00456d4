//! Terminal session: one running command and the task rendering its output.
//!
//! The session task exclusively owns the parser, screen, content gate and
//! output buffer. Handles talk to it over a command channel, so a resize or
//! snapshot is always applied between two chunks, never in the middle of one.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::runtime::Handle as Runtime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ptyrender_core::{
    timestamp_now, BackendAttempt, Config, Dimensions, Error, GateSettings, Result,
    SessionEvent, SessionId, SessionStatus, TerminalOutput,
};
use ptyrender_emulator::{serialize, ContentGate, Cursor, FeedOutcome, Parser, Rendered};

use crate::backend::{
    BackendHandle, BackendKind, BackendRegistry, Capabilities, ChunkReader, ExecRequest, Running,
};
use crate::events::{EventQueue, EventReceiver};
use crate::output::OutputBuffer;

/// Chunks buffered between the reader thread and the session task.
const CHUNK_CHANNEL_CAPACITY: usize = 32;
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Exit status polling after end of stream.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);
const EXIT_POLL_ATTEMPTS: usize = 50;

/// Per-session processing settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Binary content gate
    pub gate: GateSettings,
    /// Maximum bytes of rendered text retained
    pub max_output_size: usize,
    /// Events buffered per subscriber
    pub event_queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            gate: config.gate,
            max_output_size: config.output.max_size,
            event_queue_capacity: config.output.event_queue_capacity,
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Tokens and plain text of the screen
    pub rendered: Rendered,
    /// Whether the output buffer ever dropped content
    pub truncated: bool,
    /// Retained transcript text
    pub output: String,
    /// Screen size
    pub dimensions: Dimensions,
    /// Cursor state
    pub cursor: Cursor,
    /// Session status
    pub status: SessionStatus,
    /// Last window title set by the program
    pub title: Option<String>,
    /// Exit code, once known
    pub exit_code: Option<i32>,
}

enum Command {
    Resize {
        dimensions: Dimensions,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Write {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<usize>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Entry point for starting sessions.
pub struct Session;

impl Session {
    /// Select a backend for `request` and start rendering its output.
    ///
    /// Must be called from within a Tokio runtime. The returned receiver is
    /// subscribed before the first chunk is read, so it sees every event.
    pub fn spawn(
        request: ExecRequest,
        registry: &BackendRegistry,
        settings: SessionSettings,
    ) -> Result<(SessionHandle, EventReceiver)> {
        let runtime = Runtime::try_current()
            .map_err(|e| Error::Pty(format!("sessions need a Tokio runtime: {e}")))?;
        request.dimensions.validate()?;

        let Running {
            backend_name,
            kind,
            capabilities,
            mut handle,
            attempts,
        } = registry.select(&request)?;

        let reader = match handle.take_reader() {
            Ok(reader) => reader,
            Err(e) => {
                if let Err(term_err) = handle.terminate() {
                    warn!("Failed to stop backend after reader error: {}", term_err);
                }
                return Err(e);
            }
        };

        let id = SessionId::new();
        info!(
            "Session {} started: command='{}', backend={}, dimensions={}",
            id,
            request.display_command(),
            backend_name,
            request.dimensions
        );

        let events = Arc::new(EventQueue::new(settings.event_queue_capacity));
        let receiver = events.subscribe();
        let (status_tx, status_rx) = watch::channel(SessionStatus::Starting);
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        runtime.spawn_blocking(move || pump_chunks(id, reader, chunk_tx));

        let task = SessionTask {
            id,
            backend_name,
            capabilities,
            parser: Parser::with_dimensions(request.dimensions),
            gate: ContentGate::new(settings.gate),
            output: OutputBuffer::new(settings.max_output_size),
            handle,
            events: Arc::clone(&events),
            status: status_tx,
            title: None,
            exit_code: None,
        };
        let join = runtime.spawn(task.run(chunk_rx, command_rx));

        let session = SessionHandle {
            id,
            command: request.display_command(),
            backend_name,
            kind,
            capabilities,
            attempts,
            created_at: SystemTime::now(),
            commands: command_tx,
            status: status_rx,
            events,
            task: Mutex::new(Some(join)),
        };
        Ok((session, receiver))
    }
}

/// Blocking read loop feeding the session task.
fn pump_chunks(
    id: SessionId,
    mut reader: Box<dyn ChunkReader>,
    chunks: mpsc::Sender<io::Result<Vec<u8>>>,
) {
    loop {
        match reader.read_chunk() {
            Ok(Some(chunk)) => {
                if chunks.blocking_send(Ok(chunk)).is_err() {
                    debug!("Session {} task gone, reader stopping", id);
                    return;
                }
            }
            Ok(None) => {
                debug!("Session {} reached end of stream", id);
                return;
            }
            Err(e) => {
                let _ = chunks.blocking_send(Err(e));
                return;
            }
        }
    }
}

/// Handle to a running session.
pub struct SessionHandle {
    id: SessionId,
    command: String,
    backend_name: &'static str,
    kind: BackendKind,
    capabilities: Capabilities,
    attempts: Vec<BackendAttempt>,
    created_at: SystemTime,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    events: Arc<EventQueue>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("backend_name", &self.backend_name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Get the session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the command line.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Name of the backend supplying the byte stream.
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Kind of the backend.
    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Features of the backend.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Backends skipped or failed before this one started.
    pub fn attempts(&self) -> &[BackendAttempt] {
        &self.attempts
    }

    /// Session creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Check if the session reached a final state.
    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Wait until the session reaches a final state.
    pub async fn wait(&self) -> SessionStatus {
        let mut status = self.status.clone();
        let finished = match status.wait_for(SessionStatus::is_finished).await {
            Ok(finished) => *finished,
            // Task dropped its sender without a final status
            Err(_) => SessionStatus::Terminated,
        };
        finished
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::SessionTerminated)?;
        response.await.map_err(|_| Error::SessionTerminated)
    }

    /// Resize the screen and, when supported, the backend terminal.
    ///
    /// Invalid sizes are rejected and the previous size is kept.
    pub async fn resize(&self, dimensions: Dimensions) -> Result<()> {
        dimensions.validate()?;
        self.request(|reply| Command::Resize { dimensions, reply })
            .await?
    }

    /// Capture the current screen and buffer state.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Send input to the command.
    pub async fn write(&self, data: impl Into<Vec<u8>>) -> Result<usize> {
        let data = data.into();
        self.request(|reply| Command::Write { data, reply }).await?
    }

    /// Stop the session: terminate the backend and close the event queue.
    pub async fn terminate(&self) -> Result<()> {
        if self.request(|reply| Command::Shutdown { reply }).await.is_err() {
            debug!("Session {} task already stopped", self.id);
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Session {} task panicked: {}", self.id, e);
            }
        }
        Ok(())
    }
}

struct SessionTask {
    id: SessionId,
    backend_name: &'static str,
    capabilities: Capabilities,
    parser: Parser,
    gate: ContentGate,
    output: OutputBuffer,
    handle: Box<dyn BackendHandle>,
    events: Arc<EventQueue>,
    status: watch::Sender<SessionStatus>,
    title: Option<String>,
    exit_code: Option<i32>,
}

impl SessionTask {
    async fn run(
        mut self,
        mut chunks: mpsc::Receiver<io::Result<Vec<u8>>>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        self.status.send_replace(SessionStatus::Running);

        loop {
            tokio::select! {
                chunk = chunks.recv() => match chunk {
                    Some(Ok(bytes)) => self.process_chunk(&bytes),
                    Some(Err(e)) => {
                        self.fail(e);
                        break;
                    }
                    None => {
                        self.finish().await;
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Session {} handles dropped", self.id);
                        self.shutdown();
                        return;
                    }
                },
            }
        }

        // Stream ended; keep answering until told to stop
        while let Some(command) = commands.recv().await {
            match command {
                Command::Shutdown { reply } => {
                    let _ = reply.send(());
                    break;
                }
                command => self.handle_command(command),
            }
        }
    }

    fn process_chunk(&mut self, bytes: &[u8]) {
        debug!("Session {} received {} bytes", self.id, bytes.len());

        if self.gate.should_skip_rendering(bytes) {
            info!(
                "Session {} skipped binary chunk of {} bytes",
                self.id,
                bytes.len()
            );
            self.events.publish(SessionEvent::binary_content(bytes.len()));
            return;
        }

        let outcome = self.parser.feed(bytes);
        self.absorb(outcome);
        self.publish_render();
    }

    fn absorb(&mut self, outcome: FeedOutcome) {
        for title in outcome.titles {
            self.events.publish(SessionEvent::TitleChanged {
                title: title.clone(),
            });
            self.title = Some(title);
        }
        if !outcome.transcript.is_empty() {
            self.output.append(&outcome.transcript);
        }
    }

    fn publish_render(&self) {
        let Rendered { tokens, content } = serialize(self.parser.screen());
        self.events
            .publish(SessionEvent::TerminalOutput(TerminalOutput {
                tokens,
                content,
                truncated: self.output.is_truncated(),
                terminal_size: self.parser.screen().dimensions(),
                backend_name: self.backend_name.to_string(),
                timestamp: timestamp_now(),
            }));
    }

    fn handle_command(&mut self, command: Command) {
        let finished = self.status.borrow().is_finished();
        match command {
            Command::Resize { dimensions, reply } => {
                let result = if finished {
                    Err(Error::SessionTerminated)
                } else {
                    self.resize(dimensions)
                };
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Write { data, reply } => {
                let result = if finished {
                    Err(Error::SessionTerminated)
                } else {
                    self.handle.write(&data)
                };
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    fn resize(&mut self, dimensions: Dimensions) -> Result<()> {
        self.parser.resize(dimensions)?;
        if self.capabilities.resize {
            if let Err(e) = self.handle.resize_pty(dimensions) {
                warn!("Session {} backend resize failed: {}", self.id, e);
            }
        }
        info!("Session {} resized to {}", self.id, dimensions);
        self.publish_render();
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let screen = self.parser.screen();
        Snapshot {
            rendered: serialize(screen),
            truncated: self.output.is_truncated(),
            output: self.output.contents(),
            dimensions: screen.dimensions(),
            cursor: *screen.cursor(),
            status: *self.status.borrow(),
            title: self.title.clone(),
            exit_code: self.exit_code,
        }
    }

    async fn finish(&mut self) {
        let outcome = self.parser.finish();
        if !outcome.is_empty() {
            self.absorb(outcome);
            self.publish_render();
        }

        let mut code = None;
        for _ in 0..EXIT_POLL_ATTEMPTS {
            match self.handle.try_wait() {
                Ok(Some(exit)) => {
                    code = Some(exit);
                    break;
                }
                Ok(None) => tokio::time::sleep(EXIT_POLL_INTERVAL).await,
                Err(e) => {
                    warn!("Session {} exit status unavailable: {}", self.id, e);
                    break;
                }
            }
        }

        info!("Session {} exited with code {:?}", self.id, code);
        self.exit_code = code;
        self.events.publish(SessionEvent::Exited { code });
        self.status.send_replace(SessionStatus::Exited);
        self.events.close();
    }

    fn fail(&mut self, e: io::Error) {
        error!("Session {} read failed: {}", self.id, e);
        self.events.publish(SessionEvent::Failed {
            reason: e.to_string(),
        });
        if let Err(term_err) = self.handle.terminate() {
            warn!("Session {} terminate failed: {}", self.id, term_err);
        }
        self.status.send_replace(SessionStatus::Failed);
        self.events.close();
    }

    fn shutdown(&mut self) {
        if self.status.borrow().is_finished() {
            return;
        }
        info!("Session {} terminating", self.id);
        if let Err(e) = self.handle.terminate() {
            warn!("Session {} terminate failed: {}", self.id, e);
        }
        self.status.send_replace(SessionStatus::Terminated);
        self.events.close();
    }
}
