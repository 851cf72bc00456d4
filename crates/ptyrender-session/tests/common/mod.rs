//! In-process backends for driving sessions from tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ptyrender_core::{Dimensions, Error, Platform, Result};
use ptyrender_session::{
    BackendHandle, BackendKind, BackendRegistry, Capabilities, ChunkReader, ExecRequest,
    PtyBackend,
};

/// What the session did to the backend.
#[derive(Debug, Default)]
pub struct BackendLog {
    pub requests: Vec<ExecRequest>,
    pub writes: Vec<Vec<u8>>,
    pub resizes: Vec<Dimensions>,
}

/// Test side of a [`FeedBackend`]: pushes chunks into the session.
pub struct Feeder(mpsc::Sender<io::Result<Vec<u8>>>);

impl Feeder {
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        self.0.send(Ok(bytes.into())).unwrap();
    }

    pub fn fail(&self, message: &str) {
        self.0
            .send(Err(io::Error::new(io::ErrorKind::BrokenPipe, message.to_string())))
            .unwrap();
    }
}

/// Backend whose output is whatever the test feeds it.
pub struct FeedBackend {
    name: &'static str,
    kind: BackendKind,
    available: bool,
    start_error: Option<String>,
    capabilities: Capabilities,
    exit_code: i32,
    receiver: Mutex<Option<mpsc::Receiver<io::Result<Vec<u8>>>>>,
    terminated: Arc<AtomicBool>,
    pub log: Arc<Mutex<BackendLog>>,
}

impl FeedBackend {
    pub fn new(name: &'static str, kind: BackendKind) -> (Self, Feeder) {
        let (tx, rx) = mpsc::channel();
        let backend = Self {
            name,
            kind,
            available: true,
            start_error: None,
            capabilities: Capabilities::FULL,
            exit_code: 0,
            receiver: Mutex::new(Some(rx)),
            terminated: Arc::new(AtomicBool::new(false)),
            log: Arc::new(Mutex::new(BackendLog::default())),
        };
        (backend, Feeder(tx))
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.start_error = Some(reason.to_string());
        self
    }

    pub fn without_resize(mut self) -> Self {
        self.capabilities.resize = false;
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn terminated(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminated)
    }
}

impl PtyBackend for FeedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn platforms(&self) -> &'static [Platform] {
        Platform::ALL
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&self, request: &ExecRequest) -> Result<Box<dyn BackendHandle>> {
        if let Some(reason) = &self.start_error {
            return Err(Error::BackendStart {
                backend: self.name.to_string(),
                reason: reason.clone(),
            });
        }
        self.log.lock().unwrap().requests.push(request.clone());
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Pty("feed backend started twice".into()))?;
        Ok(Box::new(FeedHandle {
            reader: Some(FeedReader {
                receiver,
                terminated: Arc::clone(&self.terminated),
            }),
            terminated: Arc::clone(&self.terminated),
            exit_code: self.exit_code,
            log: Arc::clone(&self.log),
        }))
    }
}

struct FeedReader {
    receiver: mpsc::Receiver<io::Result<Vec<u8>>>,
    terminated: Arc<AtomicBool>,
}

impl ChunkReader for FeedReader {
    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if self.terminated.load(Ordering::SeqCst) {
                return Ok(None);
            }
            match self.receiver.recv_timeout(Duration::from_millis(10)) {
                Ok(chunk) => return chunk.map(Some),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

struct FeedHandle {
    reader: Option<FeedReader>,
    terminated: Arc<AtomicBool>,
    exit_code: i32,
    log: Arc<Mutex<BackendLog>>,
}

impl BackendHandle for FeedHandle {
    fn take_reader(&mut self) -> Result<Box<dyn ChunkReader>> {
        self.reader
            .take()
            .map(|reader| Box::new(reader) as Box<dyn ChunkReader>)
            .ok_or_else(|| Error::Pty("reader already taken".into()))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.log.lock().unwrap().writes.push(data.to_vec());
        Ok(data.len())
    }

    fn resize_pty(&mut self, dimensions: Dimensions) -> Result<()> {
        self.log.lock().unwrap().resizes.push(dimensions);
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        Ok(Some(self.exit_code))
    }

    fn terminate(&mut self) -> Result<()> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Registry holding exactly the given backends.
pub fn registry(backends: Vec<FeedBackend>) -> BackendRegistry {
    BackendRegistry::with_backends(
        Platform::detect(),
        backends
            .into_iter()
            .map(|backend| Box::new(backend) as Box<dyn PtyBackend>)
            .collect(),
    )
}
