//! Pipe-based fallback backend.
//!
//! Runs the command with piped stdio. There is no terminal: size changes are
//! not delivered and programs that check `isatty` fall back to plain output.
//! stdout and stderr are merged into one chunk stream.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info, warn};

use ptyrender_core::{Dimensions, Error, Platform, Result};

use super::{BackendHandle, BackendKind, Capabilities, ChunkReader, ExecRequest, PtyBackend};

const NAME: &str = "subprocess";

/// Plain child process with piped stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessBackend;

impl SubprocessBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl PtyBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Subprocess
    }

    fn platforms(&self) -> &'static [Platform] {
        Platform::ALL
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            resize: false,
            signal: cfg!(unix),
            raw_mode: false,
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn start(&self, request: &ExecRequest) -> Result<Box<dyn BackendHandle>> {
        info!(
            "Spawning subprocess: command='{}'",
            request.display_command()
        );

        let mut cmd = Command::new(&request.command);
        cmd.args(&request.args)
            .env("TERM", &request.term)
            .env("COLUMNS", request.dimensions.cols.to_string())
            .env("LINES", request.dimensions.rows.to_string())
            .envs(request.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| Error::BackendStart {
            backend: NAME.to_string(),
            reason: format!("spawn '{}' failed: {e}", request.command),
        })?;

        let stdin = child.stdin.take();
        let (tx, rx) = mpsc::channel();
        let mut pumps = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_pump("stdout", stdout, tx.clone(), request.chunk_size);
            pumps += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pump("stderr", stderr, tx, request.chunk_size);
            pumps += 1;
        }

        info!("Subprocess spawned: pid={}", child.id());

        Ok(Box::new(SubprocessHandle {
            child,
            stdin,
            reader: Some(MergedReader { rx, open: pumps }),
        }))
    }
}

enum Pumped {
    Data(Vec<u8>),
    Closed,
    Error(io::Error),
}

fn spawn_pump<R>(label: &'static str, mut source: R, tx: mpsc::Sender<Pumped>, chunk_size: usize)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = vec![0u8; chunk_size.max(1)];
        loop {
            let message = match source.read(&mut buffer) {
                Ok(0) => Pumped::Closed,
                Ok(n) => Pumped::Data(buffer[..n].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Pumped::Error(e),
            };
            let done = !matches!(message, Pumped::Data(_));
            if tx.send(message).is_err() || done {
                debug!("Subprocess {} pump finished", label);
                return;
            }
        }
    });
}

/// Chunks from stdout and stderr in arrival order.
struct MergedReader {
    rx: mpsc::Receiver<Pumped>,
    open: usize,
}

impl ChunkReader for MergedReader {
    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        while self.open > 0 {
            match self.rx.recv() {
                Ok(Pumped::Data(data)) => return Ok(Some(data)),
                Ok(Pumped::Closed) => self.open -= 1,
                Ok(Pumped::Error(e)) => {
                    self.open -= 1;
                    return Err(e);
                }
                Err(_) => break,
            }
        }
        Ok(None)
    }
}

struct SubprocessHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<MergedReader>,
}

impl BackendHandle for SubprocessHandle {
    fn take_reader(&mut self) -> Result<Box<dyn ChunkReader>> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| Error::Pty("subprocess reader already taken".to_string()))?;
        Ok(Box::new(reader))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Pty("subprocess stdin closed".to_string()))?;
        stdin.write_all(data)?;
        stdin.flush()?;
        Ok(data.len())
    }

    fn resize_pty(&mut self, _dimensions: Dimensions) -> Result<()> {
        Err(Error::Pty("subprocess backend cannot resize".to_string()))
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.try_wait()?;
        #[cfg(unix)]
        {
            Ok(status.map(super::unix::exit_code))
        }
        #[cfg(not(unix))]
        {
            Ok(status.map(|status| status.code().unwrap_or(-1)))
        }
    }

    fn terminate(&mut self) -> Result<()> {
        // Closing stdin lets well-behaved filters finish on their own
        self.stdin.take();
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        info!("Killing subprocess: pid={}", self.child.id());
        if let Err(e) = self.child.kill() {
            warn!("Subprocess kill failed: {}", e);
        }
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for SubprocessHandle {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn drain(reader: &mut dyn ChunkReader) -> String {
        let mut output = String::new();
        while let Some(chunk) = reader.read_chunk().unwrap() {
            output.push_str(&String::from_utf8_lossy(&chunk));
        }
        output
    }

    #[test]
    fn test_merges_stdout_and_stderr() {
        let backend = SubprocessBackend::new();
        assert!(backend.is_available());
        assert!(!backend.capabilities().resize);

        let request = ExecRequest::new("/bin/sh").args(["-c", "echo out; echo err >&2"]);
        let mut handle = backend.start(&request).unwrap();
        let output = drain(handle.take_reader().unwrap().as_mut());
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[test]
    fn test_stdin_round_trip() {
        let backend = SubprocessBackend::new();
        let mut handle = backend.start(&ExecRequest::new("cat")).unwrap();
        let mut reader = handle.take_reader().unwrap();

        handle.write(b"ping\n").unwrap();
        let chunk = reader.read_chunk().unwrap().unwrap();
        assert_eq!(chunk, b"ping\n");

        handle.terminate().unwrap();
        assert!(handle.write(b"late").is_err());
        assert!(handle.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_resize_is_rejected() {
        let backend = SubprocessBackend::new();
        let mut handle = backend.start(&ExecRequest::new("true")).unwrap();
        assert!(handle.resize_pty(Dimensions::new(10, 10)).is_err());
    }

    #[test]
    fn test_missing_command_fails_to_start() {
        let result = SubprocessBackend::new().start(&ExecRequest::new("/nonexistent/command/xyz"));
        assert!(matches!(result, Err(Error::BackendStart { .. })));
    }

    #[test]
    fn test_size_exported_in_environment() {
        let backend = SubprocessBackend::new();
        let request = ExecRequest::new("/bin/sh")
            .args(["-c", "echo $COLUMNS $LINES"])
            .dimensions(Dimensions::new(30, 100));
        let mut handle = backend.start(&request).unwrap();
        let output = drain(handle.take_reader().unwrap().as_mut());
        assert_eq!(output.trim(), "100 30");
    }
}
