//! Cross-platform PTY backend built on portable-pty.

use std::io::{Read, Write};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, error, info};

use ptyrender_core::{Dimensions, Error, Platform, Result};

use super::{
    BackendHandle, BackendKind, Capabilities, ChunkReader, ExecRequest, PtyBackend, ReadChunks,
};

const NAME: &str = "portable-pty";

fn pty_size(dimensions: Dimensions) -> PtySize {
    PtySize {
        rows: dimensions.rows,
        cols: dimensions.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// PTY through the platform's native PTY system (ConPTY on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct PortablePtyBackend;

impl PortablePtyBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl PtyBackend for PortablePtyBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn kind(&self) -> BackendKind {
        BackendKind::EmulatedPty
    }

    fn platforms(&self) -> &'static [Platform] {
        Platform::ALL
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn is_available(&self) -> bool {
        match native_pty_system().openpty(PtySize::default()) {
            Ok(_) => true,
            Err(e) => {
                debug!("portable-pty probe failed: {}", e);
                false
            }
        }
    }

    fn start(&self, request: &ExecRequest) -> Result<Box<dyn BackendHandle>> {
        info!(
            "Spawning PTY: command='{}', dimensions={}, cwd={:?}",
            request.display_command(),
            request.dimensions,
            request.cwd
        );

        let start_error = |reason: String| Error::BackendStart {
            backend: NAME.to_string(),
            reason,
        };

        let pair = native_pty_system()
            .openpty(pty_size(request.dimensions))
            .map_err(|e| {
                error!("Failed to open PTY: {}", e);
                start_error(format!("Failed to open PTY: {e}"))
            })?;

        let mut cmd = CommandBuilder::new(&request.command);
        cmd.args(&request.args);
        cmd.env("TERM", &request.term);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &request.cwd {
            debug!("Setting working directory to: {}", dir.display());
            cmd.cwd(dir);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!("Failed to spawn command '{}': {}", request.command, e);
            start_error(format!("Failed to spawn command: {e}"))
        })?;
        // Close our copy of the slave so EOF arrives when the child exits
        drop(pair.slave);

        let writer = pair.master.take_writer().map_err(|e| {
            error!("Failed to take PTY writer: {}", e);
            start_error(format!("Failed to take writer: {e}"))
        })?;
        let reader = pair.master.try_clone_reader().map_err(|e| {
            error!("Failed to clone PTY reader: {}", e);
            start_error(format!("Failed to clone reader: {e}"))
        })?;

        info!("PTY spawned successfully: command='{}'", request.command);

        Ok(Box::new(PortablePtyHandle {
            master: pair.master,
            child,
            writer,
            reader: Some(reader),
            chunk_size: request.chunk_size,
        }))
    }
}

struct PortablePtyHandle {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    reader: Option<Box<dyn Read + Send>>,
    chunk_size: usize,
}

impl BackendHandle for PortablePtyHandle {
    fn take_reader(&mut self) -> Result<Box<dyn ChunkReader>> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| Error::Pty("PTY reader already taken".to_string()))?;
        Ok(Box::new(ReadChunks::new(reader, self.chunk_size)))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        debug!("Writing {} bytes to PTY", data.len());
        self.writer
            .write_all(data)
            .map_err(|e| Error::Pty(format!("Write failed: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| Error::Pty(format!("Flush failed: {e}")))?;
        Ok(data.len())
    }

    fn resize_pty(&mut self, dimensions: Dimensions) -> Result<()> {
        dimensions.validate()?;
        self.master
            .resize(pty_size(dimensions))
            .map_err(|e| Error::Pty(format!("Resize failed: {e}")))?;
        info!("Resized PTY to {}", dimensions);
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.try_wait()?;
        Ok(status.map(|status| status.exit_code() as i32))
    }

    fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        info!("Killing PTY child process");
        self.child
            .kill()
            .map_err(|e| Error::Pty(format!("Kill failed: {e}")))?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for PortablePtyHandle {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_portable_pty_spawn_and_read() {
        let backend = PortablePtyBackend::new();
        assert!(backend.is_available());

        let request = ExecRequest::new("/bin/sh").args(["-c", "echo portable"]);
        let mut handle = backend.start(&request).unwrap();
        let mut reader = handle.take_reader().unwrap();
        assert!(handle.take_reader().is_err());

        let mut output = String::new();
        while let Ok(Some(chunk)) = reader.read_chunk() {
            output.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(output.contains("portable"));
    }

    #[test]
    fn test_portable_pty_resize_and_kill() {
        let backend = PortablePtyBackend::new();
        let mut handle = backend.start(&ExecRequest::new("/bin/sh")).unwrap();

        handle.resize_pty(Dimensions::new(40, 120)).unwrap();
        assert!(handle.resize_pty(Dimensions::new(40, 0)).is_err());
        assert_eq!(handle.write(b"true\n").unwrap(), 5);

        handle.terminate().unwrap();
        assert!(handle.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_portable_pty_bad_command() {
        let backend = PortablePtyBackend::new();
        let result = backend.start(&ExecRequest::new("/nonexistent/command/xyz"));
        assert!(matches!(result, Err(Error::BackendStart { .. })));
    }
}
