//! Native Unix pseudo-terminal backend.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::termios::Termios;
use nix::unistd::{setsid, Pid};
use tracing::{debug, info, warn};

use ptyrender_core::{Dimensions, Error, Platform, Result};

use super::{
    BackendHandle, BackendKind, Capabilities, ChunkReader, ExecRequest, PtyBackend, ReadChunks,
};

const NAME: &str = "unix-pty";

/// How long a child gets to exit after SIGHUP before it is killed.
const HANGUP_GRACE: Duration = Duration::from_millis(250);
const HANGUP_POLL: Duration = Duration::from_millis(10);

fn winsize(dimensions: Dimensions) -> Winsize {
    Winsize {
        ws_row: dimensions.rows,
        ws_col: dimensions.cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

/// Pseudo-terminal allocated with `openpty`, child placed in a new session
/// with the slave as its controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPtyBackend;

impl UnixPtyBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl PtyBackend for UnixPtyBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn kind(&self) -> BackendKind {
        BackendKind::NativePty
    }

    fn platforms(&self) -> &'static [Platform] {
        Platform::UNIX
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn is_available(&self) -> bool {
        match openpty(None::<&Winsize>, None::<&Termios>) {
            Ok(_) => true,
            Err(e) => {
                debug!("openpty probe failed: {}", e);
                false
            }
        }
    }

    fn start(&self, request: &ExecRequest) -> Result<Box<dyn BackendHandle>> {
        info!(
            "Spawning unix PTY: command='{}', dimensions={}",
            request.display_command(),
            request.dimensions
        );

        let start_error = |reason: String| Error::BackendStart {
            backend: NAME.to_string(),
            reason,
        };

        let pty = openpty(Some(&winsize(request.dimensions)), None::<&Termios>)
            .map_err(|e| start_error(format!("openpty failed: {e}")))?;

        let master = File::from(pty.master);
        fcntl(master.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|e| start_error(format!("failed to set FD_CLOEXEC: {e}")))?;
        let slave = File::from(pty.slave);

        let child = {
            let mut cmd = Command::new(&request.command);
            cmd.args(&request.args)
                .env("TERM", &request.term)
                .envs(request.env.iter().map(|(k, v)| (k, v)))
                .stdin(Stdio::from(slave.try_clone()?))
                .stdout(Stdio::from(slave.try_clone()?))
                .stderr(Stdio::from(slave));
            if let Some(cwd) = &request.cwd {
                cmd.current_dir(cwd);
            }

            // SAFETY: only async-signal-safe calls between fork and exec
            unsafe {
                cmd.pre_exec(|| {
                    setsid().map_err(io::Error::from)?;
                    if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }

            cmd.spawn()
                .map_err(|e| start_error(format!("spawn '{}' failed: {e}", request.command)))?
            // `cmd` drops here, closing the parent's copies of the slave
        };

        let reader = master.try_clone()?;
        info!("Unix PTY spawned: pid={}", child.id());

        Ok(Box::new(UnixPtyHandle {
            child,
            master,
            reader: Some(reader),
            chunk_size: request.chunk_size,
        }))
    }
}

/// Exit code, or 128 + signal number for a signalled child.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

struct UnixPtyHandle {
    child: Child,
    master: File,
    reader: Option<File>,
    chunk_size: usize,
}

impl BackendHandle for UnixPtyHandle {
    fn take_reader(&mut self) -> Result<Box<dyn ChunkReader>> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| Error::Pty("PTY reader already taken".to_string()))?;
        Ok(Box::new(ReadChunks::new(reader, self.chunk_size)))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        debug!("Writing {} bytes to unix PTY", data.len());
        self.master.write_all(data)?;
        self.master.flush()?;
        Ok(data.len())
    }

    fn resize_pty(&mut self, dimensions: Dimensions) -> Result<()> {
        dimensions.validate()?;
        let size = winsize(dimensions);
        // SAFETY: TIOCSWINSZ reads a `winsize` through the pointer; `size` outlives the call
        let rc = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ as _, &size) };
        if rc == -1 {
            return Err(Error::Pty(format!(
                "TIOCSWINSZ failed: {}",
                io::Error::last_os_error()
            )));
        }
        info!("Resized unix PTY to {}", dimensions);
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code))
    }

    fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        info!("Terminating unix PTY child: pid={}", self.child.id());
        let pid = Pid::from_raw(self.child.id() as i32);
        match kill(pid, Signal::SIGHUP) {
            Ok(()) => {
                let deadline = Instant::now() + HANGUP_GRACE;
                while Instant::now() < deadline {
                    if let Some(status) = self.child.try_wait()? {
                        debug!("Child {} exited on SIGHUP: {:?}", pid, status);
                        return Ok(());
                    }
                    std::thread::sleep(HANGUP_POLL);
                }
                debug!("Child {} ignored SIGHUP, killing", pid);
            }
            Err(e) => warn!("SIGHUP to {} failed: {}", pid, e),
        }

        match self.child.kill() {
            Ok(()) => {}
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(Error::Pty(format!("Kill failed: {e}"))),
        }
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for UnixPtyHandle {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_until(reader: &mut dyn ChunkReader, needle: &str) -> String {
        let mut output = String::new();
        while let Ok(Some(chunk)) = reader.read_chunk() {
            output.push_str(&String::from_utf8_lossy(&chunk));
            if output.contains(needle) {
                break;
            }
        }
        output
    }

    #[test]
    fn test_unix_pty_available() {
        assert!(UnixPtyBackend::new().is_available());
    }

    #[test]
    fn test_unix_pty_echo_and_exit_code() {
        let backend = UnixPtyBackend::new();
        let request = ExecRequest::new("/bin/sh").args(["-c", "echo hello; exit 3"]);
        let mut handle = backend.start(&request).unwrap();
        let mut reader = handle.take_reader().unwrap();

        let output = read_until(reader.as_mut(), "hello");
        assert!(output.contains("hello"));

        // Drain to EOF
        while let Ok(Some(_)) = reader.read_chunk() {}

        let deadline = Instant::now() + Duration::from_secs(5);
        let code = loop {
            if let Some(code) = handle.try_wait().unwrap() {
                break code;
            }
            assert!(Instant::now() < deadline, "child did not exit");
            std::thread::sleep(Duration::from_millis(10));
        };
        assert_eq!(code, 3);
    }

    #[test]
    fn test_unix_pty_is_a_terminal_with_size() {
        let backend = UnixPtyBackend::new();
        let request = ExecRequest::new("/bin/sh")
            .args(["-c", "stty size; test -t 0 && echo TTY"])
            .dimensions(Dimensions::new(30, 100));
        let mut handle = backend.start(&request).unwrap();
        let mut reader = handle.take_reader().unwrap();

        let output = read_until(reader.as_mut(), "TTY");
        assert!(output.contains("30 100"));
        assert!(output.contains("TTY"));
    }

    #[test]
    fn test_unix_pty_write_resize_terminate() {
        let backend = UnixPtyBackend::new();
        let mut handle = backend.start(&ExecRequest::new("/bin/sh")).unwrap();
        let mut reader = handle.take_reader().unwrap();
        assert!(handle.take_reader().is_err());

        handle.resize_pty(Dimensions::new(40, 120)).unwrap();
        assert!(handle.resize_pty(Dimensions::new(0, 120)).is_err());

        handle.write(b"stty size\n").unwrap();
        let output = read_until(reader.as_mut(), "40 120");
        assert!(output.contains("40 120"));

        handle.terminate().unwrap();
        assert!(handle.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_unix_pty_terminate_lets_child_handle_hangup() {
        let backend = UnixPtyBackend::new();
        let request = ExecRequest::new("/bin/sh").args([
            "-c",
            "trap 'exit 7' HUP; echo ready; while :; do sleep 0.05; done",
        ]);
        let mut handle = backend.start(&request).unwrap();
        let mut reader = handle.take_reader().unwrap();
        assert!(read_until(reader.as_mut(), "ready").contains("ready"));

        handle.terminate().unwrap();
        assert_eq!(handle.try_wait().unwrap(), Some(7));
    }

    #[test]
    fn test_unix_pty_terminate_kills_child_ignoring_hangup() {
        let backend = UnixPtyBackend::new();
        let request = ExecRequest::new("/bin/sh")
            .args(["-c", "trap '' HUP; echo ready; while :; do sleep 0.05; done"]);
        let mut handle = backend.start(&request).unwrap();
        let mut reader = handle.take_reader().unwrap();
        assert!(read_until(reader.as_mut(), "ready").contains("ready"));

        let started = Instant::now();
        handle.terminate().unwrap();
        assert!(started.elapsed() >= HANGUP_GRACE);
        assert_eq!(handle.try_wait().unwrap(), Some(128 + libc::SIGKILL));
    }

    #[test]
    fn test_unix_pty_drop_kills_child() {
        let backend = UnixPtyBackend::new();
        let mut handle = backend
            .start(&ExecRequest::new("/bin/sh").args(["-c", "echo ready; exec sleep 30"]))
            .unwrap();
        let mut reader = handle.take_reader().unwrap();
        assert!(read_until(reader.as_mut(), "ready").contains("ready"));

        let started = Instant::now();
        drop(handle);
        // The slave side closes once the child is gone
        while let Ok(Some(_)) = reader.read_chunk() {}
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
