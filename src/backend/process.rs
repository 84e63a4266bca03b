//! Spawning and supervising backend tool processes.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::error::BackendError;
use super::stream::StreamRenderer;
use crate::interrupt::{Interrupt, INTERRUPTED_EXIT_CODE};

/// Default backend binary.
pub const DEFAULT_PROGRAM: &str = "arduino-cli";

/// Bound on the `version` availability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on `board list`.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on `lib list` and `core list`.
pub const INFO_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a terminated child gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of a streamed backend command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The child ran to completion with this exit code
    Exited(i32),
    /// The user interrupted the command and the child was stopped
    Interrupted,
}

impl RunStatus {
    /// Exit code to report for this outcome.
    pub fn code(self) -> i32 {
        match self {
            RunStatus::Exited(code) => code,
            RunStatus::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }

    pub fn success(self) -> bool {
        self.code() == 0
    }
}

/// Output collected from a command run to completion.
#[derive(Debug)]
struct Captured {
    code: i32,
    stdout: String,
    stderr: String,
}

/// Handle on the backend tool binary.
#[derive(Debug, Clone)]
pub struct Backend {
    program: String,
    interrupt: Interrupt,
    styled: bool,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Backend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            interrupt: Interrupt::new(),
            styled: true,
        }
    }

    /// Share an interruption flag, normally the one the Ctrl+C handler sets.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Enable or disable colouring of error and warning lines.
    pub fn with_styling(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The full command line for `args`, as shown to the user.
    pub fn command_line(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Ensure the backend binary exists and answers `version` in time.
    pub fn check_available(&self) -> Result<(), BackendError> {
        match self.output_with_timeout(&["version"], PROBE_TIMEOUT) {
            Ok(captured) if captured.code == 0 => Ok(()),
            Ok(captured) => {
                log::debug!("{} version exited with {}", self.program, captured.code);
                Err(self.unavailable())
            }
            Err(e) => {
                log::debug!("{} version probe failed: {}", self.program, e);
                Err(self.unavailable())
            }
        }
    }

    /// Run a short command and return its stdout.
    ///
    /// The availability probe runs first. A non-zero exit becomes
    /// [`BackendError::CommandFailed`] carrying stderr (or stdout if stderr
    /// is empty).
    pub fn capture(&self, args: &[&str], timeout: Duration) -> Result<String, BackendError> {
        self.check_available()?;

        let captured = self.output_with_timeout(args, timeout)?;
        if captured.code != 0 {
            let output = if captured.stderr.trim().is_empty() {
                captured.stdout
            } else {
                captured.stderr
            };
            return Err(BackendError::CommandFailed {
                command: self.command_line(args),
                code: captured.code,
                output: output.trim_end().to_string(),
            });
        }
        Ok(captured.stdout)
    }

    /// Backend version text.
    pub fn version(&self) -> Result<String, BackendError> {
        self.capture(&["version"], PROBE_TIMEOUT)
            .map(|out| out.trim().to_string())
    }

    /// Run a command, relaying its output live to stdout.
    pub fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<RunStatus, BackendError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.run_to(args, cwd, &mut out)
    }

    /// Run a command, relaying its merged stdout and stderr to `out`.
    ///
    /// Upload progress lines overwrite each other in place and errors and
    /// warnings are highlighted. Returns once the child has exited or, after
    /// an interruption, has been stopped. On a non-zero exit the command line
    /// and working directory are echoed to `out`.
    pub fn run_to<W: Write>(
        &self,
        args: &[&str],
        cwd: Option<&Path>,
        out: &mut W,
    ) -> Result<RunStatus, BackendError> {
        self.check_available()?;

        let command_line = self.command_line(args);

        // stdout and stderr share one pipe so lines keep the order the child
        // wrote them in.
        let (reader, writer) = std::io::pipe()?;
        let writer_err = writer.try_clone()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::inherit())
            .stdout(writer)
            .stderr(writer_err)
            .env_remove("NO_COLOR");
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        // Ctrl+C belongs to this run from before the child exists until it
        // has been reaped.
        let guard = self.interrupt.begin_stream();

        log::debug!("spawning: {}", command_line);
        let spawned = cmd.spawn();
        // The command holds the parent's write ends; the reader only sees EOF
        // once they are closed.
        drop(cmd);
        let mut child = spawned.map_err(|e| self.spawn_error(e))?;

        let (tx, rx) = mpsc::channel();
        let forwarder = spawn_line_reader(reader, tx);

        let mut renderer = StreamRenderer::new(self.styled);

        while !self.interrupt.is_requested() {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    if let Some(text) = renderer.render(&line) {
                        out.write_all(text.as_bytes())?;
                        out.flush()?;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if let Some(text) = renderer.finish() {
            out.write_all(text.as_bytes())?;
        }

        if self.interrupt.is_requested() {
            let status = terminate(&mut child)?;
            drop(guard);
            log::debug!("{} stopped after interrupt: {}", command_line, status);
            writeln!(out, "\nInterrupted by user")?;
            out.flush()?;
            return Ok(RunStatus::Interrupted);
        }

        let status = child.wait()?;
        drop(guard);
        let _ = forwarder.join();

        let code = exit_code(status);
        if code != 0 {
            writeln!(out, "\nCommand: {}", command_line)?;
            if let Some(dir) = cwd {
                writeln!(out, "Working directory: {}", dir.display())?;
            }
        }
        out.flush()?;
        Ok(RunStatus::Exited(code))
    }

    /// Run to completion with a deadline, collecting stdout and stderr.
    fn output_with_timeout(
        &self,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Captured, BackendError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().map(spawn_collector);
        let stderr = child.stderr.take().map(spawn_collector);

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() > timeout {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("{} timed out after {:?}", self.command_line(args), timeout);
                return Err(BackendError::TimedOut {
                    command: self.command_line(args),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let collect = |handle: Option<JoinHandle<String>>| {
            handle.and_then(|h| h.join().ok()).unwrap_or_default()
        };
        Ok(Captured {
            code: exit_code(status),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }

    fn unavailable(&self) -> BackendError {
        BackendError::Unavailable {
            program: self.program.clone(),
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> BackendError {
        if e.kind() == std::io::ErrorKind::NotFound {
            self.unavailable()
        } else {
            BackendError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            }
        }
    }
}

/// Send every line of `source` to `tx`; both `\n` and `\r` end a line.
///
/// Lines are sent as soon as their terminator arrives, so carriage-return
/// progress updates are not held back until the next newline.
fn forward_lines<R: Read>(source: R, tx: &Sender<String>) {
    let mut reader = BufReader::new(source);
    let mut pending: Vec<u8> = Vec::new();

    let flush = |pending: &mut Vec<u8>| -> bool {
        if pending.is_empty() {
            return true;
        }
        let line = String::from_utf8_lossy(pending).into_owned();
        pending.clear();
        tx.send(line).is_ok()
    };

    loop {
        let chunk = match reader.fill_buf() {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        let len = chunk.len();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !flush(&mut pending) {
                    return;
                }
            } else {
                pending.push(byte);
            }
        }
        reader.consume(len);
    }
    flush(&mut pending);
}

fn spawn_line_reader<R: Read + Send + 'static>(source: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || forward_lines(source, &tx))
}

fn spawn_collector<R: Read + Send + 'static>(mut source: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Ask the child to stop, killing it if it is still alive after the grace period.
fn terminate(child: &mut Child) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        // SAFETY: kill(2) on the pid of a child we still own and have not reaped.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() > TERMINATE_GRACE {
            let _ = child.kill();
            return child.wait();
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Exit code of a finished child; signal deaths map to 128 + signal on unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines_of(input: &[u8]) -> Vec<String> {
        let (tx, rx) = mpsc::channel();
        forward_lines(Cursor::new(input.to_vec()), &tx);
        drop(tx);
        rx.iter().collect()
    }

    #[test]
    fn test_forward_lines_splits_on_newline_and_cr() {
        let lines = lines_of(b"one\ntwo\r\nWriting 1%\rWriting 2%\rdone");
        assert_eq!(lines, vec!["one", "two", "Writing 1%", "Writing 2%", "done"]);
    }

    #[test]
    fn test_forward_lines_skips_empty() {
        let lines = lines_of(b"\n\n\r\nonly\n\n");
        assert_eq!(lines, vec!["only"]);
    }

    #[test]
    fn test_forward_lines_lossy_utf8() {
        let lines = lines_of(b"bad \xff byte\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad "));
    }

    #[test]
    fn test_run_status_code() {
        assert_eq!(RunStatus::Exited(0).code(), 0);
        assert!(RunStatus::Exited(0).success());
        assert_eq!(RunStatus::Exited(2).code(), 2);
        assert_eq!(RunStatus::Interrupted.code(), INTERRUPTED_EXIT_CODE);
        assert!(!RunStatus::Interrupted.success());
    }

    #[test]
    fn test_command_line() {
        let backend = Backend::default();
        assert_eq!(
            backend.command_line(&["compile", "--fqbn", "esp32:esp32:esp32", "."]),
            "arduino-cli compile --fqbn esp32:esp32:esp32 ."
        );
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let backend = Backend::new("sketchrun-no-such-binary-xyz");
        let err = backend.check_available().unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
        assert!(matches!(
            backend.run_to(&["compile"], None, &mut std::io::sink()),
            Err(BackendError::Unavailable { .. })
        ));
    }
}
