//! Compile, upload and monitor workflows on top of the backend runner.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::backend::{Backend, RunStatus, INFO_TIMEOUT, LIST_TIMEOUT};
use crate::board::{
    format_board_table, parse_board_list, select_board, serial_boards, BoardPrompt, DeviceRecord,
};
use crate::error::AppError;

/// `compile --fqbn <fqbn> <sketch>`
pub fn compile_args(fqbn: &str, sketch: &Path) -> Vec<String> {
    vec![
        "compile".to_string(),
        "--fqbn".to_string(),
        fqbn.to_string(),
        sketch.display().to_string(),
    ]
}

/// `upload --fqbn <fqbn>:UploadSpeed=<speed> --port <port> <sketch>`
pub fn upload_args(fqbn: &str, port: &str, speed: u32, sketch: &Path) -> Vec<String> {
    vec![
        "upload".to_string(),
        "--fqbn".to_string(),
        format!("{}:UploadSpeed={}", fqbn, speed),
        "--port".to_string(),
        port.to_string(),
        sketch.display().to_string(),
    ]
}

/// `monitor --port <port> --config baudrate=<baudrate>`
pub fn monitor_args(port: &str, baudrate: u32) -> Vec<String> {
    vec![
        "monitor".to_string(),
        "--port".to_string(),
        port.to_string(),
        "--config".to_string(),
        format!("baudrate={}", baudrate),
    ]
}

/// Resolve a sketch path to an absolute directory when it exists.
///
/// The backend runs inside the sketch directory and also receives the path
/// as an argument, so a relative path would be resolved twice.
pub fn resolve_sketch(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn as_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

/// Settings for a compile, upload and monitor run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub fqbn: String,
    pub port: Option<String>,
    pub upload_speed: u32,
    pub baudrate: u32,
    pub sketch: PathBuf,
}

/// A sequence of backend invocations sharing one output.
pub struct Session<'a, W: Write> {
    backend: &'a Backend,
    out: W,
}

impl<'a, W: Write> Session<'a, W> {
    pub fn new(backend: &'a Backend, out: W) -> Self {
        Self { backend, out }
    }

    /// Consume the session and return its output sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Compile the sketch for `fqbn`.
    pub fn compile(&mut self, fqbn: &str, sketch: &Path) -> Result<RunStatus, AppError> {
        writeln!(self.out, "Compiling with FQBN: {}", fqbn)?;
        let sketch = resolve_sketch(sketch);
        let args = compile_args(fqbn, &sketch);
        self.run_in(&args, Some(sketch.as_path()))
    }

    /// Upload the compiled sketch to `port` at `speed` baud.
    pub fn upload(
        &mut self,
        fqbn: &str,
        port: &str,
        speed: u32,
        sketch: &Path,
    ) -> Result<RunStatus, AppError> {
        writeln!(self.out, "Uploading to {} at {} baud", port, speed)?;
        let sketch = resolve_sketch(sketch);
        let args = upload_args(fqbn, port, speed, &sketch);
        self.run_in(&args, Some(sketch.as_path()))
    }

    /// Open the serial monitor; runs until the user interrupts it.
    pub fn monitor(&mut self, port: &str, baudrate: u32) -> Result<RunStatus, AppError> {
        writeln!(self.out, "Monitoring {} at {} baud", port, baudrate)?;
        writeln!(self.out, "Press Ctrl+C to exit monitor\n")?;
        let args = monitor_args(port, baudrate);
        self.run_in(&args, None)
    }

    /// Fetch and parse a fresh board listing, returning it with the raw text.
    pub fn list_boards(&self) -> Result<(Vec<DeviceRecord>, String), AppError> {
        let raw = self.backend.capture(&["board", "list"], LIST_TIMEOUT)?;
        Ok((parse_board_list(&raw), raw))
    }

    /// Show the raw listing, then pick the target board.
    ///
    /// `prompt` is consulted only when several USB boards are attached and
    /// no port was requested.
    pub fn detect_board(
        &mut self,
        port: Option<&str>,
        prompt: &mut dyn BoardPrompt,
    ) -> Result<DeviceRecord, AppError> {
        let (records, raw) = self.list_boards()?;
        writeln!(self.out, "{} board list:", self.backend.program())?;
        writeln!(self.out, "{}", raw.trim())?;
        self.out.flush()?;

        let board = select_board(&records, port, prompt)?;
        log::debug!("selected board {:?}", board);
        Ok(board.clone())
    }

    /// Detect the board, then compile, upload and monitor in sequence.
    ///
    /// Stops at the first step that does not succeed and returns its status.
    pub fn run_all(
        &mut self,
        plan: &RunPlan,
        prompt: &mut dyn BoardPrompt,
    ) -> Result<RunStatus, AppError> {
        writeln!(self.out, "Running: Compile → Upload → Monitor\n")?;

        writeln!(self.out, "Step 1/3: Detecting board...")?;
        let board = self.detect_board(plan.port.as_deref(), prompt)?;
        writeln!(self.out, "✓ Found board: {}", board.port)?;

        writeln!(self.out, "\nStep 2/3: Compiling sketch...")?;
        let status = self.compile(&plan.fqbn, &plan.sketch)?;
        if !status.success() {
            return Ok(status);
        }
        writeln!(self.out, "✓ Compilation successful\n")?;

        writeln!(self.out, "Step 3/3: Uploading to {}...", board.port)?;
        let status = self.upload(&plan.fqbn, &board.port, plan.upload_speed, &plan.sketch)?;
        if !status.success() {
            return Ok(status);
        }
        writeln!(self.out, "✓ Upload successful\n")?;

        writeln!(self.out, "Starting serial monitor on {}...", board.port)?;
        self.monitor(&board.port, plan.baudrate)
    }

    /// Print a table of attached USB serial boards.
    pub fn show_boards(&mut self) -> Result<(), AppError> {
        let (records, _) = self.list_boards()?;
        let usb = serial_boards(&records);
        if usb.is_empty() {
            writeln!(self.out, "No USB serial port boards found.")?;
            return Ok(());
        }
        writeln!(self.out, "Connected USB Boards")?;
        write!(self.out, "{}", format_board_table(&usb))?;
        Ok(())
    }

    /// Print the backend's `lib list` output.
    pub fn show_libraries(&mut self) -> Result<(), AppError> {
        self.show_captured(&["lib", "list"])
    }

    /// Print the backend's `core list` output.
    pub fn show_cores(&mut self) -> Result<(), AppError> {
        self.show_captured(&["core", "list"])
    }

    /// Print the backend version.
    pub fn show_version(&mut self) -> Result<(), AppError> {
        let version = self.backend.version()?;
        writeln!(self.out, "{}", version)?;
        Ok(())
    }

    fn show_captured(&mut self, args: &[&str]) -> Result<(), AppError> {
        let text = self.backend.capture(args, INFO_TIMEOUT)?;
        writeln!(self.out, "{}", text.trim_end())?;
        Ok(())
    }

    fn run_in(&mut self, args: &[String], cwd: Option<&Path>) -> Result<RunStatus, AppError> {
        let cwd = cwd.filter(|dir| dir.is_dir());
        let status = self.backend.run_to(&as_strs(args), cwd, &mut self.out)?;
        Ok(status)
    }
}
