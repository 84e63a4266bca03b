//! Classification and terminal rendering of backend output lines.
//!
//! Upload progress lines are drawn over each other on a single terminal row
//! while every other line scrolls normally. Compiler errors and warnings get
//! ANSI colouring.

use std::sync::LazyLock;

use regex::Regex;

/// Fixed width of the self-overwriting progress row.
pub const PROGRESS_LINE_WIDTH: usize = 140;

const BOLD_RED: &str = "\x1b[1;31m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

static UPLOAD_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Writing at 0x[0-9a-f]+.*\d+\.\d+%").expect("valid regex"));

/// Diagnostic patterns in match order; the first hit decides the kind.
static DIAGNOSTIC_PATTERNS: LazyLock<Vec<(Regex, LineKind)>> = LazyLock::new(|| {
    [
        (r"(?i)fatal error:", LineKind::Fatal),
        (r"(?i)^Error during build:", LineKind::Fatal),
        (r"(?i)compilation terminated", LineKind::Error),
        (r"(?i):\d+:\d+: error:", LineKind::Error),
        (r"(?i):\d+:\d+: warning:", LineKind::Warning),
    ]
    .into_iter()
    .map(|(p, kind)| (Regex::new(p).expect("valid regex"), kind))
    .collect()
});

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));

/// What kind of output a line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Flash write progress, e.g. `Writing at 0x00010000... 42.37%`
    Progress,
    /// Build-stopping failure (`fatal error:`, `Error during build:`)
    Fatal,
    /// Compiler error or `compilation terminated`
    Error,
    /// Compiler warning
    Warning,
    Plain,
}

/// Classify one line of backend output.
///
/// Colour escapes the backend emits are ignored for matching.
pub fn classify(line: &str) -> LineKind {
    let text = ANSI_ESCAPE.replace_all(line, "");
    if UPLOAD_PROGRESS.is_match(&text) {
        return LineKind::Progress;
    }
    DIAGNOSTIC_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&text))
        .map(|(_, kind)| *kind)
        .unwrap_or(LineKind::Plain)
}

/// Turns a sequence of output lines into the bytes to write to the terminal.
///
/// Tracks whether the cursor currently sits on an unterminated progress row,
/// so the first regular line after a run of progress updates starts on a
/// fresh line instead of overwriting the last update.
#[derive(Debug)]
pub struct StreamRenderer {
    in_progress: bool,
    styled: bool,
}

impl Default for StreamRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl StreamRenderer {
    /// Create a renderer; `styled` enables colouring of errors and warnings.
    pub fn new(styled: bool) -> Self {
        Self {
            in_progress: false,
            styled,
        }
    }

    /// Whether the last rendered line was a progress update.
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Render one line. Returns `None` for empty lines, which are dropped.
    pub fn render(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let kind = classify(line);
        if kind == LineKind::Progress {
            self.in_progress = true;
            return Some(progress_row(line));
        }

        let mut out = String::new();
        if self.in_progress {
            out.push('\n');
            self.in_progress = false;
        }
        let line = line.trim_end();
        match style_for(kind).filter(|_| self.styled) {
            Some(style) => out.push_str(&format!("{}{}{}", style, line, RESET)),
            None => out.push_str(line),
        }
        out.push('\n');
        Some(out)
    }

    /// Terminate a dangling progress row at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.in_progress {
            self.in_progress = false;
            Some("\n".to_string())
        } else {
            None
        }
    }
}

fn style_for(kind: LineKind) -> Option<&'static str> {
    match kind {
        LineKind::Fatal => Some(BOLD_RED),
        LineKind::Error => Some(RED),
        LineKind::Warning => Some(YELLOW),
        LineKind::Progress | LineKind::Plain => None,
    }
}

/// Carriage return plus the line cut or padded to the progress width.
fn progress_row(line: &str) -> String {
    let clipped: String = line.chars().take(PROGRESS_LINE_WIDTH).collect();
    format!("\r{:<width$}", clipped, width = PROGRESS_LINE_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_progress() {
        assert_eq!(
            classify("Writing at 0x00010000... (10 %) 42.37%"),
            LineKind::Progress
        );
        assert_eq!(classify("Writing at 0x0001a3f0... 99.00%"), LineKind::Progress);
        assert_eq!(classify("Writing at 0x00010000..."), LineKind::Plain);
    }

    #[test]
    fn test_classify_errors() {
        assert_eq!(
            classify("sketch.ino:1:10: fatal error: Foo.h: No such file or directory"),
            LineKind::Fatal
        );
        assert_eq!(
            classify("Error during build: exit status 1"),
            LineKind::Fatal
        );
        assert_eq!(classify("compilation terminated."), LineKind::Error);
        assert_eq!(
            classify("/tmp/sketch/sketch.ino:12:5: error: 'foo' was not declared"),
            LineKind::Error
        );
        // The build-failure prefix must start the line.
        assert_eq!(classify("note: Error during build:"), LineKind::Plain);
    }

    #[test]
    fn test_classify_warning() {
        assert_eq!(
            classify("sketch.ino:4:7: warning: unused variable 'x'"),
            LineKind::Warning
        );
        assert_eq!(
            classify("sketch.ino:4:7: WARNING: unused variable 'x'"),
            LineKind::Warning
        );
    }

    #[test]
    fn test_classify_ignores_ansi() {
        assert_eq!(
            classify("\x1b[31mError during build:\x1b[0m exit status 1"),
            LineKind::Fatal
        );
    }

    #[test]
    fn test_progress_collapsing() {
        let mut renderer = StreamRenderer::new(false);

        let first = renderer.render("Writing at 0x00010000... 10.00%").unwrap();
        let second = renderer.render("Writing at 0x00010000... 99.00%").unwrap();
        assert!(first.starts_with('\r'));
        assert!(second.starts_with('\r'));
        assert!(!first.contains('\n'));
        assert!(!second.contains('\n'));
        assert_eq!(first.chars().count(), PROGRESS_LINE_WIDTH + 1);
        assert!(renderer.in_progress());

        let plain = renderer.render("Hard resetting via RTS pin...").unwrap();
        assert_eq!(plain, "\nHard resetting via RTS pin...\n");
        assert_eq!(plain.matches('\n').count(), 2);
        assert!(!renderer.in_progress());

        let next = renderer.render("Leaving...").unwrap();
        assert_eq!(next, "Leaving...\n");
    }

    #[test]
    fn test_progress_row_truncated() {
        let long = format!("Writing at 0x00010000... {} 50.00%", "x".repeat(200));
        let row = progress_row(&long);
        assert_eq!(row.chars().count(), PROGRESS_LINE_WIDTH + 1);
    }

    #[test]
    fn test_empty_lines_dropped() {
        let mut renderer = StreamRenderer::new(true);
        assert!(renderer.render("").is_none());
        assert!(renderer.render("   \r\n").is_none());
    }

    #[test]
    fn test_styled_error_and_warning() {
        let mut renderer = StreamRenderer::new(true);
        let fatal = renderer.render("a.ino:1:10: fatal error: Foo.h").unwrap();
        assert_eq!(fatal, format!("{}a.ino:1:10: fatal error: Foo.h{}\n", BOLD_RED, RESET));
        let build = renderer.render("Error during build: exit status 1").unwrap();
        assert!(build.starts_with(BOLD_RED));

        let err = renderer.render("a.ino:1:1: error: boom").unwrap();
        assert_eq!(err, format!("{}a.ino:1:1: error: boom{}\n", RED, RESET));
        let terminated = renderer.render("compilation terminated.").unwrap();
        assert_eq!(terminated, format!("{}compilation terminated.{}\n", RED, RESET));

        let warn = renderer.render("a.ino:1:1: warning: hmm").unwrap();
        assert_eq!(warn, format!("{}a.ino:1:1: warning: hmm{}\n", YELLOW, RESET));
    }

    #[test]
    fn test_unstyled_leaves_diagnostics_plain() {
        let mut renderer = StreamRenderer::new(false);
        let err = renderer.render("a.ino:1:1: error: boom").unwrap();
        assert_eq!(err, "a.ino:1:1: error: boom\n");
    }

    #[test]
    fn test_finish_terminates_progress() {
        let mut renderer = StreamRenderer::new(true);
        assert!(renderer.finish().is_none());
        renderer.render("Writing at 0x00000000... 1.00%");
        assert_eq!(renderer.finish().as_deref(), Some("\n"));
        assert!(renderer.finish().is_none());
    }
}
