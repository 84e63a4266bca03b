//! Serial board filtering and target selection.

use std::io::{BufRead, Write};

use super::parse::DeviceRecord;

/// Errors that can occur while resolving a target board.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("No USB serial port boards found ({total} device(s) listed, none are USB serial).\n\nConnect a USB board and try again.")]
    NoSerialBoards { total: usize },

    #[error("Port {port} not found.\nAvailable: {}", .available.join(", "))]
    PortNotFound { port: String, available: Vec<String> },

    #[error("Multiple USB boards found ({}); pass --port to choose one.", .ports.join(", "))]
    AmbiguousBoards { ports: Vec<String> },

    #[error("Enter a number between 1 and {count}.")]
    InvalidSelection { count: usize },

    #[error("No board selected: input closed")]
    PromptClosed,

    #[error("Prompt I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether a listed device looks like a USB serial port.
///
/// This is a heuristic over the backend's free text, not a protocol check:
/// the row or its type must mention `USB`, or the port name must contain
/// `usbserial` (macOS naming).
pub fn is_serial_capable(record: &DeviceRecord) -> bool {
    record.raw_line.contains("USB")
        || record.device_type.contains("USB")
        || record.port.contains("usbserial")
}

/// Filter a listing down to USB serial boards, keeping listing order.
pub fn serial_boards(records: &[DeviceRecord]) -> Vec<&DeviceRecord> {
    records.iter().filter(|r| is_serial_capable(r)).collect()
}

/// Interpret a typed menu choice.
///
/// # Returns
/// The zero-based candidate index, or `InvalidSelection` when the text is not
/// a number in `1..=count`; callers re-prompt on that error.
pub fn resolve_choice(input: &str, count: usize) -> Result<usize, SelectError> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(n - 1),
        _ => Err(SelectError::InvalidSelection { count }),
    }
}

/// Source of a user's choice among several candidate boards.
pub trait BoardPrompt {
    /// Return the zero-based index of the chosen candidate.
    fn choose(&mut self, candidates: &[&DeviceRecord]) -> Result<usize, SelectError>;
}

/// Numbered menu on a line-based input, re-asking until the answer is valid.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> BoardPrompt for LinePrompt<R, W> {
    fn choose(&mut self, candidates: &[&DeviceRecord]) -> Result<usize, SelectError> {
        writeln!(self.output, "Multiple USB boards found:")?;
        for (i, board) in candidates.iter().enumerate() {
            writeln!(
                self.output,
                "  {}. {} - {} ({})",
                i + 1,
                board.port,
                board.device_name,
                board.device_type
            )?;
        }

        loop {
            write!(self.output, "Select board (enter number): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(SelectError::PromptClosed);
            }
            match resolve_choice(&line, candidates.len()) {
                Ok(index) => return Ok(index),
                Err(e @ SelectError::InvalidSelection { .. }) => writeln!(self.output, "{}", e)?,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Prompt for contexts without a terminal: refuses to guess.
pub struct NoPrompt;

impl BoardPrompt for NoPrompt {
    fn choose(&mut self, candidates: &[&DeviceRecord]) -> Result<usize, SelectError> {
        Err(SelectError::AmbiguousBoards {
            ports: candidates.iter().map(|b| b.port.clone()).collect(),
        })
    }
}

/// Resolve the board to talk to.
///
/// # Arguments
/// * `records` - Every device from the listing
/// * `port` - Port requested by the user, if any
/// * `prompt` - Asked only when several serial boards match and no port was given
pub fn select_board<'a>(
    records: &'a [DeviceRecord],
    port: Option<&str>,
    prompt: &mut dyn BoardPrompt,
) -> Result<&'a DeviceRecord, SelectError> {
    let candidates = serial_boards(records);
    if candidates.is_empty() {
        return Err(SelectError::NoSerialBoards {
            total: records.len(),
        });
    }

    if let Some(port) = port {
        return candidates
            .iter()
            .find(|b| b.port == port)
            .copied()
            .ok_or_else(|| SelectError::PortNotFound {
                port: port.to_string(),
                available: candidates.iter().map(|b| b.port.clone()).collect(),
            });
    }

    if candidates.len() == 1 {
        return Ok(candidates[0]);
    }

    let index = prompt.choose(&candidates)?;
    candidates
        .get(index)
        .copied()
        .ok_or(SelectError::InvalidSelection {
            count: candidates.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(port: &str, device_type: &str, raw: &str) -> DeviceRecord {
        DeviceRecord {
            port: port.to_string(),
            protocol: "serial".to_string(),
            device_type: device_type.to_string(),
            device_name: "Unknown".to_string(),
            board_id: None,
            raw_line: raw.to_string(),
        }
    }

    fn usb(port: &str) -> DeviceRecord {
        record(port, "Serial", &format!("{} serial Serial Port (USB) Unknown", port))
    }

    /// Prompt that fails the test if it is ever consulted.
    struct Unreachable;

    impl BoardPrompt for Unreachable {
        fn choose(&mut self, _: &[&DeviceRecord]) -> Result<usize, SelectError> {
            panic!("prompt should not be used");
        }
    }

    #[test]
    fn test_serial_filter() {
        let records = vec![
            record("/dev/ttyUSB0", "Serial", "/dev/ttyUSB0 serial Serial Port (USB) Unknown"),
            record("/dev/cu.Bluetooth", "Serial", "/dev/cu.Bluetooth serial Bluetooth Unknown"),
        ];
        let serial = serial_boards(&records);
        assert_eq!(serial.len(), 1);
        assert_eq!(serial[0].port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_serial_filter_usbserial_port_name() {
        let r = record("/dev/cu.usbserial-0001", "Serial", "/dev/cu.usbserial-0001 serial Serial Port");
        assert!(is_serial_capable(&r));
        let r = record("/dev/cu.usbmodem1", "Serial", "/dev/cu.usbmodem1 serial Serial Port");
        assert!(!is_serial_capable(&r));
    }

    #[test]
    fn test_no_serial_boards() {
        let records = vec![record("192.168.1.5", "Network", "192.168.1.5 network Network Port")];
        let err = select_board(&records, None, &mut Unreachable).unwrap_err();
        assert!(matches!(err, SelectError::NoSerialBoards { total: 1 }));
    }

    #[test]
    fn test_unique_auto_select() {
        let records = vec![usb("/dev/ttyUSB0")];
        let board = select_board(&records, None, &mut Unreachable).unwrap();
        assert_eq!(board.port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_explicit_port() {
        let records = vec![usb("/dev/ttyUSB0"), usb("/dev/ttyUSB1")];
        let board = select_board(&records, Some("/dev/ttyUSB1"), &mut Unreachable).unwrap();
        assert_eq!(board.port, "/dev/ttyUSB1");
    }

    #[test]
    fn test_explicit_port_miss() {
        let records = vec![usb("/dev/ttyUSB0")];
        let err = select_board(&records, Some("/dev/ttyUSB9"), &mut Unreachable).unwrap_err();
        match err {
            SelectError::PortNotFound { port, available } => {
                assert_eq!(port, "/dev/ttyUSB9");
                assert_eq!(available, vec!["/dev/ttyUSB0".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_choice() {
        assert_eq!(resolve_choice("1", 3).unwrap(), 0);
        assert_eq!(resolve_choice(" 3\n", 3).unwrap(), 2);
        assert!(matches!(
            resolve_choice("0", 3),
            Err(SelectError::InvalidSelection { count: 3 })
        ));
        assert!(resolve_choice("4", 3).is_err());
        assert!(resolve_choice("two", 3).is_err());
    }

    #[test]
    fn test_line_prompt_reprompts() {
        let records = vec![usb("/dev/ttyUSB0"), usb("/dev/ttyUSB1")];
        let mut out = Vec::new();
        let mut prompt = LinePrompt::new(Cursor::new("9\nabc\n2\n"), &mut out);
        let board = select_board(&records, None, &mut prompt).unwrap();
        assert_eq!(board.port, "/dev/ttyUSB1");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1. /dev/ttyUSB0 - Unknown (Serial)"));
        assert!(text.contains("2. /dev/ttyUSB1"));
        assert_eq!(text.matches("Enter a number between 1 and 2.").count(), 2);
    }

    #[test]
    fn test_line_prompt_closed_input() {
        let records = vec![usb("/dev/ttyUSB0"), usb("/dev/ttyUSB1")];
        let mut prompt = LinePrompt::new(Cursor::new(""), Vec::<u8>::new());
        let err = select_board(&records, None, &mut prompt).unwrap_err();
        assert!(matches!(err, SelectError::PromptClosed));
    }

    #[test]
    fn test_no_prompt_reports_candidates() {
        let records = vec![usb("/dev/ttyUSB0"), usb("/dev/ttyUSB1")];
        let err = select_board(&records, None, &mut NoPrompt).unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("/dev/ttyUSB0, /dev/ttyUSB1"));
        assert!(msg.contains("--port"));
    }
}
