//! Parsing of the backend's `board list` table.
//!
//! The listing has no machine-readable contract: a header row names the
//! columns and every following row is split on whitespace. Column positions
//! are taken from the header with a fallback per column, and rows that don't
//! fit are dropped rather than reported.

/// Placeholder used when a row has no board name column.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Protocol column index assumed when the header doesn't name one.
const DEFAULT_PROTOCOL_INDEX: usize = 1;

/// One row of a device listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub port: String,
    pub protocol: String,
    pub device_type: String,
    pub device_name: String,
    /// FQBN reported for the board, if the backend recognised it.
    pub board_id: Option<String>,
    /// The untouched listing row, kept for heuristic classification.
    pub raw_line: String,
}

/// Column positions derived from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    port: usize,
    protocol: usize,
    device_type: usize,
    name: Option<usize>,
    board_id: Option<usize>,
}

impl Columns {
    /// Locate columns in a header line.
    ///
    /// Returns `None` when a required column (`Port` or `Type`) is missing.
    fn from_header(header: &str) -> Option<Self> {
        let names: Vec<&str> = header.split_whitespace().collect();
        let find = |name: &str| names.iter().position(|n| *n == name);

        let port = find("Port")?;
        let device_type = find("Type")?;
        let protocol = find("Protocol").unwrap_or(DEFAULT_PROTOCOL_INDEX);
        // A "Board Name" header tokenizes to "Board" "Name", so looking up
        // "Board" covers both spellings; "Name" alone is the last resort.
        let name = find("Board").or_else(|| find("Name"));
        let board_id = find("FQBN");

        Some(Self {
            port,
            protocol,
            device_type,
            name,
            board_id,
        })
    }

    fn record(&self, line: &str) -> Option<DeviceRecord> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let port = parts.get(self.port)?.to_string();

        let protocol = parts
            .get(self.protocol)
            .map(|p| p.to_string())
            .unwrap_or_default();

        let type_end = match self.name {
            Some(name) if self.device_type < name => name.min(parts.len()),
            _ => parts.len(),
        };
        let device_type = parts
            .get(self.device_type..type_end)
            .map(|tokens| tokens.join(" "))
            .unwrap_or_default();

        let device_name = self
            .name
            .and_then(|i| parts.get(i))
            .map(|n| n.to_string())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let board_id = self
            .board_id
            .and_then(|i| parts.get(i))
            .map(|id| id.to_string());

        Some(DeviceRecord {
            port,
            protocol,
            device_type,
            device_name,
            board_id,
            raw_line: line.to_string(),
        })
    }
}

/// Parse `board list` output into device records, preserving row order.
///
/// Never fails: a listing without a usable header yields an empty list and
/// rows too short to carry a port are skipped.
pub fn parse_board_list(output: &str) -> Vec<DeviceRecord> {
    let mut lines = output.trim().lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let Some(columns) = Columns::from_header(header) else {
        log::debug!("board list header has no Port/Type column: {:?}", header);
        return Vec::new();
    };

    lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let record = columns.record(line);
            if record.is_none() {
                log::debug!("skipping short board list row: {:?}", line);
            }
            record
        })
        .collect()
}
