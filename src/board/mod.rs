//! Board discovery from the backend's `board list` output.
//!
//! # Structure
//!
//! - [`parse`] - Header-driven parsing of the listing table
//! - [`select`] - USB serial filtering and target resolution

mod parse;
mod select;

pub use parse::{parse_board_list, DeviceRecord, UNKNOWN_NAME};
pub use select::{
    is_serial_capable, resolve_choice, select_board, serial_boards, BoardPrompt, LinePrompt,
    NoPrompt, SelectError,
};

/// Render boards as an aligned table with Port, Board Name, Type and FQBN columns.
pub fn format_board_table(boards: &[&DeviceRecord]) -> String {
    const HEADERS: [&str; 4] = ["Port", "Board Name", "Type", "FQBN"];

    let rows: Vec<[&str; 4]> = boards
        .iter()
        .map(|b| {
            [
                b.port.as_str(),
                b.device_name.as_str(),
                b.device_type.as_str(),
                b.board_id.as_deref().unwrap_or("—"),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: &[&str; 4]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_row(&HEADERS);
    for row in &rows {
        push_row(row);
    }
    out
}
