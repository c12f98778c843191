use rust_xlsxwriter::{Format, Workbook};

use super::Cell;
use crate::{error::WriteError, model::LOG_COLUMNS};

pub const SHEET_NAME: &str = "Sheet1";

// Hard limits of the file format
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_CELL_CHARS: usize = 32_767;

/// Serialize a header row plus `rows` into an in-memory workbook.
pub fn encode(rows: &[Vec<Cell>]) -> Result<Vec<u8>, WriteError> {
    // One row is taken by the header
    if rows.len() >= MAX_ROWS {
        return Err(WriteError::TooManyRows {
            rows: rows.len(),
            limit: MAX_ROWS - 1,
        });
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    for (col, name) in LOG_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (row_num, row) in (1u32..).zip(rows) {
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => {
                    worksheet.write_string(row_num, col, truncate_chars(text, MAX_CELL_CHARS))?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
