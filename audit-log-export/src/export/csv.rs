use super::Cell;
use crate::{error::WriteError, model::LOG_COLUMNS};

pub fn encode(rows: &[Vec<Cell>]) -> Result<Vec<u8>, WriteError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LOG_COLUMNS)?;
    for row in rows {
        writer.write_record(row.iter().map(Cell::to_text))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    writer
        .into_inner()
        .map_err(|e| WriteError::Csv(csv::Error::from(e.into_error())))
}
