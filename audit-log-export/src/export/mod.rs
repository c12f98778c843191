use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    error::WriteError,
    model::{LogBatch, LogRecord, LOG_COLUMNS},
};

pub mod csv;
pub mod xlsx;

pub const FILE_PREFIX: &str = "Logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    fn encode(&self, rows: &[Vec<Cell>]) -> Result<Vec<u8>, WriteError> {
        match self {
            ExportFormat::Xlsx => xlsx::encode(rows),
            ExportFormat::Csv => csv::encode(rows),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unknown export format: {other}")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One rendered cell of the export.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Cell::Empty,
            Some(Value::String(s)) => Cell::Text(s.clone()),
            Some(Value::Bool(b)) => Cell::Bool(*b),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) => Cell::Number(f),
                None => Cell::Text(n.to_string()),
            },
            // Nested objects such as details and auth0_client end up as compact JSON
            Some(other) => Cell::Text(other.to_string()),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

/// Project a record onto the fixed column schema.
pub fn record_row(record: &LogRecord) -> Vec<Cell> {
    LOG_COLUMNS
        .iter()
        .map(|column| Cell::from_value(record.get(column)))
        .collect()
}

pub fn rows(batch: &LogBatch) -> Vec<Vec<Cell>> {
    batch.records.iter().map(record_row).collect()
}

/// `Logs_{first}-{last}.{ext}` from the dates embedded in the first and last
/// log ids, or `Logs_empty.{ext}` when there is nothing to name it after.
pub fn export_file_name(batch: &LogBatch, format: ExportFormat) -> String {
    let ext = format.extension();
    match (batch.first(), batch.last()) {
        (Some(first), Some(last)) => format!(
            "{FILE_PREFIX}_{}-{}.{ext}",
            date_component(first),
            date_component(last)
        ),
        _ => format!("{FILE_PREFIX}_empty.{ext}"),
    }
}

// Only ASCII alphanumerics survive, a log id can't steer the file elsewhere
fn date_component(record: &LogRecord) -> String {
    record
        .date_fragment()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// A fully serialized export that has not touched the filesystem yet.
#[derive(Debug)]
pub struct PreparedExport {
    pub file_name: String,
    pub rows: usize,
    bytes: Vec<u8>,
}

impl PreparedExport {
    /// Write and sync the bytes to a temporary file inside `destination_dir`,
    /// creating the directory if needed. The final name is only claimed by
    /// [`StagedExport::commit`]; dropping the staged export removes the file.
    pub fn stage(self, destination_dir: &Path) -> Result<StagedExport, WriteError> {
        std::fs::create_dir_all(destination_dir).map_err(|source| WriteError::CreateDir {
            path: destination_dir.to_path_buf(),
            source,
        })?;

        let path = destination_dir.join(&self.file_name);
        let io_err = |source| WriteError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(destination_dir).map_err(io_err)?;
        tmp.write_all(&self.bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        Ok(StagedExport {
            tmp,
            path,
            rows: self.rows,
        })
    }

    /// Stage and commit in one go, replacing any file of the same name.
    pub fn persist(self, destination_dir: &Path) -> Result<PathBuf, WriteError> {
        self.stage(destination_dir)?.commit()
    }
}

/// An export already written and synced next to its destination. Only the
/// rename into place is left.
#[derive(Debug)]
pub struct StagedExport {
    tmp: NamedTempFile,
    path: PathBuf,
    rows: usize,
}

impl StagedExport {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(self) -> Result<PathBuf, WriteError> {
        let path = self.path;
        self.tmp.persist(&path).map_err(|e| WriteError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        info!(rows = self.rows, "Wrote export to {}", path.display());
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportWriter {
    format: ExportFormat,
}

impl ExportWriter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Serialize the batch without writing anything, so serialization problems
    /// surface before the caller commits its checkpoint.
    pub fn prepare(&self, batch: &LogBatch) -> Result<PreparedExport, WriteError> {
        let rows = rows(batch);
        let bytes = self.format.encode(&rows)?;
        Ok(PreparedExport {
            file_name: export_file_name(batch, self.format),
            rows: rows.len(),
            bytes,
        })
    }

    pub fn write(&self, batch: &LogBatch, destination_dir: &Path) -> Result<PathBuf, WriteError> {
        self.prepare(batch)?.persist(destination_dir)
    }
}
