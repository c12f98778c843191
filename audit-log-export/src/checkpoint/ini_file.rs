use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use ini::Ini;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::CheckpointStore;
use crate::{error::CheckpointError, model::Cursor};

pub const CHECKPOINT_SECTION: &str = "DEFAULT";
pub const CHECKPOINT_KEY: &str = "last_log_id";

/// Checkpoint kept in an INI file under `[DEFAULT] last_log_id`, the layout
/// configparser-style tools read and write.
#[derive(Debug, Clone)]
pub struct IniCheckpointStore {
    path: PathBuf,
}

impl IniCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // A missing file is an empty checkpoint, anything else unreadable is an error
    fn read(&self) -> Result<Option<Ini>, CheckpointError> {
        match Ini::load_from_file(&self.path) {
            Ok(ini) => Ok(Some(ini)),
            Err(ini::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CheckpointError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_err(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CheckpointStore for IniCheckpointStore {
    fn load(&self) -> Result<Option<Cursor>, CheckpointError> {
        let Some(ini) = self.read()? else {
            debug!("No checkpoint file at {}", self.path.display());
            return Ok(None);
        };
        Ok(ini
            .get_from(Some(CHECKPOINT_SECTION), CHECKPOINT_KEY)
            .and_then(Cursor::new))
    }

    // Written to a temp file next to the destination, synced, then renamed over
    // it, so an interrupted save leaves the previous checkpoint in place
    fn save(&self, cursor: &Cursor) -> Result<(), CheckpointError> {
        let mut ini = self.read()?.unwrap_or_default();
        ini.with_section(Some(CHECKPOINT_SECTION))
            .set(CHECKPOINT_KEY, cursor.as_str());

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.write_err(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_err(e))?;
        ini.write_to(&mut tmp).map_err(|e| self.write_err(e))?;
        tmp.flush().map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        info!("Saved checkpoint {} to {}", cursor, self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
