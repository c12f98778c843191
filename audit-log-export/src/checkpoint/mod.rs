use std::sync::Mutex;

use tracing::info;

use crate::{error::CheckpointError, model::Cursor};

pub mod ini_file;
pub mod resolver;

pub use ini_file::IniCheckpointStore;
pub use resolver::CursorResolver;

/// Durable home of the cursor carried between runs.
pub trait CheckpointStore: Send + Sync {
    /// The persisted cursor, or None if no run has committed one yet.
    fn load(&self) -> Result<Option<Cursor>, CheckpointError>;

    /// Replace the persisted cursor. Either the new value is stored or the old
    /// one is left as it was.
    fn save(&self, cursor: &Cursor) -> Result<(), CheckpointError>;

    /// Where the checkpoint lives, for log messages.
    fn describe(&self) -> String;
}

/// Use the loaded checkpoint, or ask the resolver for a starting point when
/// there is none.
pub fn resolve_initial_cursor(
    loaded: Option<Cursor>,
    resolver: &dyn CursorResolver,
) -> Result<Cursor, CheckpointError> {
    match loaded {
        Some(cursor) => Ok(cursor),
        None => {
            info!("No checkpoint found, resolving starting log id");
            resolver.resolve()
        }
    }
}

/// Keeps the cursor in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    cursor: Mutex<Option<Cursor>>,
}

impl MemoryCheckpointStore {
    pub fn new(initial: Option<Cursor>) -> Self {
        Self {
            cursor: Mutex::new(initial),
        }
    }

    pub fn current(&self) -> Option<Cursor> {
        self.cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<Cursor>, CheckpointError> {
        Ok(self.current())
    }

    fn save(&self, cursor: &Cursor) -> Result<(), CheckpointError> {
        *self
            .cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(cursor.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
