use inquire::{validator::Validation, CustomUserError, Text};

use crate::{error::CheckpointError, model::Cursor};

/// Supplies the starting cursor for a run that has no checkpoint yet.
pub trait CursorResolver: Send + Sync {
    fn resolve(&self) -> Result<Cursor, CheckpointError>;
}

/// A cursor known up front, from a flag or the environment.
#[derive(Debug, Clone)]
pub struct FixedCursor(Option<Cursor>);

impl FixedCursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Cursor::new(value))
    }
}

impl CursorResolver for FixedCursor {
    fn resolve(&self) -> Result<Cursor, CheckpointError> {
        self.0.clone().ok_or(CheckpointError::Unresolved)
    }
}

/// Headless runs: a missing checkpoint is an error rather than a question.
#[derive(Debug, Clone, Copy)]
pub struct NoCursor;

impl CursorResolver for NoCursor {
    fn resolve(&self) -> Result<Cursor, CheckpointError> {
        Err(CheckpointError::Unresolved)
    }
}

/// Asks the operator on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptCursor;

fn log_id_validator(input: &str) -> Result<Validation, CustomUserError> {
    if input.trim().is_empty() {
        return Ok(Validation::Invalid("Log id cannot be empty".into()));
    }
    if input.trim() != input {
        return Ok(Validation::Invalid(
            "Log id cannot start or end with whitespace".into(),
        ));
    }
    if Cursor::new(input).is_none() {
        return Ok(Validation::Invalid(
            "Log id cannot start with a quote or contain control characters".into(),
        ));
    }
    Ok(Validation::Valid)
}

impl CursorResolver for PromptCursor {
    fn resolve(&self) -> Result<Cursor, CheckpointError> {
        let answer = Text::new("Enter the last log id that was already exported:")
            .with_help_message("Export resumes with the first record after this id")
            .with_validator(log_id_validator)
            .prompt()
            .map_err(CheckpointError::Prompt)?;
        Cursor::new(answer).ok_or(CheckpointError::Unresolved)
    }
}
