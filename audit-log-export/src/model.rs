use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column order of the export. Records are projected onto this schema, so fields
/// outside of it are dropped and missing ones become empty cells.
pub const LOG_COLUMNS: [&str; 24] = [
    "date",
    "type",
    "description",
    "connection_id",
    "client_id",
    "client_name",
    "ip",
    "user_agent",
    "details",
    "hostname",
    "user_id",
    "user_name",
    "auth0_client",
    "log_id",
    "_id",
    "isMobile",
    "audience",
    "scope",
    "connection",
    "strategy",
    "strategy_type",
    "session_connection",
    "organization_id",
    "organization_name",
];

// Position of the YYYYMMDD fragment inside a log_id
const DATE_FRAGMENT_START: usize = 3;
const DATE_FRAGMENT_LEN: usize = 8;

/// Position in the log stream after which the next page starts.
///
/// A cursor has to come back unchanged from the checkpoint file, whose parser
/// trims values, strips a leading quote and does not read back every escaped
/// control character. Blank values, surrounding whitespace, a leading `"` or
/// `'` and control characters are therefore rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let storable = !value.is_empty()
            && value.trim() == value
            && !value.starts_with(['"', '\''])
            && !value.chars().any(char::is_control);
        storable.then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cursor {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cursor::new(value).ok_or("cursor is blank or cannot be stored in the checkpoint file")
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

/// A single audit log entry, kept as the raw JSON object the API returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

impl LogRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn log_id(&self) -> Option<&str> {
        self.0.get("log_id").and_then(Value::as_str)
    }

    /// The cursor that resumes the stream right after this record.
    pub fn cursor(&self) -> Option<Cursor> {
        self.log_id().and_then(Cursor::new)
    }

    /// The YYYYMMDD fragment embedded in the log_id. Short ids yield whatever
    /// characters fall inside the window, possibly nothing.
    pub fn date_fragment(&self) -> Option<String> {
        self.log_id().map(|id| {
            id.chars()
                .skip(DATE_FRAGMENT_START)
                .take(DATE_FRAGMENT_LEN)
                .collect()
        })
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for LogRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Every record retrieved in one run, in the order the API returned them.
#[derive(Debug, Clone, Default)]
pub struct LogBatch {
    pub records: Vec<LogRecord>,
    pub pages: usize,
    /// Set when the page cap stopped the fetch before the stream was exhausted.
    pub truncated: bool,
}

impl LogBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&LogRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&LogRecord> {
        self.records.last()
    }

    /// The checkpoint this batch commits: the id of its last record.
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.last().and_then(LogRecord::cursor)
    }
}
