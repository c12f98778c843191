use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Enumeration of errors from the client-credentials token exchange.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("token response is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("token response has no access_token field")]
    MissingToken,
}

/// Enumeration of errors that can occur while paging through the logs endpoint.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("logs request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("logs endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("logs endpoint rate limited the request: {body}")]
    Throttled {
        retry_after: Option<std::time::Duration>,
        body: String,
    },
    #[error("logs endpoint still rate limited after {attempts} attempts: {body}")]
    RateLimited { attempts: u32, body: String },
    #[error("logs response is not a JSON array of objects: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("last record of page {page} has no log_id to resume from")]
    MissingLogId { page: usize },
    #[error("fetch cancelled after {pages} pages")]
    Cancelled { pages: usize },
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("failed to read checkpoint file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },
    #[error("failed to write checkpoint file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prompt for a starting log id: {0}")]
    Prompt(#[source] inquire::InquireError),
    #[error("no checkpoint found and no starting log id available")]
    Unresolved,
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{rows} records do not fit in a single worksheet (limit {limit})")]
    TooManyRows { rows: usize, limit: usize },
    #[error("spreadsheet serialization failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Everything that aborts a run. Nothing past the failing step is executed.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("blocking task did not complete: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl RunError {
    /// A short message fit for the operator-facing notification. The full error
    /// chain goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            RunError::Auth(AuthError::Status { status, .. })
            | RunError::Fetch(FetchError::Status { status, .. }) => {
                status_message(*status).to_string()
            }
            RunError::Auth(AuthError::Request(e)) | RunError::Fetch(FetchError::Request(e)) => {
                request_message(e).to_string()
            }
            RunError::Auth(_) => "Unexpected response from the token endpoint".to_string(),
            RunError::Fetch(FetchError::RateLimited { .. } | FetchError::Throttled { .. }) => {
                status_message(StatusCode::TOO_MANY_REQUESTS).to_string()
            }
            RunError::Fetch(FetchError::Cancelled { .. }) => {
                "Export cancelled, checkpoint left unchanged".to_string()
            }
            RunError::Fetch(_) => "Unexpected response from the logs endpoint".to_string(),
            RunError::Checkpoint(CheckpointError::Unresolved) => {
                "No checkpoint found, provide a starting log id".to_string()
            }
            RunError::Checkpoint(e) => format!("Checkpoint error: {e}"),
            RunError::Write(e) => format!("Failed to save the export: {e}"),
            RunError::Blocking(_) => "Unexpected internal error -- try again".to_string(),
        }
    }
}

// Friendly message from the status code returned by the management API
pub fn status_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Request rejected -- check that the starting log id is valid",
        401 => "Authentication failed, check your credentials",
        403 => "Access denied -- check that the client is granted read:logs",
        404 => "Endpoint not found -- check the configured domain",
        429 => "Rate limit exceeded -- try again later",
        500..=599 => "Remote server error",
        _ => "Unknown error -- try again later",
    }
}

fn request_message(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "Request timed out -- try again later"
    } else if error.is_connect() {
        "Could not connect -- check the configured domain and your network"
    } else {
        "Unknown error -- try again later"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        assert_eq!(
            status_message(StatusCode::UNAUTHORIZED),
            "Authentication failed, check your credentials"
        );
        assert_eq!(
            status_message(StatusCode::BAD_GATEWAY),
            "Remote server error"
        );
        assert!(status_message(StatusCode::TOO_MANY_REQUESTS).contains("Rate limit"));
    }

    #[test]
    fn test_user_message_for_status_errors() {
        let err = RunError::from(FetchError::Status {
            status: StatusCode::FORBIDDEN,
            body: "{}".to_string(),
        });
        assert!(err.user_message().starts_with("Access denied"));

        let err = RunError::from(AuthError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "".to_string(),
        });
        assert_eq!(
            err.user_message(),
            "Authentication failed, check your credentials"
        );
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = RunError::from(FetchError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "upstream exploded".to_string(),
        });
        let full = err.to_string();
        assert!(full.contains("500"));
        assert!(full.contains("upstream exploded"));
    }
}
