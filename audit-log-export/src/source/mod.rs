use async_trait::async_trait;

use crate::{
    error::FetchError,
    model::{Cursor, LogRecord},
};

pub mod backoff;
pub mod fetcher;
pub mod management_api;

/// One page request against a cursor-paginated log stream.
///
/// Implementations return up to `take` records that come strictly after `from`,
/// in stream order. An empty page means there is nothing newer right now.
/// Rate limiting is reported as `FetchError::Throttled` so the caller can decide
/// whether to wait and retry the same page.
#[async_trait]
pub trait LogsApi: Send + Sync {
    async fn fetch_page(&self, from: &Cursor, take: usize) -> Result<Vec<LogRecord>, FetchError>;
}

#[async_trait]
impl<T: LogsApi + ?Sized> LogsApi for Box<T> {
    async fn fetch_page(&self, from: &Cursor, take: usize) -> Result<Vec<LogRecord>, FetchError> {
        (**self).fetch_page(from, take).await
    }
}
