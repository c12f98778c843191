use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{backoff::BackoffPolicy, LogsApi};
use crate::{
    error::FetchError,
    model::{Cursor, LogBatch, LogRecord},
};

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Stop after this many pages even if the stream has more.
    pub max_pages: Option<usize>,
    /// How many times a rate limited page is retried. 0 fails on the first 429.
    pub rate_limit_retries: u32,
    pub backoff: BackoffPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            rate_limit_retries: 0,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Walks the log stream forward from a cursor until it runs dry.
///
/// Pages are requested strictly one after another: the cursor for page N+1 is
/// the last log_id of page N. A page shorter than the page size ends the walk,
/// as does an empty page, which is what we get when the previous page happened
/// to be both full and the last one.
pub struct LogFetcher<A> {
    api: A,
    options: FetchOptions,
    cancel: CancellationToken,
}

impl<A: LogsApi> LogFetcher<A> {
    pub fn new(api: A, options: FetchOptions, cancel: CancellationToken) -> Self {
        Self {
            api,
            options,
            cancel,
        }
    }

    pub async fn fetch_all(&self, cursor: &Cursor, page_size: usize) -> Result<LogBatch, FetchError> {
        let page_size = page_size.max(1);
        let mut from = cursor.clone();
        let mut batch = LogBatch::default();

        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled { pages: batch.pages });
            }

            let page = self.fetch_page(&from, page_size, batch.pages).await?;
            batch.pages += 1;

            if page.is_empty() {
                debug!(from = %from, "Empty page, stream exhausted");
                break;
            }

            // Every page must end on a record we can resume after, whether we
            // continue from it now or commit it as the checkpoint
            let page_len = page.len();
            let last = page
                .last()
                .and_then(LogRecord::cursor)
                .ok_or(FetchError::MissingLogId { page: batch.pages })?;
            let next = (page_len >= page_size).then_some(last);
            batch.records.extend(page);
            debug!(
                page = batch.pages,
                records = page_len,
                total = batch.len(),
                "Fetched logs page"
            );

            let Some(next) = next else {
                break;
            };
            from = next;

            if self.options.max_pages == Some(batch.pages) {
                warn!(
                    pages = batch.pages,
                    "Page cap reached, stopping early; the next run continues from {}", from
                );
                batch.truncated = true;
                break;
            }
        }

        info!(
            records = batch.len(),
            pages = batch.pages,
            "Finished fetching logs from {}", cursor
        );
        Ok(batch)
    }

    async fn fetch_page(
        &self,
        from: &Cursor,
        page_size: usize,
        pages_done: usize,
    ) -> Result<Vec<LogRecord>, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(FetchError::Cancelled { pages: pages_done });
                }
                result = self.api.fetch_page(from, page_size) => result,
            };

            match result {
                Err(FetchError::Throttled { retry_after, body }) => {
                    if attempt >= self.options.rate_limit_retries {
                        return Err(FetchError::RateLimited {
                            attempts: attempt + 1,
                            body,
                        });
                    }
                    let delay = self.options.backoff.delay_for(attempt, retry_after);
                    warn!(
                        attempt = attempt + 1,
                        "Rate limited, retrying page in {}s",
                        delay.as_secs_f64()
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(FetchError::Cancelled { pages: pages_done });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
