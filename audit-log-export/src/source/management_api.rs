use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, StatusCode};
use tracing::{debug, warn};

use super::LogsApi;
use crate::{
    auth::BearerToken,
    error::FetchError,
    http::{first_n_bytes_of_response, parse_retry_after_header, MAX_ERROR_BODY},
    model::{Cursor, LogRecord},
};

// The management API announces when the current rate limit window resets as a unix timestamp
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// The logs endpoint of the management API, authenticated with one bearer token.
pub struct ManagementApiClient {
    client: Client,
    base_url: String,
    token: BearerToken,
}

impl ManagementApiClient {
    pub fn new(client: Client, base_url: impl Into<String>, token: BearerToken) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn logs_url(&self) -> String {
        format!("{}/api/v2/logs", self.base_url)
    }
}

#[async_trait]
impl LogsApi for ManagementApiClient {
    async fn fetch_page(&self, from: &Cursor, take: usize) -> Result<Vec<LogRecord>, FetchError> {
        debug!(from = %from, take, "Requesting logs page");
        let response = self
            .client
            .get(self.logs_url())
            .query(&[("from", from.as_str().to_string()), ("take", take.to_string())])
            .bearer_auth(self.token.secret())
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_hint(response.headers());
            let body = first_n_bytes_of_response(response, MAX_ERROR_BODY).await;
            warn!(?retry_after, "Logs endpoint rate limited the request");
            return Err(FetchError::Throttled { retry_after, body });
        }
        if !status.is_success() {
            let body = first_n_bytes_of_response(response, MAX_ERROR_BODY).await;
            return Err(FetchError::Status { status, body });
        }

        let body = response.bytes().await.map_err(FetchError::Request)?;
        serde_json::from_slice(&body).map_err(FetchError::Malformed)
    }
}

fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    parse_retry_after_header(headers).or_else(|| {
        let reset = headers
            .get(RATE_LIMIT_RESET_HEADER)?
            .to_str()
            .ok()?
            .parse::<i64>()
            .ok()?;
        let wait = reset - chrono::Utc::now().timestamp();
        u64::try_from(wait).ok().map(Duration::from_secs)
    })
}
