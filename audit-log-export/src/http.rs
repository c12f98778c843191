use std::time;

use futures::StreamExt;
use reqwest::{header, Client, Response};

// Error bodies are only kept for diagnostics, so we don't need all of them
pub const MAX_ERROR_BODY: usize = 4 * 1024;

pub fn build_http_client(request_timeout: time::Duration) -> reqwest::Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(concat!("audit-log-export/", env!("CARGO_PKG_VERSION")))
        .timeout(request_timeout)
        .build()
}

/// Read at most `n` bytes of the response body, lossily decoded. Errors while
/// streaming the body just end the read.
pub async fn first_n_bytes_of_response(response: Response, n: usize) -> String {
    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::with_capacity(n.min(MAX_ERROR_BODY));

    while let Some(chunk) = body.next().await {
        if buffer.len() >= n {
            break;
        }
        let Ok(chunk) = chunk else {
            break;
        };
        let upper_bound = std::cmp::min(n - buffer.len(), chunk.len());
        buffer.extend_from_slice(&chunk[..upper_bound]);
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

/// Attempt to parse a Duration from a Retry-After header, returning None if not possible.
/// Retry-After header can specify a date in RFC2822 or a number of seconds; we try to parse both.
pub fn parse_retry_after_header(header_map: &header::HeaderMap) -> Option<time::Duration> {
    let retry_after = header_map.get(header::RETRY_AFTER)?.to_str().ok()?;

    if let Ok(u) = retry_after.parse::<u64>() {
        return Some(time::Duration::from_secs(u));
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(retry_after) {
        let duration =
            chrono::DateTime::<chrono::offset::Utc>::from(dt) - chrono::offset::Utc::now();

        // This can only fail when negative, in which case we return None.
        return duration.to_std().ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_header() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::RETRY_AFTER, "120".parse().unwrap());

        let duration = parse_retry_after_header(&headers).unwrap();
        assert_eq!(duration, time::Duration::from_secs(120));

        headers.remove(header::RETRY_AFTER);
        assert_eq!(parse_retry_after_header(&headers), None);

        // A date in the past can't be waited for
        headers.insert(
            header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after_header(&headers), None);

        headers.insert(header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after_header(&headers), None);
    }
}
