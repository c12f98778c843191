use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::AuthError,
    http::{first_n_bytes_of_response, MAX_ERROR_BODY},
};

/// Service credentials for the management API. Built once from config and
/// handed to the token provider; nothing reads them from the environment later.
#[derive(Clone)]
pub struct Credentials {
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// The API identifier tokens are requested for. Always derived from the
    /// tenant domain, even when requests go to an overridden base url.
    pub fn audience(&self) -> String {
        format!("https://{}/api/v2/", self.domain)
    }

    pub fn default_base_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

pub struct TokenProvider {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl TokenProvider {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// One client-credentials exchange. Not retried.
    pub async fn acquire_token(&self) -> Result<BearerToken, AuthError> {
        let url = format!("{}/oauth/token", self.base_url);
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            audience: self.credentials.audience(),
        };

        debug!("Requesting access token from {}", url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(AuthError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = first_n_bytes_of_response(response, MAX_ERROR_BODY).await;
            return Err(AuthError::Status { status, body });
        }

        let body = response.bytes().await.map_err(AuthError::Request)?;
        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(AuthError::Malformed)?;

        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        info!(
            token_type = parsed.token_type.as_deref().unwrap_or("unknown"),
            expires_in = parsed.expires_in,
            "Acquired management API token"
        );
        Ok(BearerToken::new(token))
    }
}
