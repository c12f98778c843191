use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use envconfig::Envconfig;
use tracing::debug;

use crate::{
    auth::Credentials,
    export::ExportFormat,
    notify::NotifierKind,
    source::{backoff::BackoffPolicy, fetcher::FetchOptions},
};

// The logs endpoint refuses larger pages
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "DOMAIN")]
    pub domain: String,

    #[envconfig(from = "CLIENT_ID")]
    pub client_id: String,

    #[envconfig(from = "CLIENT_SECRET")]
    pub client_secret: String,

    // Defaults to https://{DOMAIN}
    #[envconfig(from = "API_BASE_URL")]
    pub api_base_url: Option<String>,

    #[envconfig(from = "CHECKPOINT_FILE", default = "last_log_id.ini")]
    pub checkpoint_file: PathBuf,

    #[envconfig(from = "OUTPUT_DIR", default = "output")]
    pub output_dir: PathBuf,

    #[envconfig(from = "EXPORT_FORMAT", default = "xlsx")]
    pub export_format: ExportFormat,

    // Used when there is no checkpoint yet, instead of prompting
    #[envconfig(from = "START_LOG_ID")]
    pub start_log_id: Option<String>,

    #[envconfig(from = "PAGE_SIZE", default = "100")]
    pub page_size: usize,

    // Unset means no cap
    #[envconfig(from = "MAX_PAGES")]
    pub max_pages: Option<usize>,

    #[envconfig(from = "REQUEST_TIMEOUT_SECONDS", default = "30")]
    pub request_timeout_seconds: u64,

    // 0 means a 429 fails the run straight away
    #[envconfig(from = "RATE_LIMIT_MAX_RETRIES", default = "0")]
    pub rate_limit_max_retries: u32,

    #[envconfig(from = "BACKOFF_INITIAL_SECONDS", default = "1")]
    pub backoff_initial_seconds: u64,

    #[envconfig(from = "BACKOFF_MAX_SECONDS", default = "60")]
    pub backoff_max_seconds: u64,

    #[envconfig(from = "BACKOFF_MULTIPLIER", default = "2.0")]
    pub backoff_multiplier: f64,

    #[envconfig(from = "NOTIFIER", default = "log")]
    pub notifier: NotifierKind,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("checkpoint_file", &self.checkpoint_file)
            .field("output_dir", &self.output_dir)
            .field("export_format", &self.export_format)
            .field("start_log_id", &self.start_log_id)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("rate_limit_max_retries", &self.rate_limit_max_retries)
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl Config {
    /// The tenant host, tolerating values pasted with a scheme or trailing slash.
    pub fn domain(&self) -> &str {
        let domain = self.domain.trim();
        let domain = domain
            .strip_prefix("https://")
            .or_else(|| domain.strip_prefix("http://"))
            .unwrap_or(domain);
        domain.trim_end_matches('/')
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.domain(), &self.client_id, &self.client_secret)
    }

    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => self.credentials().default_base_url(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(self.backoff_initial_seconds),
            self.backoff_multiplier,
            Duration::from_secs(self.backoff_max_seconds),
        )
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_pages: self.max_pages,
            rate_limit_retries: self.rate_limit_max_retries,
            backoff: self.backoff_policy(),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.domain().is_empty() {
            bail!("DOMAIN cannot be empty");
        }
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            bail!("CLIENT_ID and CLIENT_SECRET cannot be empty");
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            bail!(
                "PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            );
        }
        if self.max_pages == Some(0) {
            bail!("MAX_PAGES must be at least 1 when set");
        }
        if self.request_timeout_seconds == 0 {
            bail!("REQUEST_TIMEOUT_SECONDS must be at least 1");
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            bail!(
                "BACKOFF_MULTIPLIER must be at least 1.0, got {}",
                self.backoff_multiplier
            );
        }
        Ok(())
    }
}

/// Load a `.env` file into the process environment. Variables that are already
/// set win. An explicit path must exist; otherwise we look next to the
/// executable, then in the working directory, and carry on without one.
pub fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, anyhow::Error> {
    if let Some(path) = explicit {
        dotenv::from_path(path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
        return Ok(Some(path.to_path_buf()));
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        .filter(|path| path.is_file());
    if let Some(path) = beside_exe {
        dotenv::from_path(&path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
        return Ok(Some(path));
    }

    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) => {
            debug!("No .env file loaded: {}", e);
            Ok(None)
        }
    }
}
