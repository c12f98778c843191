use anyhow::{Context, Error};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{config::Config, http::build_http_client};

pub struct AppContext {
    pub config: Config,
    pub http_client: Client,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = build_http_client(config.request_timeout())
            .context("Failed to construct HTTP client")?;

        Ok(Self {
            config: config.clone(),
            http_client,
            cancel: CancellationToken::new(),
        })
    }

    /// Cancel the run on Ctrl-C. The fetch loop notices between pages and the
    /// run aborts without committing a checkpoint.
    pub fn spawn_shutdown_listener(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, cancelling export");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for interrupts: {}", e),
            }
        });
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}
