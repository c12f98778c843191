use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    auth::{Credentials, TokenProvider},
    checkpoint::{resolve_initial_cursor, resolver::NoCursor, CheckpointStore, CursorResolver},
    config::MAX_PAGE_SIZE,
    context::AppContext,
    error::{CheckpointError, RunError, WriteError},
    export::{ExportFormat, ExportWriter, StagedExport},
    model::Cursor,
    notify::{LogNotifier, Notification, Notifier},
    source::{
        fetcher::{FetchOptions, LogFetcher},
        management_api::ManagementApiClient,
    },
};

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start: Cursor,
    pub records: usize,
    pub pages: usize,
    /// The checkpoint written by this run. None when there was nothing new.
    pub checkpoint: Option<Cursor>,
    pub output: PathBuf,
    pub truncated: bool,
}

/// One incremental export: authenticate, resume from the checkpoint, drain the
/// log stream, commit the new checkpoint and write the spreadsheet.
pub struct Exporter {
    client: Client,
    base_url: String,
    credentials: Credentials,
    checkpoint: Arc<dyn CheckpointStore>,
    resolver: Arc<dyn CursorResolver>,
    notifier: Arc<dyn Notifier>,
    writer: ExportWriter,
    output_dir: PathBuf,
    page_size: usize,
    fetch_options: FetchOptions,
    cancel: CancellationToken,
}

pub struct ExporterBuilder {
    client: Client,
    base_url: String,
    credentials: Credentials,
    checkpoint: Arc<dyn CheckpointStore>,

    // Optional with defaults
    resolver: Arc<dyn CursorResolver>,
    notifier: Arc<dyn Notifier>,
    format: ExportFormat,
    output_dir: PathBuf,
    page_size: usize,
    fetch_options: FetchOptions,
    cancel: CancellationToken,
}

impl ExporterBuilder {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credentials,
            checkpoint,
            resolver: Arc::new(NoCursor),
            notifier: Arc::new(LogNotifier),
            format: ExportFormat::default(),
            output_dir: PathBuf::from("output"),
            page_size: MAX_PAGE_SIZE,
            fetch_options: FetchOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CursorResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.fetch_options = fetch_options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Exporter {
        Exporter {
            client: self.client,
            base_url: self.base_url,
            credentials: self.credentials,
            checkpoint: self.checkpoint,
            resolver: self.resolver,
            notifier: self.notifier,
            writer: ExportWriter::new(self.format),
            output_dir: self.output_dir,
            page_size: self.page_size,
            fetch_options: self.fetch_options,
            cancel: self.cancel,
        }
    }
}

impl Exporter {
    pub fn builder(
        client: Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> ExporterBuilder {
        ExporterBuilder::new(client, base_url, credentials, checkpoint)
    }

    /// Wire an exporter from the process configuration. Only the checkpoint
    /// store and starting-cursor resolver vary between callers.
    pub fn from_context(
        context: &AppContext,
        checkpoint: Arc<dyn CheckpointStore>,
        resolver: Arc<dyn CursorResolver>,
    ) -> Self {
        let config = &context.config;
        Self::builder(
            context.http_client.clone(),
            config.api_base_url(),
            config.credentials(),
            checkpoint,
        )
        .with_resolver(resolver)
        .with_notifier(config.notifier.build())
        .with_format(config.export_format)
        .with_output_dir(config.output_dir.clone())
        .with_page_size(config.page_size)
        .with_fetch_options(config.fetch_options())
        .with_cancellation(context.cancel.clone())
        .build()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn run(&self) -> Result<RunSummary, RunError> {
        self.notifier.notify(&Notification::Started);

        match self.run_steps().await {
            Ok(summary) => {
                self.notifier.notify(&Notification::saved(&summary.output));
                Ok(summary)
            }
            Err(e) => {
                error!("Export failed: {}", e);
                self.notifier.notify(&Notification::Failed {
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    // Each step only runs if everything before it succeeded. The export is
    // serialized and synced to a temporary file before the checkpoint is
    // committed, leaving only a rename afterwards, so a failure up to the commit
    // leaves the next run starting from the same place.
    async fn run_steps(&self) -> Result<RunSummary, RunError> {
        let token = TokenProvider::new(
            self.client.clone(),
            &self.base_url,
            self.credentials.clone(),
        )
        .acquire_token()
        .await?;

        let start = blocking({
            let store = self.checkpoint.clone();
            let resolver = self.resolver.clone();
            move || -> Result<Cursor, CheckpointError> {
                let loaded = store.load()?;
                resolve_initial_cursor(loaded, resolver.as_ref())
            }
        })
        .await?;
        info!(
            checkpoint = %self.checkpoint.describe(),
            "Fetching logs after {}", start
        );

        let api = ManagementApiClient::new(self.client.clone(), &self.base_url, token);
        let fetcher = LogFetcher::new(api, self.fetch_options, self.cancel.clone());
        let batch = Arc::new(fetcher.fetch_all(&start, self.page_size).await?);

        let staged = blocking({
            let batch = batch.clone();
            let writer = self.writer;
            let output_dir = self.output_dir.clone();
            move || -> Result<StagedExport, WriteError> {
                writer.prepare(&batch)?.stage(&output_dir)
            }
        })
        .await?;

        let checkpoint = batch.next_cursor();
        match &checkpoint {
            Some(cursor) => {
                let store = self.checkpoint.clone();
                let next = cursor.clone();
                blocking(move || store.save(&next)).await?;
                info!("Checkpoint advanced to {}", cursor);
            }
            None => info!("No new logs, checkpoint stays at {}", start),
        }
        if batch.truncated {
            warn!(
                pages = batch.pages,
                "Export stopped at the page cap, run again to continue"
            );
        }

        let output = blocking(move || staged.commit()).await?;

        Ok(RunSummary {
            start,
            records: batch.len(),
            pages: batch.pages,
            checkpoint,
            output,
            truncated: batch.truncated,
        })
    }
}

// Checkpoint files, the prompt and spreadsheet encoding all block, so they run
// off the async workers
async fn blocking<T, E>(task: impl FnOnce() -> Result<T, E> + Send + 'static) -> Result<T, RunError>
where
    T: Send + 'static,
    E: Into<RunError> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await?.map_err(Into::into)
}
