use std::{io::IsTerminal, path::PathBuf, sync::Arc};

use clap::Parser;

use crate::{
    checkpoint::{
        resolver::{FixedCursor, NoCursor, PromptCursor},
        CursorResolver,
    },
    config::Config,
    export::ExportFormat,
    notify::NotifierKind,
};

/// Download the audit logs recorded since the last run and save them as a spreadsheet.
///
/// Settings come from the environment (or a .env file). Flags override them for
/// a single run.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Load environment variables from this file instead of looking for a .env
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// INI file holding the last exported log id
    #[arg(long)]
    pub checkpoint_file: Option<PathBuf>,

    /// Directory the export is written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Export format: xlsx or csv
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Log id to start after when there is no checkpoint yet
    #[arg(long)]
    pub from: Option<String>,

    /// Stop after this many pages; the next run picks up where this one stopped
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Fail instead of prompting when there is no checkpoint and no starting log id
    #[arg(long)]
    pub no_prompt: bool,

    /// Where run notifications go: log, desktop or none
    #[arg(long)]
    pub notifier: Option<NotifierKind>,
}

impl Cli {
    /// Flags win over whatever the environment configured.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.checkpoint_file {
            config.checkpoint_file = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.export_format = format;
        }
        if let Some(from) = &self.from {
            config.start_log_id = Some(from.clone());
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = Some(max_pages);
        }
        if let Some(notifier) = self.notifier {
            config.notifier = notifier;
        }
    }

    /// How a first run finds its starting point: a configured log id, else the
    /// operator when there is a terminal to ask on, else nothing.
    pub fn resolver(&self, config: &Config) -> Arc<dyn CursorResolver> {
        let configured = config
            .start_log_id
            .as_deref()
            .filter(|id| !id.trim().is_empty());
        match configured {
            Some(id) => Arc::new(FixedCursor::new(id.trim())),
            None if self.no_prompt || !std::io::stdin().is_terminal() => Arc::new(NoCursor),
            None => Arc::new(PromptCursor),
        }
    }
}
