use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Error};
use audit_log_export::{
    checkpoint::IniCheckpointStore,
    cli::Cli,
    config::{load_env_file, Config},
    context::AppContext,
    run::{Exporter, RunSummary},
};
use clap::Parser;
use envconfig::Envconfig;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(log_layer).init();
}

fn load_config(cli: &Cli) -> Result<Config, Error> {
    match load_env_file(cli.env_file.as_deref())? {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => info!("No .env file found, using the process environment"),
    }

    let mut config = Config::init_from_env().context("Invalid configuration")?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn export(cli: &Cli) -> Result<RunSummary, Error> {
    let config = load_config(cli)?;
    info!(?config, "Starting audit log export");

    let context = AppContext::new(&config)?;
    context.spawn_shutdown_listener();

    let store = Arc::new(IniCheckpointStore::new(&config.checkpoint_file));
    let exporter = Exporter::from_context(&context, store, cli.resolver(&config));
    let summary = exporter.run().await?;

    if !context.is_running() {
        warn!("Interrupted after the export completed");
    }
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    match export(&cli).await {
        Ok(summary) => {
            info!(
                records = summary.records,
                pages = summary.pages,
                truncated = summary.truncated,
                checkpoint = summary.checkpoint.as_ref().map(|c| c.as_str()),
                "Export saved to {}",
                summary.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
