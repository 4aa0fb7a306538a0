use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use prisbevakaren::config::LoggingConfig;
use prisbevakaren::utils::SystemClock;
use prisbevakaren::{AppConfig, JsonStore, Notifier, Orchestrator, PageFetcher};

/// Fetch current prices for every tracked URL and record the changes.
#[derive(Parser, Debug)]
#[command(name = "update-prices", version, about)]
struct Args {
    /// Directory holding default/{RUN_MODE}/local config files
    #[arg(long, default_value = "config")]
    config: String,

    /// Overrides store.data_dir
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("prisbevakaren={},update_prices={}", config.level, config.level)))
        .context("invalid log level")?;
    let stdout = tracing_subscriber::fmt::layer().with_target(false);

    match &config.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().context("log_file has no file name")?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stdout).init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config).context("failed to load configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.store.data_dir = data_dir;
    }

    let _log_guard = init_logging(&config.logging)?;
    info!("Starting price update job");

    let store = JsonStore::new(&config.store);
    let fetcher = Arc::new(PageFetcher::from_config(&config.scraper)?);
    let notifier = Notifier::from_config(&config.notifications)?;
    if notifier.is_configured() {
        info!("Failure notifications enabled");
    } else {
        info!("Failure notifications not configured");
    }

    let orchestrator = Orchestrator::new(store, fetcher, Arc::new(SystemClock), notifier, config.scraper.clone());
    match orchestrator.run_update().await {
        Ok(report) => {
            info!(
                "Price update job completed! Total URLs: {}, succeeded: {}, failed: {}, changed: {}",
                report.processed_count,
                report.succeeded_count,
                report.failed_count(),
                report.changed_count
            );
            Ok(())
        }
        Err(e) => {
            error!("Critical error in price update job: {}", e);
            Err(e.into())
        }
    }
}
