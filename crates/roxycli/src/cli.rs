//! Exposes the command line application.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing::level_filters::LevelFilter;
use url::Url;

use roxy_service::config::Config;
use roxy_service::{Loader, logging, metrics};

use crate::load::load_all;
use crate::output;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Outputs one row per URL.
    Table,
    /// Outputs all results as a JSON array.
    Json,
}

/// Loads payloads from a list of URLs.
///
/// All URLs are requested at once. Duplicate URLs are fetched only once, and no more than
/// the configured number of fetches run concurrently.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// The URLs to load.
    #[arg(required = true)]
    urls: Vec<Url>,

    /// Path to your configuration file.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// The maximum number of concurrent fetches.
    ///
    /// Overrides `max_concurrent_fetches` from the configuration file.
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,

    /// A directory to write the loaded payloads to.
    #[arg(long, short, value_name = "DIR")]
    output: Option<PathBuf>,

    /// The output format.
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// The severity level of logging output.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::get(cli.config()).context("failed loading config")?;

    if let Some(concurrency) = cli.concurrency {
        config.max_concurrent_fetches = concurrency;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // SAFETY: The runtime has not been started yet, so this is still single-threaded.
    unsafe { logging::init_logging(&config) };
    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )
        .context("failed to configure metrics")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;

    let reports = runtime.block_on(async {
        let loader = Loader::from_config(&config);
        tracing::debug!(?loader, "Loading {} URLs", cli.urls.len());
        load_all(&loader, &cli.urls, cli.output.as_deref()).await
    })?;

    match cli.format {
        OutputFormat::Table => output::print_table(&reports),
        OutputFormat::Json => output::print_json(&reports)?,
    }

    let failed = reports.iter().filter(|report| report.is_failure()).count();
    if failed > 0 {
        bail!("{failed} of {} loads failed", reports.len());
    }
    Ok(())
}
