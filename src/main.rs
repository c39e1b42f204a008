//! Recipe Harvester main entry point
//!
//! This is the command-line interface for the Recipe Harvester crawler and
//! upload pipeline.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use recipe_harvester::config::{load_config_with_hash, Config, SiteProfile};
use recipe_harvester::output::{
    export_recipes, load_statistics, print_statistics, ExportFormat, DEFAULT_RECENT_LIMIT,
};
use recipe_harvester::state::Snapshot;
use recipe_harvester::storage::SqliteStorage;
use recipe_harvester::{ConfigError, HarvestError, Harvester, ProgressKind, RunStatus};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often a running crawl or upload reports progress
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Recipe Harvester: a polite recipe discovery crawler
///
/// Crawls one site at a time, keeps the URLs of pages that are genuine
/// recipes, and pushes them to a recipe manager's import API.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A polite recipe discovery crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and store the recipes found
    Crawl {
        /// Site profile name (defaults to `active-site`, then the first site)
        #[arg(long)]
        site: Option<String>,
    },

    /// Upload pending recipes to the import API
    Upload,

    /// Guess a recipe pattern and selectors for a new site
    Prescan {
        /// Start page of the site
        url: String,
    },

    /// Check the import API base and key
    CheckUpload,

    /// Show statistics from the database and exit
    Stats,

    /// Export stored recipe URLs
    Export {
        #[arg(long, value_enum, default_value_t = FormatArg::Txt)]
        format: FormatArg,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Txt,
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Txt => ExportFormat::Txt,
            FormatArg::Csv => ExportFormat::Csv,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Crawl { site } => handle_crawl(&config, site.as_deref()).await,
        Command::Upload => handle_upload(&config).await,
        Command::Prescan { url } => handle_prescan(&url).await,
        Command::CheckUpload => handle_check_upload(&config).await,
        Command::Stats => handle_stats(&config),
        Command::Export { format, output } => handle_export(&config, format.into(), output.as_deref()),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvester=info,warn"),
            1 => EnvFilter::new("recipe_harvester=debug,info"),
            2 => EnvFilter::new("recipe_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves the profile to crawl: the named one, or the active one
fn select_site(config: &Config, name: Option<&str>) -> Result<Option<SiteProfile>, HarvestError> {
    match name {
        Some(name) => config
            .site_by_name(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownSite(name.to_string()).into()),
        None => Ok(config.active_profile().cloned()),
    }
}

/// Handles the crawl command
async fn handle_crawl(config: &Config, site_name: Option<&str>) -> anyhow::Result<()> {
    let site = select_site(config, site_name)?;
    match &site {
        Some(site) => tracing::info!(
            "Crawling site '{}' from {} (concurrency {}, delay {:.1}s)",
            site.name,
            site.start_url,
            site.max_concurrency,
            site.request_delay_seconds
        ),
        None => tracing::warn!("No site profile configured"),
    }

    let harvester = Harvester::from_config(config)?;
    harvester.start_crawl(site)?;

    match supervise(&harvester, ProgressKind::Crawl).await {
        Snapshot::Crawl(snapshot) => {
            println!(
                "Crawl {}: {} pages fetched, {} recipes found",
                snapshot.status, snapshot.pages, snapshot.recipes_found
            );
            finish(snapshot.status, snapshot.message)
        }
        Snapshot::Upload(_) => Ok(()),
    }
}

/// Handles the upload command
async fn handle_upload(config: &Config) -> anyhow::Result<()> {
    let harvester = Harvester::from_config(config)?;
    harvester.start_upload()?;

    match supervise(&harvester, ProgressKind::Upload).await {
        Snapshot::Upload(snapshot) => {
            println!(
                "Upload {}: {} uploaded, {} failed, {} of {} attempted",
                snapshot.status, snapshot.uploaded, snapshot.failed, snapshot.done, snapshot.total
            );
            finish(snapshot.status, snapshot.message)
        }
        Snapshot::Crawl(_) => Ok(()),
    }
}

/// Waits for a run, reporting progress and turning Ctrl-C into a stop
async fn supervise(harvester: &Harvester, kind: ProgressKind) -> Snapshot {
    let progress = harvester.progress();
    let finished = async {
        match kind {
            ProgressKind::Crawl => Snapshot::Crawl(harvester.wait_crawl().await),
            ProgressKind::Upload => Snapshot::Upload(harvester.wait_upload().await),
        }
    };
    tokio::pin!(finished);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            snapshot = &mut finished => return snapshot,
            signal = &mut ctrl_c, if !stopping => {
                if let Err(e) = signal {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Interrupt received, finishing in-flight work...");
                stopping = true;
                match kind {
                    ProgressKind::Crawl => harvester.stop_crawl(),
                    ProgressKind::Upload => harvester.stop_upload(),
                }
            }
            _ = ticker.tick() => match progress.read(kind) {
                Snapshot::Crawl(s) => tracing::info!(
                    "Progress: {} pages, {} recipes, last {}",
                    s.pages,
                    s.recipes_found,
                    s.last_url.as_deref().unwrap_or("-")
                ),
                Snapshot::Upload(s) => tracing::info!(
                    "Progress: {}/{} attempted, {} uploaded",
                    s.done,
                    s.total,
                    s.uploaded
                ),
            },
        }
    }
}

fn finish(status: RunStatus, message: Option<String>) -> anyhow::Result<()> {
    if status == RunStatus::Error {
        bail!(message.unwrap_or_else(|| "run failed".to_string()));
    }
    Ok(())
}

/// Handles the prescan command
async fn handle_prescan(url: &str) -> anyhow::Result<()> {
    let report = recipe_harvester::crawler::prescan(url).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Handles the check-upload command
async fn handle_check_upload(config: &Config) -> anyhow::Result<()> {
    let message = recipe_harvester::upload::probe_api(&config.upload).await?;
    println!("✓ {}", message);
    Ok(())
}

/// Handles the stats command
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&storage, DEFAULT_RECENT_LIMIT)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the export command
fn handle_export(config: &Config, format: ExportFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
    let written = export_recipes(&storage, format, output)?;

    if let Some(path) = output {
        println!("✓ Exported {} recipes to {}", written, path.display());
    }

    Ok(())
}
