//! Marksync main entry point
//!
//! This is the command-line interface for the Marksync bookmark archive.

use anyhow::Context;
use clap::Parser;
use marksync::body_store::{BodyStore, FileBodyStore};
use marksync::config::{load_config_with_hash, Config};
use marksync::crawler::{shared, CrawlCoordinator, CrawlDispatcher, CrawlWorker};
use marksync::messaging::{MessageBus, SqliteBus};
use marksync::storage::{self, SqliteStorage};
use marksync::sync::{merge_bookmarks, Announce, SyncPayload};
use marksync::url::CanonicalUrl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Marksync: bookmark sync and page archive
///
/// Merges bookmark edits from several devices into one state and keeps an
/// archived copy of the page behind every bookmarked URL.
#[derive(Parser, Debug)]
#[command(name = "marksync")]
#[command(version)]
#[command(about = "Bookmark sync and page archive", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Publish one crawl request per bookmarked URL that was never crawled
    #[arg(long, group = "mode")]
    dispatch: bool,

    /// Consume crawl requests until interrupted
    #[arg(long, group = "mode")]
    work: bool,

    /// Crawl one URL now unless it has been crawled before
    #[arg(long, value_name = "URL", group = "mode")]
    crawl: Option<String>,

    /// Merge a JSON sync payload into the store and print the response payload
    #[arg(long, value_name = "FILE", group = "mode")]
    sync: Option<PathBuf>,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dispatch {
        handle_dispatch(&config)?;
    } else if cli.work {
        handle_work(&config).await?;
    } else if let Some(url) = &cli.crawl {
        handle_crawl(&config, url).await?;
    } else if let Some(path) = &cli.sync {
        handle_sync(&config, path)?;
    } else {
        handle_stats(&config)?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("marksync=info,warn"),
            1 => EnvFilter::new("marksync=debug,info"),
            2 => EnvFilter::new("marksync=trace,debug"),
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

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    storage::open_storage(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn open_bus(config: &Config) -> anyhow::Result<Arc<dyn MessageBus>> {
    let path = Path::new(&config.bus.database_path);
    let bus = SqliteBus::new(path, config.bus.lease())
        .with_context(|| format!("Failed to open bus {}", path.display()))?;
    Ok(Arc::new(bus))
}

fn build_coordinator(config: &Config) -> anyhow::Result<CrawlCoordinator<SqliteStorage>> {
    let storage = shared(open_storage(config)?);
    let body_store: Arc<dyn BodyStore> = Arc::new(FileBodyStore::new(&config.body_store.root));
    Ok(CrawlCoordinator::from_config(config, storage, body_store)?)
}

/// Handles the --dispatch mode: one dispatcher pass
fn handle_dispatch(config: &Config) -> anyhow::Result<()> {
    let dispatcher = CrawlDispatcher::new(
        shared(open_storage(config)?),
        open_bus(config)?,
        config.bus.topic.clone(),
    );
    let published = dispatcher.request_crawls_for_uncrawled_urls()?;
    println!("Requested {} crawls", published);
    Ok(())
}

/// Handles the --work mode: consume crawl requests until Ctrl-C
async fn handle_work(config: &Config) -> anyhow::Result<()> {
    let worker = CrawlWorker::new(
        build_coordinator(config)?,
        open_bus(config)?,
        config.crawler.max_concurrent_fetches as usize,
    );
    worker
        .run(&config.bus.topic, config.crawler.poll_interval())
        .await?;
    Ok(())
}

/// Handles the --crawl mode: crawl a single URL if it needs it
async fn handle_crawl(config: &Config, raw_url: &str) -> anyhow::Result<()> {
    let url = CanonicalUrl::parse_coerced(raw_url)
        .with_context(|| format!("Not a crawlable URL: {}", raw_url))?;
    let coordinator = build_coordinator(config)?;
    coordinator.ensure_url_is_crawled(&url).await?;
    Ok(())
}

/// Handles the --sync mode: merge a payload file and print what the client
/// should be told
fn handle_sync(config: &Config, path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let payload: SyncPayload = serde_json::from_str(&content)
        .with_context(|| format!("Invalid sync payload in {}", path.display()))?;

    let mut storage = open_storage(config)?;
    let bus = open_bus(config)?;
    let announce = Announce {
        bus: bus.as_ref(),
        topic: &config.bus.topic,
    };
    let result = merge_bookmarks(&mut storage, &payload.bookmarks, Some(&announce))?;

    println!("{}", serde_json::to_string_pretty(&result.response())?);
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use marksync::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(config)?;
    let mut stats = load_statistics(&storage)?;
    stats.pending_messages = Some(open_bus(config)?.pending(&config.bus.topic)?);

    print_statistics(&stats);

    Ok(())
}
