//! Feedline main entry point
//!
//! This is the command-line interface for the Feedline feed collector.

use anyhow::Context;
use clap::Parser;
use feedline::config::{Config, ConfigStore};
use feedline::output::{load_statistics, print_results, print_statistics};
use feedline::storage::{open_storage, SqliteStorage};
use feedline::Collector;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Feedline: an incremental news feed collector
///
/// Feedline harvests entries from RSS, Atom and JSON feeds, extracts article
/// text, skips anything it has already seen and stores the rest in SQLite.
#[derive(Parser, Debug)]
#[command(name = "feedline")]
#[command(version)]
#[command(about = "An incremental news feed collector", long_about = None)]
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

    /// Validate config and show what would be collected without collecting
    #[arg(long, conflicts_with_all = ["stats", "watch"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "watch", "feed"])]
    stats: bool,

    /// Keep collecting every default-interval-minutes until interrupted
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    watch: bool,

    /// Collect only the feed with this name
    #[arg(long, value_name = "NAME")]
    feed: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let store = match ConfigStore::load(&cli.config) {
        Ok(store) => {
            tracing::info!(
                "Configuration loaded successfully (hash: {})",
                store.hash().unwrap_or("-")
            );
            store
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&store.current(), cli.feed.as_deref())
    } else if cli.stats {
        handle_stats(&store.current())
    } else if cli.watch {
        handle_watch(store, cli.feed).await
    } else {
        handle_collect(store, cli.feed).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("feedline=info,warn"),
            1 => EnvFilter::new("feedline=debug,info"),
            2 => EnvFilter::new("feedline=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be collected
fn handle_dry_run(config: &Config, only: Option<&str>) -> anyhow::Result<()> {
    println!("=== Feedline Dry Run ===\n");

    println!("Settings:");
    println!("  Request timeout: {}s", config.settings.request_timeout_seconds);
    println!("  User agent: {}", config.settings.user_agent);
    println!("  Default lookback: {}h", config.settings.default_lookback_hours);
    println!(
        "  Batch interval: {}min",
        config.settings.default_interval_minutes
    );
    println!("  Default max items: {}", config.settings.default_max_items);

    println!("\nCollector:");
    println!("  Database: {}", config.collector.database_path);
    println!(
        "  Requests per second (per domain): {}",
        config.collector.requests_per_second
    );
    println!("  Max retries: {}", config.collector.max_retries);
    println!("  Feed timeout: {}s", config.collector.feed_timeout_seconds);
    println!("  Overlap: {}s", config.collector.overlap_seconds);
    println!("  Dedup window: {} days", config.collector.dedup_window_days);
    println!(
        "  Max concurrent feeds: {}",
        config.collector.max_concurrent_feeds
    );

    if let Some(name) = only {
        if config.find_feed(name).is_none() {
            anyhow::bail!("no feed named '{}' in configuration", name);
        }
    }

    let selected: Vec<_> = config
        .enabled_feeds()
        .filter(|f| only.map_or(true, |name| f.name == name))
        .collect();

    println!("\nFeeds ({} configured):", config.feeds.len());
    for feed in &config.feeds {
        println!(
            "  - {} <{}> credibility {:.2}, max {} items{}",
            feed.name,
            feed.url,
            feed.credibility,
            feed.effective_max_items(&config.settings),
            if feed.enabled { "" } else { " (disabled)" }
        );
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would collect {} feeds", selected.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.collector.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.collector.database_path))
        .with_context(|| format!("opening {}", config.collector.database_path))?;

    // Load statistics
    let stats = load_statistics(&storage)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Opens the configured database and builds a collector around it
fn build_collector(store: ConfigStore) -> anyhow::Result<Collector> {
    let database_path = store.current().collector.database_path.clone();
    tracing::info!("Opening database: {}", database_path);

    let storage = open_storage(Path::new(&database_path))
        .with_context(|| format!("opening {}", database_path))?;
    Ok(Collector::new(store, storage)?)
}

/// Runs one batch: every enabled feed, or only the named one
///
/// A failed configuration reload is logged and the batch runs on the
/// previous configuration.
async fn run_batch(collector: &mut Collector, only: Option<&str>) -> anyhow::Result<()> {
    if let Err(e) = collector.reload_config() {
        tracing::error!(
            "Configuration reload failed, collecting with the previous configuration: {}",
            e
        );
    }

    let results = match only {
        Some(name) => vec![collector.collect_by_name(name).await?],
        None => collector.collect_enabled().await,
    };

    print_results(&results);
    Ok(())
}

/// Handles the default mode: a single collection batch
async fn handle_collect(store: ConfigStore, only: Option<String>) -> anyhow::Result<()> {
    let mut collector = build_collector(store)?;

    match run_batch(&mut collector, only.as_deref()).await {
        Ok(()) => {
            tracing::info!("Collection completed");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Collection failed: {}", e);
            Err(e)
        }
    }
}

/// Handles the --watch mode: repeated batches until Ctrl-C
async fn handle_watch(store: ConfigStore, only: Option<String>) -> anyhow::Result<()> {
    let mut collector = build_collector(store)?;

    loop {
        if let Err(e) = run_batch(&mut collector, only.as_deref()).await {
            tracing::error!("Batch failed: {}", e);
        }

        let interval = collector.config().settings.batch_interval();
        tracing::info!("Next batch in {}s", interval.as_secs());

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
