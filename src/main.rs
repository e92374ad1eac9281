//! Flatwatch main entry point

use anyhow::Context;
use clap::Parser;
use flatwatch::config::load_config;
use flatwatch::storage::{initialize_schema, SqliteStore};
use flatwatch::{Crawler, KrishaParser};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Flatwatch: an incremental real-estate listing harvester
///
/// Crawls a paginated listing search, skips listings whose price has not
/// changed, and persists records with an append-only price history.
#[derive(Parser, Debug)]
#[command(name = "flatwatch")]
#[command(version = "1.0.0")]
#[command(about = "Incremental real-estate listing harvester", long_about = None)]
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

    /// Validate config, print the effective settings, and exit
    #[arg(long, conflicts_with = "init_db")]
    dry_run: bool,

    /// Create the database schema and exit
    #[arg(long)]
    init_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if cli.init_db {
        let conn = rusqlite::Connection::open(&config.storage.database_path)?;
        initialize_schema(&conn)?;
        println!("Schema initialized at {}", config.storage.database_path);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("flatwatch=info,warn"),
            1 => EnvFilter::new("flatwatch=debug,info"),
            2 => EnvFilter::new("flatwatch=trace,debug"),
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

/// Handles --dry-run: shows what one crawl run would do
fn handle_dry_run(config: &flatwatch::Config) {
    println!("=== Flatwatch Dry Run ===\n");

    println!("Search:");
    println!("  Start URL: {}", config.search.start_url());

    println!("\nFetch:");
    println!("  Retry schedule: {:?}s", config.fetch.retry_delays);
    println!("  Timeout: {}s", config.fetch.timeout);
    println!("  User agent: {}", config.fetch.user_agent);

    println!("\nCrawler:");
    println!("  Ads per page: {}", config.crawler.ads_per_page);
    println!("  Listing delay: {}ms", config.crawler.listing_delay_ms);
    println!("  Missed-listing limit: {}", config.crawler.max_missed_listings);
    println!("  Page retries: {}", config.crawler.page_retry_limit);
    println!("  Next-page retries: {}", config.crawler.next_page_retry_limit);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Batch size: {}", config.storage.batch_size);
    println!("  Write retries: {}", config.storage.write_retry_limit);

    println!("\n✓ Configuration is valid");
}

/// Runs one crawl to completion or abort
async fn handle_crawl(config: flatwatch::Config) -> anyhow::Result<()> {
    let store = SqliteStore::new(&config.storage).context("failed to open database")?;
    let parser = KrishaParser::new(&config.search.base_url);

    // Cooperative shutdown: checked between pages and listings; any
    // in-flight batch transaction finishes first.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current batch before exit");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut crawler = Crawler::new(config, parser, store, shutdown)?;
    match crawler.run().await {
        Ok(()) => {
            tracing::info!("Crawl completed");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
