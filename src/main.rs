//! Ripplemap main entry point
//!
//! This is the command-line interface for the Ripplemap site crawler.

use clap::Parser;
use ripplemap::config::{load_config_with_hash, validate_crawler_config, Config};
use ripplemap::crawler::crawl;
use ripplemap::output::{print_statistics, write_sitemap};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Ripplemap: A polite site crawler
///
/// Ripplemap crawls a single site from a seed URL while respecting
/// robots.txt and a politeness delay, and writes a sitemap of every page
/// it fetched successfully.
#[derive(Parser, Debug)]
#[command(name = "ripplemap")]
#[command(version)]
#[command(about = "A polite site crawler and sitemap generator", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Override the seed URL from the config file
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Override the sitemap output path from the config file
    #[arg(long, value_name = "PATH")]
    sitemap: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(seed) = cli.seed {
        config.crawler.seed_url = seed;
        validate_crawler_config(&config.crawler)?;
    }
    if let Some(sitemap) = cli.sitemap {
        config.output.sitemap_path = sitemap.to_string_lossy().into_owned();
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripplemap=info,warn"),
            1 => EnvFilter::new("ripplemap=debug,info"),
            2 => EnvFilter::new("ripplemap=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Ripplemap Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", crawler.seed_url);
    println!("  Max pages: {}", crawler.max_pages);
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Workers: {}", crawler.worker_count);
    println!("  Request delay: {}ms", crawler.request_delay_ms);
    println!("  Request timeout: {}ms", crawler.request_timeout_ms);
    match crawler.session_timeout_secs {
        Some(secs) => println!("  Session timeout: {}s", secs),
        None => println!("  Session timeout: none"),
    }
    println!("  Respect robots.txt: {}", crawler.respect_robots_txt);
    println!(
        "  Retries: {} (backoff {}ms)",
        crawler.max_retries, crawler.retry_backoff_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Sitemap: {}", config.output.sitemap_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let sitemap_path = PathBuf::from(&config.output.sitemap_path);

    // Ctrl-C stops the crawl; pages fetched so far still make the sitemap
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping crawl");
                cancel.cancel();
            }
        });
    }

    let output = match crawl(config, cancel).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    write_sitemap(&sitemap_path, &output.sitemap)?;

    if output.cancelled {
        println!("Crawl interrupted; sitemap covers the pages fetched so far.\n");
    }
    print_statistics(&output.stats);
    println!("\n✓ Sitemap written to: {}", sitemap_path.display());

    Ok(())
}
