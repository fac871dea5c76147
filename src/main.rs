//! Sumi-Trawl main entry point
//!
//! This is the command-line interface for the Sumi-Trawl site crawler.

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use sumi_trawl::config::{load_config_with_hash, validate, Config};
use sumi_trawl::output::print_statistics;
use sumi_trawl::{Crawler, StrategyKind};
use tracing_subscriber::EnvFilter;

/// Sumi-Trawl: a polite, block-aware site crawler
///
/// Sumi-Trawl crawls the given sites while respecting robots.txt and rate
/// limits, escalating from plain HTTP to a headless browser when a page is
/// blocked, and prints one line per accepted page.
#[derive(Parser, Debug)]
#[command(name = "sumi-trawl")]
#[command(version)]
#[command(about = "A polite, block-aware site crawler", long_about = None)]
struct Cli {
    /// Start URLs; the crawl stays within their base domains
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum link depth from the start URLs
    #[arg(short, long)]
    depth: Option<u32>,

    /// Maximum number of concurrent fetches
    #[arg(long)]
    concurrency: Option<u32>,

    /// Stop after this many pages
    #[arg(short, long)]
    max_pages: Option<u32>,

    /// Maximum fetches started per second
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Only crawl URLs matching this regex
    #[arg(long, value_name = "REGEX")]
    include: Option<String>,

    /// Skip URLs matching this regex
    #[arg(long, value_name = "REGEX")]
    exclude: Option<String>,

    /// Use only this fetch engine (fast, browser, stealth)
    #[arg(long, value_name = "ENGINE")]
    engine: Option<StrategyKind>,

    /// Ignore robots.txt
    #[arg(long)]
    no_robots: bool,

    /// Do not seed from sitemaps
    #[arg(long)]
    no_sitemap: bool,

    /// Do not use stored sessions
    #[arg(long)]
    no_auth: bool,

    /// Validate configuration and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply(&self, config: &mut Config) {
        let crawler = &mut config.crawler;
        if let Some(depth) = self.depth {
            crawler.depth = depth;
        }
        if let Some(concurrency) = self.concurrency {
            crawler.concurrency = concurrency;
        }
        if let Some(max_pages) = self.max_pages {
            crawler.max_pages = max_pages;
        }
        if let Some(rate_limit) = self.rate_limit {
            crawler.rate_limit = rate_limit;
        }
        if self.include.is_some() {
            crawler.include_pattern = self.include.clone();
        }
        if self.exclude.is_some() {
            crawler.exclude_pattern = self.exclude.clone();
        }
        if self.engine.is_some() {
            crawler.force_engine = self.engine;
        }
        if self.no_robots {
            crawler.respect_robots = false;
        }
        if self.no_sitemap {
            crawler.use_sitemap = false;
        }
        if self.no_auth {
            crawler.use_auth = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    cli.apply(&mut config);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config, &cli.urls);
        return Ok(());
    }

    handle_crawl(&config, &cli.urls).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_trawl=info,warn"),
            1 => EnvFilter::new("sumi_trawl=debug,info"),
            2 => EnvFilter::new("sumi_trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, urls: &[String]) {
    let crawler = &config.crawler;

    println!("=== Sumi-Trawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Depth: {}", crawler.depth);
    println!("  Concurrency: {}", crawler.concurrency);
    println!("  Max pages: {}", crawler.max_pages);
    println!("  Rate limit: {}/s", crawler.rate_limit);
    println!("  Respect robots.txt: {}", crawler.respect_robots);
    println!("  Use sitemaps: {}", crawler.use_sitemap);
    println!("  Use stored sessions: {}", crawler.use_auth);
    println!("  Preferred language: {}", crawler.preferred_language);
    if let Some(include) = &crawler.include_pattern {
        println!("  Include: {}", include);
    }
    if let Some(exclude) = &crawler.exclude_pattern {
        println!("  Exclude: {}", exclude);
    }
    match crawler.force_engine {
        Some(engine) => println!("  Engine: {} only", engine),
        None => println!("  Engine: fast -> browser -> stealth"),
    }

    println!("\nUser Agent:");
    println!("  Identity: {}", config.user_agent.identity());

    println!("\nStart URLs ({}):", urls.len());
    for url in urls {
        match sumi_trawl::normalize_url(url) {
            Ok(normalized) => println!("  - {}", normalized),
            Err(e) => println!("  - {} (skipped: {})", url, e),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let crawler = Crawler::new(config).context("failed to set up crawler")?;

    let mut results = match crawler.crawl(urls).await {
        Ok(stream) => stream,
        Err(e) => {
            crawler.close().await;
            return Err(e.into());
        }
    };

    while let Some(result) = results.next().await {
        println!(
            "[{}] {} {} \"{}\" ({} words)",
            result.depth,
            result.strategy,
            result.final_url,
            result.content.title,
            result.content.word_count
        );
    }

    let stats = results.statistics();
    drop(results);
    crawler.close().await;

    if stats.pages_yielded == 0 {
        tracing::warn!("Crawl finished without any pages");
    }
    println!();
    print_statistics(&stats);

    Ok(())
}
