//! Crawl statistics
//!
//! Combines the crawler's per-page outcome counters with the fetch
//! engine's per-strategy counters, so pages that were dropped silently
//! still show up in the final report.

use crate::crawler::CrawlCountersSnapshot;
use crate::engine::{EngineStatsSnapshot, StrategyKind};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Pages handed to the caller
    pub pages_yielded: u64,

    /// Seed URLs enqueued
    pub seeds: u64,

    /// URLs listed by sitemaps during discovery
    pub sitemap_urls: u64,

    /// Links and sitemap URLs that passed admission
    pub urls_admitted: u64,

    pub pages_blocked: u64,
    pub http_errors: u64,
    pub low_value_pages: u64,
    pub failed_pages: u64,
    pub robots_denied: u64,

    /// Admission rejections by reason
    pub rejections: BTreeMap<String, u64>,

    /// Successful, blocked and failed attempts per strategy
    pub strategies: Vec<StrategyStatistics>,

    /// URLs on which every strategy failed
    pub exhausted: u64,
}

/// Attempt outcomes for one fetch strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyStatistics {
    pub strategy: StrategyKind,
    pub successes: u64,
    pub blocks: u64,
    pub failures: u64,
}

impl CrawlStatistics {
    pub fn new(crawl: CrawlCountersSnapshot, engine: EngineStatsSnapshot) -> Self {
        let strategies = StrategyKind::ALL
            .iter()
            .map(|&strategy| StrategyStatistics {
                strategy,
                successes: engine.successes_for(strategy),
                blocks: engine.blocks_for(strategy),
                failures: engine.failures_for(strategy),
            })
            .collect();

        Self {
            pages_yielded: crawl.yielded,
            seeds: crawl.seeded,
            sitemap_urls: crawl.discovered,
            urls_admitted: crawl.admitted,
            pages_blocked: crawl.blocked,
            http_errors: crawl.http_errors,
            low_value_pages: crawl.low_value,
            failed_pages: crawl.failed,
            robots_denied: crawl.robots_denied,
            rejections: crawl.rejections,
            strategies,
            exhausted: engine.exhausted,
        }
    }

    /// Pages that were fetched or attempted but not yielded
    pub fn pages_skipped(&self) -> u64 {
        self.pages_blocked
            + self.http_errors
            + self.low_value_pages
            + self.failed_pages
            + self.robots_denied
    }

    pub fn total_rejections(&self) -> u64 {
        self.rejections.values().sum()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages yielded: {}", stats.pages_yielded);
    println!("  Seeds: {}", stats.seeds);
    println!("  Sitemap URLs seen: {}", stats.sitemap_urls);
    println!("  URLs admitted: {}", stats.urls_admitted);
    println!();

    println!("Skipped Pages ({}):", stats.pages_skipped());
    println!("  Blocked: {}", stats.pages_blocked);
    println!("  HTTP errors: {}", stats.http_errors);
    println!("  Low value: {}", stats.low_value_pages);
    println!("  Failed: {}", stats.failed_pages);
    println!("  Disallowed by robots.txt: {}", stats.robots_denied);
    println!();

    if !stats.rejections.is_empty() {
        println!("Admission Rejections ({}):", stats.total_rejections());
        let mut rejections: Vec<_> = stats.rejections.iter().collect();
        rejections.sort_by(|a, b| b.1.cmp(a.1));

        for (reason, count) in rejections {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    println!("Fetch Strategies:");
    for strategy in &stats.strategies {
        println!(
            "  {}: {} ok, {} blocked, {} failed",
            strategy.strategy, strategy.successes, strategy.blocks, strategy.failures
        );
    }
    if stats.exhausted > 0 {
        println!("  Exhausted all strategies: {}", stats.exhausted);
    }
    println!();

    let attempted = stats.pages_yielded + stats.pages_skipped();
    let success_rate = if attempted > 0 {
        (stats.pages_yielded as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages yielded)",
        success_rate, stats.pages_yielded, attempted
    );
}
