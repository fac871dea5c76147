//! Output module for crawl reports
//!
//! This module builds and prints the end-of-crawl statistics.

pub mod stats;

pub use stats::{print_statistics, CrawlStatistics, StrategyStatistics};
