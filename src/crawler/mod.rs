//! Crawler module for scheduling and admitting pages
//!
//! This module contains the crawl orchestration, including:
//! - The visited set and admission pipeline ([`Frontier`])
//! - The concurrency and rate limited [`TaskQueue`]
//! - The [`Crawler`] and the [`CrawlStream`] of results it produces

mod counters;
mod frontier;
mod queue;
mod scheduler;

pub use counters::{CrawlCounters, CrawlCountersSnapshot};
pub use frontier::{AdmissionRules, Frontier, Rejection};
pub use queue::{RateLimiter, TaskQueue};
pub use scheduler::{CrawlResult, CrawlStream, Crawler};
