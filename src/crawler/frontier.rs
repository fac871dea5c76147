//! Crawl frontier
//!
//! Decides which discovered URLs enter the queue. Every candidate is
//! normalized and screened against the visited set, the page budget, the
//! depth limit, the seed domains, robots.txt, include/exclude patterns and
//! locale dedup before it is recorded as visited.

use crate::dedup::DedupTracker;
use crate::robots::RobotsPolicy;
use crate::url::{is_resource_url, normalize_url, url_base_domain, UrlPatterns};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use url::Url;

/// Why a candidate URL was not admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Invalid,
    Visited,
    Budget,
    Depth,
    Resource,
    OffDomain,
    Robots,
    Pattern,

    /// Suppressed locale variant, carrying the dedup reason (`locale:<tag>`)
    Locale(String),
}

impl Rejection {
    /// Stable key used for statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Visited => "visited",
            Self::Budget => "budget",
            Self::Depth => "depth",
            Self::Resource => "resource",
            Self::OffDomain => "off-domain",
            Self::Robots => "robots",
            Self::Pattern => "pattern",
            Self::Locale(_) => "locale",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locale(reason) => f.write_str(reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Admission limits for one crawl
#[derive(Debug, Clone)]
pub struct AdmissionRules {
    pub max_depth: u32,
    pub max_pages: usize,
    pub respect_robots: bool,

    /// Token matched against robots.txt user-agent groups
    pub robots_agent: String,
}

/// Visited set plus the admission pipeline
///
/// Checks run in a fixed order and stop at the first failure: visited,
/// page budget, depth, resource extension, base domain, robots, patterns,
/// locale. The visited lock is held across the whole pipeline so two
/// producers can never both admit the same URL.
#[derive(Debug)]
pub struct Frontier {
    visited: Mutex<HashSet<String>>,
    seed_domains: HashSet<String>,
    patterns: UrlPatterns,
    dedup: DedupTracker,
    rules: AdmissionRules,
}

impl Frontier {
    pub fn new(
        seeds: &[Url],
        patterns: UrlPatterns,
        dedup: DedupTracker,
        rules: AdmissionRules,
    ) -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            seed_domains: seeds.iter().filter_map(url_base_domain).collect(),
            patterns,
            dedup,
            rules,
        }
    }

    /// Marks a seed visited without running the pipeline
    ///
    /// Returns false if it was already visited.
    pub fn mark_seed(&self, url: &Url) -> bool {
        match self.visited.lock() {
            Ok(mut visited) => visited.insert(url.to_string()),
            Err(_) => false,
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        let Ok(normalized) = normalize_url(url) else {
            return false;
        };
        self.visited
            .lock()
            .map(|visited| visited.contains(normalized.as_str()))
            .unwrap_or(false)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    /// Runs the pipeline without recording the URL as visited
    pub fn evaluate(
        &self,
        candidate: &str,
        depth: u32,
        yielded: usize,
        robots: &RobotsPolicy,
    ) -> Result<Url, Rejection> {
        let visited = self.visited.lock().map_err(|_| Rejection::Invalid)?;
        self.check(&visited, candidate, depth, yielded, robots)
    }

    /// Runs the pipeline and records the URL as visited on success
    ///
    /// # Arguments
    ///
    /// * `candidate` - Raw link as found on a page or in a sitemap
    /// * `depth` - Depth the URL would be crawled at
    /// * `yielded` - Pages yielded so far, checked against the budget
    /// * `robots` - Cached robots.txt rules for the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The normalized URL to enqueue, now marked visited
    /// * `Err(Rejection)` - The first check that failed
    pub fn admit(
        &self,
        candidate: &str,
        depth: u32,
        yielded: usize,
        robots: &RobotsPolicy,
    ) -> Result<Url, Rejection> {
        let mut visited = self.visited.lock().map_err(|_| Rejection::Invalid)?;
        let url = self.check(&visited, candidate, depth, yielded, robots)?;
        visited.insert(url.to_string());
        Ok(url)
    }

    fn check(
        &self,
        visited: &HashSet<String>,
        candidate: &str,
        depth: u32,
        yielded: usize,
        robots: &RobotsPolicy,
    ) -> Result<Url, Rejection> {
        let url = normalize_url(candidate).map_err(|_| Rejection::Invalid)?;

        if visited.contains(url.as_str()) {
            return Err(Rejection::Visited);
        }

        if yielded >= self.rules.max_pages {
            return Err(Rejection::Budget);
        }

        if depth > self.rules.max_depth {
            return Err(Rejection::Depth);
        }

        if is_resource_url(&url) {
            return Err(Rejection::Resource);
        }

        match url_base_domain(&url) {
            Some(domain) if self.seed_domains.contains(&domain) => {}
            _ => return Err(Rejection::OffDomain),
        }

        if self.rules.respect_robots && !robots.is_allowed(url.as_str(), &self.rules.robots_agent)
        {
            return Err(Rejection::Robots);
        }

        if !self.patterns.allows(url.as_str()) {
            return Err(Rejection::Pattern);
        }

        let decision = self.dedup.should_skip(url.as_str());
        if decision.skip {
            return Err(Rejection::Locale(
                decision.reason.unwrap_or_else(|| "locale".to_string()),
            ));
        }

        Ok(url)
    }
}
