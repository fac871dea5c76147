//! robots.txt fetching and per-origin caching
//!
//! Records are cached by origin for the life of one crawl. The first record
//! stored for an origin wins, so concurrent fetches agree on the rules.

use crate::robots::RobotsRecord;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default timeout for robots.txt requests
pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("robots.txt request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("robots.txt returned HTTP {0}")]
    Status(u16),

    #[error("URL has no origin: {0}")]
    NoOrigin(String),
}

/// Per-crawl robots.txt cache and evaluator
///
/// Records are keyed by origin (scheme, host and port), fetched at most once
/// per origin in the common case and immutable once stored. A racing second
/// fetch of the same origin is discarded in favour of the stored record.
#[derive(Debug)]
pub struct RobotsPolicy {
    client: Client,
    timeout: Duration,
    records: RwLock<HashMap<String, Arc<RobotsRecord>>>,
}

impl RobotsPolicy {
    pub fn new(client: Client) -> Self {
        Self::with_timeout(client, ROBOTS_TIMEOUT)
    }

    pub fn with_timeout(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches and caches robots.txt for the URL's origin
    ///
    /// Any failure (network error, timeout, non-success status) stores an
    /// empty record, which allows everything.
    pub async fn parse(&self, url: &str) -> Arc<RobotsRecord> {
        let Some(key) = origin_key(url) else {
            return Arc::new(RobotsRecord::allow_all());
        };

        if let Some(record) = self.get(&key) {
            return record;
        }

        let record = match self.fetch(&key).await {
            Ok(record) => {
                tracing::debug!(
                    "Parsed robots.txt for {}: {} groups, {} sitemaps",
                    key,
                    record.rules.len(),
                    record.sitemaps.len()
                );
                record
            }
            Err(e) => {
                tracing::debug!("No usable robots.txt for {} ({}), allowing all", key, e);
                RobotsRecord::allow_all()
            }
        };

        self.insert(key, record)
    }

    async fn fetch(&self, origin: &str) -> Result<RobotsRecord, RobotsError> {
        let robots_url = format!("{}/robots.txt", origin);
        let response = self
            .client
            .get(&robots_url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RobotsError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(RobotsRecord::parse(&body))
    }

    fn get(&self, key: &str) -> Option<Arc<RobotsRecord>> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(key).cloned())
    }

    /// No-op if a record is already present
    fn insert(&self, key: String, record: RobotsRecord) -> Arc<RobotsRecord> {
        match self.records.write() {
            Ok(mut records) => records
                .entry(key)
                .or_insert_with(|| Arc::new(record))
                .clone(),
            Err(_) => Arc::new(record),
        }
    }

    /// Whether robots.txt has already been resolved for the URL's origin
    pub fn is_cached(&self, url: &str) -> bool {
        origin_key(url)
            .map(|key| self.get(&key).is_some())
            .unwrap_or(false)
    }

    /// Checks a URL against the cached record for its origin
    ///
    /// Origins without a cached record are allowed.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to check
    /// * `user_agent` - Product token matched against `User-agent` groups
    ///
    /// # Returns
    ///
    /// * `true` - The URL may be fetched
    /// * `false` - The URL is malformed or a matching group disallows it
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(record) = origin_key(url).and_then(|key| self.get(&key)) else {
            return true;
        };

        let target = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };

        record.is_allowed(&target, user_agent)
    }

    /// Crawl delay for the URL's origin, if one was declared
    pub fn crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration> {
        let record = origin_key(url).and_then(|key| self.get(&key))?;
        record
            .crawl_delay(user_agent)
            .map(Duration::from_secs_f64)
    }

    /// Sitemap URLs declared by the origin's robots.txt
    pub fn sitemaps(&self, url: &str) -> Vec<String> {
        origin_key(url)
            .and_then(|key| self.get(&key))
            .map(|record| record.sitemaps.clone())
            .unwrap_or_default()
    }
}

fn origin_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.host_str().is_none() {
        return None;
    }
    Some(parsed.origin().ascii_serialization())
}
