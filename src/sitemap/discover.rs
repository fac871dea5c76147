use crate::sitemap::{parse_sitemap, SitemapDocument, SitemapEntry};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Well-known sitemap locations, tried in order
pub const DEFAULT_SITEMAP_PATHS: &[&str] =
    &["/sitemap.xml", "/sitemap_index.xml", "/sitemap/sitemap.xml"];

/// News sitemap locations, tried before the general ones for metadata discovery
pub const NEWS_SITEMAP_PATHS: &[&str] = &[
    "/news-sitemap.xml",
    "/sitemap-news.xml",
    "/sitemap_news.xml",
    "/news_sitemap.xml",
];

const METADATA_FALLBACK_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// Cap on URLs returned by [`SitemapDiscoverer::discover`]
pub const DISCOVERY_CAP: usize = 200;

/// Child sitemaps expanded per index by [`SitemapDiscoverer::discover`]
pub const INDEX_CHILD_LIMIT: usize = 2;

/// Cap on entries returned by [`SitemapDiscoverer::discover_with_metadata`]
pub const METADATA_CAP: usize = 1000;

/// Child sitemaps expanded per index by metadata discovery
pub const METADATA_CHILD_LIMIT: usize = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const NEWS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Finds page URLs through sitemaps
///
/// Results are cached per crawl. Every failure (network, status, parse)
/// contributes zero URLs rather than an error.
#[derive(Debug)]
pub struct SitemapDiscoverer {
    client: Client,
    cache: Mutex<HashMap<String, Vec<String>>>,
}

impl SitemapDiscoverer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Tries the well-known sitemap locations of the URL's origin
    ///
    /// Stops at the first location yielding any URL.
    ///
    /// # Arguments
    ///
    /// * `url` - Any URL on the site; only its origin is used
    ///
    /// # Returns
    ///
    /// Up to 200 page URLs, empty when no sitemap was found. Results are
    /// cached per origin.
    pub async fn discover(&self, url: &str) -> Vec<String> {
        let Some(origin) = origin_of(url) else {
            return Vec::new();
        };

        if let Some(cached) = self.cache.lock().await.get(&origin) {
            return cached.clone();
        }

        let mut found = Vec::new();
        for path in DEFAULT_SITEMAP_PATHS {
            let candidate = format!("{}{}", origin, path);
            let entries = self
                .collect(&candidate, DISCOVERY_CAP, INDEX_CHILD_LIMIT, REQUEST_TIMEOUT)
                .await;
            if !entries.is_empty() {
                tracing::debug!("Found {} URLs in {}", entries.len(), candidate);
                found = entries.into_iter().map(|e| e.loc).collect();
                break;
            }
        }

        self.cache
            .lock()
            .await
            .entry(origin)
            .or_insert(found)
            .clone()
    }

    /// Reads a specific sitemap, such as one declared in robots.txt
    pub async fn discover_from(&self, sitemap_url: &str) -> Vec<String> {
        if let Some(cached) = self.cache.lock().await.get(sitemap_url) {
            return cached.clone();
        }

        let found: Vec<String> = self
            .collect(sitemap_url, DISCOVERY_CAP, INDEX_CHILD_LIMIT, REQUEST_TIMEOUT)
            .await
            .into_iter()
            .map(|e| e.loc)
            .collect();

        self.cache
            .lock()
            .await
            .entry(sitemap_url.to_string())
            .or_insert(found)
            .clone()
    }

    /// Discovers entries with their metadata, preferring news sitemaps
    pub async fn discover_with_metadata(&self, url: &str) -> Vec<SitemapEntry> {
        let Some(origin) = origin_of(url) else {
            return Vec::new();
        };

        let candidates = NEWS_SITEMAP_PATHS
            .iter()
            .map(|p| (p, NEWS_LOOKUP_TIMEOUT))
            .chain(METADATA_FALLBACK_PATHS.iter().map(|p| (p, REQUEST_TIMEOUT)));

        for (path, timeout) in candidates {
            let candidate = format!("{}{}", origin, path);
            let entries = self
                .collect(&candidate, METADATA_CAP, METADATA_CHILD_LIMIT, timeout)
                .await;
            if !entries.is_empty() {
                return entries;
            }
        }

        Vec::new()
    }

    /// Reads one sitemap, expanding up to `child_limit` children of an index
    async fn collect(
        &self,
        sitemap_url: &str,
        cap: usize,
        child_limit: usize,
        timeout: Duration,
    ) -> Vec<SitemapEntry> {
        match self.fetch(sitemap_url, timeout).await {
            Some(SitemapDocument::UrlSet(mut entries)) => {
                entries.truncate(cap);
                entries
            }
            Some(SitemapDocument::Index(children)) => {
                let mut entries = Vec::new();
                for child in children.iter().take(child_limit) {
                    if entries.len() >= cap {
                        break;
                    }
                    // Nested indexes are not followed
                    if let Some(SitemapDocument::UrlSet(child_entries)) =
                        self.fetch(child, timeout).await
                    {
                        let room = cap - entries.len();
                        entries.extend(child_entries.into_iter().take(room));
                    }
                }
                entries
            }
            None => Vec::new(),
        }
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Option<SitemapDocument> {
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Sitemap request failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }

        let body = response.text().await.ok()?;
        let document = parse_sitemap(&body);
        if document.is_empty() {
            tracing::debug!("Sitemap {} has no entries", url);
        } else {
            tracing::debug!("Sitemap {} has {} entries", url, document.len());
        }
        Some(document)
    }
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urlset(base: &str, prefix: &str, count: usize) -> String {
        let urls: String = (0..count)
            .map(|i| format!("<url><loc>{}/{}/{}</loc></url>", base, prefix, i))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            urls
        )
    }

    fn index(children: &[String]) -> String {
        let entries: String = children
            .iter()
            .map(|c| format!("<sitemap><loc>{}</loc></sitemap>", c))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
            entries
        )
    }

    async fn mount(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_urlset_is_capped() {
        let server = MockServer::start().await;
        mount(&server, "/sitemap.xml", urlset(&server.uri(), "p", 350)).await;

        let urls = SitemapDiscoverer::new(Client::new())
            .discover(&server.uri())
            .await;
        assert_eq!(urls.len(), DISCOVERY_CAP);
    }

    #[tokio::test]
    async fn test_index_expands_first_two_children() {
        let server = MockServer::start().await;
        let base = server.uri();
        let children: Vec<String> = (0..10).map(|i| format!("{}/child-{}.xml", base, i)).collect();

        mount(&server, "/sitemap.xml", index(&children)).await;
        for i in 0..2 {
            mount(&server, &format!("/child-{}.xml", i), urlset(&base, &format!("c{}", i), 500)).await;
        }
        for i in 2..10 {
            Mock::given(method("GET"))
                .and(path(format!("/child-{}.xml", i)))
                .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&base, "late", 500)))
                .expect(0)
                .mount(&server)
                .await;
        }

        let urls = SitemapDiscoverer::new(Client::new()).discover(&base).await;
        assert!(urls.len() <= DISCOVERY_CAP);
        assert!(urls
            .iter()
            .all(|u| u.contains("/c0/") || u.contains("/c1/")));
    }

    #[tokio::test]
    async fn test_locations_fall_through_and_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        mount(&server, "/sitemap_index.xml", urlset(&server.uri(), "x", 3)).await;

        let discoverer = SitemapDiscoverer::new(Client::new());
        let first = discoverer.discover(&format!("{}/some/page", server.uri())).await;
        let second = discoverer.discover(&server.uri()).await;

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_no_sitemap_is_empty() {
        let server = MockServer::start().await;
        let urls = SitemapDiscoverer::new(Client::new())
            .discover(&server.uri())
            .await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_discover_from_declared_sitemap() {
        let server = MockServer::start().await;
        mount(&server, "/custom/map.xml", urlset(&server.uri(), "d", 5)).await;

        let urls = SitemapDiscoverer::new(Client::new())
            .discover_from(&format!("{}/custom/map.xml", server.uri()))
            .await;
        assert_eq!(urls.len(), 5);
    }

    #[tokio::test]
    async fn test_metadata_prefers_news_sitemap() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount(&server, "/sitemap-news.xml", urlset(&base, "news", 4)).await;
        mount(&server, "/sitemap.xml", urlset(&base, "general", 10)).await;

        let entries = SitemapDiscoverer::new(Client::new())
            .discover_with_metadata(&base)
            .await;
        assert_eq!(entries.len(), 4);
        assert!(entries[0].loc.contains("/news/"));
    }
}
