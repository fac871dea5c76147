//! Plain HTTP fetch strategy

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::engine::session::Session;
use crate::engine::{FetchError, FetchRequest, FetchStrategy, FetchedPage, StrategyKind};
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Builds the shared HTTP client
///
/// Redirects are followed (at most 10 hops) and the configured
/// browser user agent is presented.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.browser_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages with a single HTTP GET
///
/// The body is returned for every status code so the block detector can
/// inspect error pages. Successful responses that are not HTML are rejected.
#[derive(Debug, Clone)]
pub struct HttpStrategy {
    client: Client,
}

impl HttpStrategy {
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, FetchError> {
        let client = build_http_client(user_agent, crawler.timeout()).map_err(|source| {
            FetchError::Http {
                url: String::new(),
                source,
            }
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn cookie_header(&self, request: &FetchRequest) -> Result<Option<String>, FetchError> {
        let Some(path) = &request.session_path else {
            return Ok(None);
        };

        let session = Session::load(path).await?;
        let Ok(url) = Url::parse(&request.url) else {
            return Ok(None);
        };
        Ok(url
            .host_str()
            .and_then(|host| session.cookie_header(host, url.path())))
    }
}

#[async_trait]
impl FetchStrategy for HttpStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fast
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        let mut builder = self.client.get(&request.url).header(
            header::ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
        );

        if let Some(cookies) = self.cookie_header(request).await? {
            builder = builder.header(header::COOKIE, cookies);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if status.is_success() && !is_html_content_type(&content_type) {
            return Err(FetchError::ContentMismatch {
                url: request.url.clone(),
                content_type,
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        tracing::debug!("Fetched {} ({}, {} bytes)", final_url, status, html.len());

        Ok(FetchedPage {
            html,
            status_code: status.as_u16(),
            final_url,
        })
    }

    async fn close(&self) {}
}

/// A missing content type is given the benefit of the doubt
fn is_html_content_type(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml")
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            strategy: StrategyKind::Fast,
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
