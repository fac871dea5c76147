//! Content extraction
//!
//! Turns fetched HTML into a readable document plus the links to follow.
//! The crawler only depends on the [`ContentExtractor`] trait, so callers
//! can plug in their own reader-mode pipeline.

mod html;

pub use html::HtmlExtractor;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("page has no readable content: {0}")]
    NoContent(String),

    #[error("extraction failed for {url}: {message}")]
    Failed { url: String, message: String },
}

/// Readable content of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub title: String,

    /// Main text, blocks separated by blank lines
    pub document: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,

    /// Absolute http(s) URLs found on the page
    pub links: Vec<String>,
    pub word_count: usize,

    /// Size of the source HTML
    pub byte_size: usize,
}

/// Extracts readable content from HTML
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &Url) -> Result<ExtractedContent, ExtractError>;
}
