//! Sitemap discovery module
//!
//! Parses `<urlset>` and `<sitemapindex>` documents and discovers page URLs
//! from well-known or robots.txt-declared sitemap locations.

mod discover;
mod parser;

pub use discover::{
    SitemapDiscoverer, DEFAULT_SITEMAP_PATHS, DISCOVERY_CAP, INDEX_CHILD_LIMIT, METADATA_CAP,
    METADATA_CHILD_LIMIT, NEWS_SITEMAP_PATHS,
};
pub use parser::{parse_sitemap, SitemapDocument, SitemapEntry};
