use sitemap::reader::{SiteMapEntity, SiteMapReader};
use sitemap::structs::{ChangeFreq, UrlEntry};
use std::io::Cursor;

/// One `<url>` entry of a urlset
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,

    /// Last modification time, RFC 3339
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
}

impl SitemapEntry {
    fn from_url_entry(entry: UrlEntry) -> Option<Self> {
        let loc = entry.loc.get_url()?.to_string();

        let changefreq = match entry.changefreq {
            ChangeFreq::Always => Some("always"),
            ChangeFreq::Hourly => Some("hourly"),
            ChangeFreq::Daily => Some("daily"),
            ChangeFreq::Weekly => Some("weekly"),
            ChangeFreq::Monthly => Some("monthly"),
            ChangeFreq::Yearly => Some("yearly"),
            ChangeFreq::Never => Some("never"),
            _ => None,
        };

        Some(Self {
            loc,
            lastmod: entry.lastmod.get_time().map(|t| t.to_rfc3339()),
            changefreq: changefreq.map(str::to_string),
            priority: entry.priority.get_priority(),
        })
    }
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),

    /// `<urlset>`: page entries
    UrlSet(Vec<SitemapEntry>),
}

impl SitemapDocument {
    pub fn len(&self) -> usize {
        match self {
            Self::Index(children) => children.len(),
            Self::UrlSet(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses sitemap XML
///
/// A document that declares any child sitemap is treated as an index.
/// Entries without a valid `<loc>` are skipped.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut urls = Vec::new();
    let mut children = Vec::new();

    for entity in SiteMapReader::new(Cursor::new(xml.as_bytes())) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(entry) = SitemapEntry::from_url_entry(entry) {
                    urls.push(entry);
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(loc) = entry.loc.get_url() {
                    children.push(loc.to_string());
                }
            }
            SiteMapEntity::Err(e) => {
                tracing::debug!("Skipping malformed sitemap entry: {:?}", e);
            }
        }
    }

    if !children.is_empty() {
        SitemapDocument::Index(children)
    } else {
        SitemapDocument::UrlSet(urls)
    }
}
