use crate::extract::{ContentExtractor, ExtractError, ExtractedContent};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text never belongs to the readable document
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
    "iframe", "button",
];

/// Elements that end a block of text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "table", "tr", "blockquote",
    "pre", "h1", "h2", "h3", "h4", "h5", "h6", "br", "hr", "dd", "dt", "figure", "figcaption",
];

/// Reader-mode extractor built on `scraper`
///
/// The document is taken from `<article>`, then `<main>`, then `<body>`,
/// skipping navigation chrome and scripts.
#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, html: &str, url: &Url) -> Result<ExtractedContent, ExtractError> {
        let page = Html::parse_document(html);

        let root = ["article", "main", "body"]
            .iter()
            .find_map(|tag| first(&page, tag))
            .ok_or_else(|| ExtractError::NoContent(url.to_string()))?;

        let mut text = String::new();
        collect_text(root, &mut text);
        let document = tidy_blocks(&text);

        let title = meta_content(&page, "meta[property='og:title']")
            .or_else(|| first(&page, "title").and_then(|t| element_text(t)))
            .or_else(|| first(&page, "h1").and_then(|t| element_text(t)))
            .unwrap_or_else(|| url.path().to_string());

        Ok(ExtractedContent {
            title,
            word_count: document.split_whitespace().count(),
            document,
            description: meta_content(&page, "meta[name='description']")
                .or_else(|| meta_content(&page, "meta[property='og:description']")),
            author: meta_content(&page, "meta[name='author']"),
            published_date: meta_content(&page, "meta[property='article:published_time']")
                .or_else(|| {
                    first(&page, "time[datetime]")
                        .and_then(|t| t.value().attr("datetime"))
                        .map(str::to_string)
                }),
            links: extract_links(&page, url),
            byte_size: html.len(),
        })
    }
}

fn first<'a>(page: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    page.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn meta_content(page: &Html, selector: &str) -> Option<String> {
    first(page, selector)
        .and_then(|m| m.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            collect_text(child, out);
            if BLOCK_ELEMENTS.contains(&name) {
                out.push('\n');
            }
        }
    }
}

/// Collapses whitespace inside lines and joins non-empty lines as paragraphs
fn tidy_blocks(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Links from `<a href>` and `<link rel="canonical">`, deduplicated in
/// document order
fn extract_links(page: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    let selectors = ["a[href]", "link[rel='canonical'][href]"];
    for selector in selectors.iter().filter_map(|s| Selector::parse(s).ok()) {
        for element in page.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            let Some(link) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            else {
                continue;
            };
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }

    links
}

/// Resolves an href against the page URL
///
/// Script, mail, phone and data links, fragment-only anchors and
/// non-http(s) results are dropped.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute.to_string())
}
