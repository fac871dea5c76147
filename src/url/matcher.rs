use regex::Regex;
use url::Url;

/// File extensions of resources that are never documents worth extracting
const RESOURCE_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "tif", "tiff", "avif", "css",
    "js", "mjs", "json", "xml", "rss", "atom", "zip", "gz", "tgz", "bz2", "xz", "rar", "7z", "tar",
    "exe", "dmg", "msi", "deb", "rpm", "apk", "iso", "bin", "mp3", "mp4", "m4a", "m4v", "wav",
    "ogg", "webm", "avi", "mov", "mkv", "flac", "woff", "woff2", "ttf", "otf", "eot", "doc",
    "docx", "xls", "xlsx", "ppt", "pptx", "csv", "txt",
];

/// Checks if a host matches a wildcard pattern
///
/// `"*.example.com"` matches `example.com` and every subdomain of it; any
/// other pattern must equal the host. Comparison ignores ASCII case.
///
/// # Examples
///
/// ```
/// use sumi_trawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.linkedin.com", "www.LinkedIn.com"));
/// assert!(matches_wildcard("*.linkedin.com", "linkedin.com"));
/// assert!(!matches_wildcard("*.linkedin.com", "notlinkedin.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}

/// Returns true if the URL path ends in a non-document resource extension
pub fn is_resource_url(url: &Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            RESOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// Compiled include/exclude URL filters
#[derive(Debug, Clone, Default)]
pub struct UrlPatterns {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl UrlPatterns {
    /// Compiles optional include and exclude regular expressions
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            include: include.map(Regex::new).transpose()?,
            exclude: exclude.map(Regex::new).transpose()?,
        })
    }

    /// A URL passes when it matches the include pattern (if any) and does not
    /// match the exclude pattern (if any)
    pub fn allows(&self, url: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(url) {
                return false;
            }
        }

        match &self.exclude {
            Some(exclude) => !exclude.is_match(url),
            None => true,
        }
    }
}
