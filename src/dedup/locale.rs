use crate::dedup::codes::{is_country_code, is_excluded_segment, is_language_code};
use url::Url;

/// Query parameters that carry a locale
pub const LOCALE_PARAMS: &[&str] = &["lang", "locale", "hl", "language"];

/// Locale detected in a URL, plus the URL with that locale removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleInfo {
    pub has_locale: bool,

    /// Lowercase locale tag, e.g. `de` or `pt-br`
    pub locale: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,

    /// Path (and remaining query) with the locale segment and locale
    /// parameters stripped
    pub canonical_path: String,

    /// Host (and port) with a locale subdomain stripped
    pub canonical_host: String,
}

impl LocaleInfo {
    /// Dedup key shared by every locale variant of one page
    pub fn canonical_key(&self) -> String {
        format!("{}{}", self.canonical_host, self.canonical_path)
    }
}

struct Locale {
    language: String,
    country: Option<String>,
}

impl Locale {
    fn tag(&self) -> String {
        match &self.country {
            Some(country) => format!("{}-{}", self.language, country),
            None => self.language.clone(),
        }
    }
}

/// Parses `en`, `pt-BR` or `pt_br` style tokens
///
/// With `strict`, bare two-letter tokens that are common English words
/// are rejected.
fn parse_locale(token: &str, strict: bool) -> Option<Locale> {
    let token = token.to_ascii_lowercase();
    let mut parts = token.split(['-', '_']);
    let language = parts.next()?;
    let country = parts.next();

    if parts.next().is_some() || !is_language_code(language) {
        return None;
    }

    match country {
        None => {
            if strict && is_excluded_segment(language) {
                return None;
            }
            Some(Locale {
                language: language.to_string(),
                country: None,
            })
        }
        Some(country) if is_country_code(country) => Some(Locale {
            language: language.to_string(),
            country: Some(country.to_string()),
        }),
        Some(_) => None,
    }
}

/// Detects a locale in a URL
///
/// Looks at the first path segment, then inner path segments (never the
/// last one), then the leading host label, then the `lang`, `locale`, `hl`
/// and `language` query parameters. The first hit wins.
pub fn extract_locale(url: &Url) -> LocaleInfo {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let host = url.host_str().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').collect();

    let mut locale = None;
    let mut segment_index = None;
    let mut host_label = false;

    let inner_end = segments.len().saturating_sub(1);
    let candidates = std::iter::once(0).chain(1..inner_end);
    for index in candidates {
        if let Some(found) = segments.get(index).and_then(|s| parse_locale(s, true)) {
            locale = Some(found);
            segment_index = Some(index);
            break;
        }
    }

    if locale.is_none() && labels.len() >= 3 {
        if let Some(found) = parse_locale(labels[0], true) {
            locale = Some(found);
            host_label = true;
        }
    }

    if locale.is_none() {
        locale = url
            .query_pairs()
            .filter(|(key, _)| LOCALE_PARAMS.contains(&key.to_ascii_lowercase().as_str()))
            .find_map(|(_, value)| parse_locale(&value, false));
    }

    let mut path: String = segments
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != segment_index)
        .map(|(_, seg)| format!("/{}", seg))
        .collect();
    if path.is_empty() {
        path.push('/');
    }

    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !LOCALE_PARAMS.contains(&key.to_ascii_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !remaining.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(remaining)
            .finish();
        path = format!("{}?{}", path, query);
    }

    let mut canonical_host = if host_label {
        labels[1..].join(".")
    } else {
        host.to_string()
    };
    if let Some(port) = url.port() {
        canonical_host = format!("{}:{}", canonical_host, port);
    }

    LocaleInfo {
        has_locale: locale.is_some(),
        locale: locale.as_ref().map(Locale::tag),
        language: locale.as_ref().map(|l| l.language.clone()),
        country: locale.and_then(|l| l.country),
        canonical_path: path,
        canonical_host,
    }
}
