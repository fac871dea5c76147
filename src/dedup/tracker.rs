use crate::dedup::extract_locale;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use url::Url;

/// Similarity at or above which two pages count as near-duplicates
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

const FINGERPRINT_SAMPLE_THRESHOLD: usize = 500;
const FINGERPRINT_SAMPLE_LENGTH: usize = 300;

/// Outcome of [`DedupTracker::should_skip`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    pub skip: bool,

    /// `locale:<tag>` when a locale variant was suppressed
    pub reason: Option<String>,
}

impl SkipDecision {
    fn accept() -> Self {
        Self {
            skip: false,
            reason: None,
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            skip: true,
            reason: Some(reason),
        }
    }
}

/// Outcome of [`DedupTracker::check_content_similarity`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub duplicate: bool,

    /// Best Jaccard score against any stored page
    pub score: f64,

    /// Page with the best score
    pub similar_to: Option<String>,
}

#[derive(Debug, Clone)]
struct Representative {
    url: String,
    language: Option<String>,
}

/// Suppresses locale variants and near-duplicate content within one crawl
///
/// Every locale variant of a page shares a canonical key (host plus
/// locale-free path). One representative URL is kept per key. A variant in
/// the preferred language takes over from a representative that is not.
#[derive(Debug)]
pub struct DedupTracker {
    preferred_language: String,
    representatives: Mutex<HashMap<String, Representative>>,
    fingerprints: Mutex<Vec<(String, HashSet<String>)>>,
}

impl DedupTracker {
    pub fn new(preferred_language: &str) -> Self {
        Self {
            preferred_language: preferred_language.to_ascii_lowercase(),
            representatives: Mutex::new(HashMap::new()),
            fingerprints: Mutex::new(Vec::new()),
        }
    }

    pub fn preferred_language(&self) -> &str {
        &self.preferred_language
    }

    /// Decides whether a URL is a redundant locale variant
    ///
    /// URLs without a locale are always accepted. They still claim their
    /// key, so a later preferred-language variant replaces them while other
    /// variants are rejected.
    ///
    /// # Arguments
    ///
    /// * `url` - Normalized absolute URL
    ///
    /// # Returns
    ///
    /// A [`SkipDecision`] whose `reason` reads `locale:<tag>` when skipped.
    pub fn should_skip(&self, url: &str) -> SkipDecision {
        let Ok(parsed) = Url::parse(url) else {
            return SkipDecision::reject("invalid-url".to_string());
        };

        let info = extract_locale(&parsed);
        let key = info.canonical_key();

        let Ok(mut representatives) = self.representatives.lock() else {
            return SkipDecision::accept();
        };

        let Some(existing) = representatives.get(&key) else {
            representatives.insert(
                key,
                Representative {
                    url: url.to_string(),
                    language: info.language,
                },
            );
            return SkipDecision::accept();
        };

        if existing.url == url {
            return SkipDecision::accept();
        }

        let Some(locale) = info.locale else {
            return SkipDecision::accept();
        };

        let incoming_preferred = info.language.as_deref() == Some(self.preferred_language.as_str());
        let existing_preferred =
            existing.language.as_deref() == Some(self.preferred_language.as_str());

        if incoming_preferred && !existing_preferred {
            tracing::debug!(
                "Preferred locale {} replaces {} as representative of {}",
                url,
                existing.url,
                key
            );
            representatives.insert(
                key,
                Representative {
                    url: url.to_string(),
                    language: info.language,
                },
            );
            return SkipDecision::accept();
        }

        SkipDecision::reject(format!("locale:{}", locale))
    }

    /// Current representative URL for the canonical key of `url`
    pub fn representative(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let key = extract_locale(&parsed).canonical_key();
        self.representatives
            .lock()
            .ok()?
            .get(&key)
            .map(|r| r.url.clone())
    }

    /// Compares page text against every page seen so far
    ///
    /// Pages that are not duplicates are remembered for later comparisons.
    pub fn check_content_similarity(
        &self,
        url: &str,
        content: &str,
        threshold: f64,
    ) -> SimilarityMatch {
        let words = word_set(&fingerprint(content));

        let Ok(mut fingerprints) = self.fingerprints.lock() else {
            return SimilarityMatch {
                duplicate: false,
                score: 0.0,
                similar_to: None,
            };
        };

        let mut best: Option<(f64, &str)> = None;
        for (seen_url, seen_words) in fingerprints.iter() {
            let score = jaccard(&words, seen_words);
            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, seen_url.as_str()));
            }
        }

        let score = best.map(|(s, _)| s).unwrap_or(0.0);
        let similar_to = best.map(|(_, u)| u.to_string());
        let duplicate = best.is_some() && score >= threshold;

        if duplicate {
            tracing::debug!(
                "{} is a near-duplicate of {:?} (score {:.2})",
                url,
                similar_to,
                score
            );
        } else {
            fingerprints.push((url.to_string(), words));
        }

        SimilarityMatch {
            duplicate,
            score,
            similar_to,
        }
    }
}

/// Normalized text, sampled from the start, middle and end of long bodies
fn fingerprint(content: &str) -> String {
    let stripped: String = content
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() <= FINGERPRINT_SAMPLE_THRESHOLD {
        return normalized;
    }

    let n = FINGERPRINT_SAMPLE_LENGTH;
    let mid = chars.len() / 2;
    let middle_start = mid.saturating_sub(n / 2);

    let mut sample: String = chars[..n].iter().collect();
    sample.push(' ');
    sample.extend(&chars[middle_start..(middle_start + n).min(chars.len())]);
    sample.push(' ');
    sample.extend(&chars[chars.len() - n..]);
    sample
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
