use crate::config::types::{BlockDetectorConfig, Config, CrawlerConfig, EngineConfig};
use crate::dedup::is_language_code;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent(&config.user_agent.crawler_name, &config.user_agent.contact_url)?;
    validate_engine_config(&config.engine)?;
    validate_block_detector(&config.block_detector)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.rate_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit must be >= 1, got {}",
            config.rate_limit
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.timeout_ms < 100 || config.idle_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 100ms, got timeout-ms={} idle-timeout-ms={}",
            config.timeout_ms, config.idle_timeout_ms
        )));
    }

    for pattern in [&config.include_pattern, &config.exclude_pattern]
        .into_iter()
        .flatten()
    {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("'{}' is not a valid regex: {}", pattern, e))
        })?;
    }

    let language = config.preferred_language.to_ascii_lowercase();
    if !is_language_code(&language) {
        return Err(ConfigError::Validation(format!(
            "preferred-language must be an ISO-639-1 code, got '{}'",
            config.preferred_language
        )));
    }

    Ok(())
}

/// Validates user agent identification
fn validate_user_agent(name: &str, contact_url: &Option<String>) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            name
        )));
    }

    if let Some(contact) = contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

/// Validates strategy timeouts and the protected host list
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    for (name, ms) in [
        ("fast-timeout-ms", config.fast_timeout_ms),
        ("browser-timeout-ms", config.browser_timeout_ms),
        ("stealth-timeout-ms", config.stealth_timeout_ms),
    ] {
        if ms < 100 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 100ms, got {}ms",
                name, ms
            )));
        }
    }

    if let Some(command) = &config.install_command {
        if command.is_empty() {
            return Err(ConfigError::Validation(
                "install-command cannot be an empty list".to_string(),
            ));
        }
    }

    for pattern in &config.protected_domains {
        let host = pattern.strip_prefix("*.").unwrap_or(pattern);
        if host.is_empty() || host.contains('/') || host.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidPattern(format!(
                "protected domain '{}' is not a host pattern",
                pattern
            )));
        }
    }

    Ok(())
}

/// Confidences must be probabilities
fn validate_block_detector(config: &BlockDetectorConfig) -> Result<(), ConfigError> {
    let confidences = [
        config.forbidden_confidence,
        config.rate_limit_confidence,
        config.challenge_confidence,
        config.empty_body_confidence,
        config.captcha_confidence,
        config.access_denied_confidence,
        config.javascript_confidence,
    ];

    if confidences.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err(ConfigError::Validation(
            "block-detector confidences must lie within 0..=1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.concurrency = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_bad_regex() {
        let mut config = Config::default();
        config.crawler.exclude_pattern = Some("[".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_language() {
        let mut config = Config::default();
        config.crawler.preferred_language = "english".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_crawler_name_with_spaces() {
        assert!(validate_user_agent("My Bot", &None).is_err());
        assert!(validate_user_agent("My-Bot", &None).is_ok());
        assert!(validate_user_agent("Bot", &Some("not a url".to_string())).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let mut config = Config::default();
        config.block_detector.captcha_confidence = 1.5;
        assert!(validate(&config).is_err());
    }
}
