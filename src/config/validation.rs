use crate::config::types::{CrawlerConfig, SourceConfig};
use crate::extract::{ExtractionRule, PostProcessor, Selector};
use crate::url::is_valid_http_url;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "configuration name cannot be empty".to_string(),
        ));
    }

    if config.max_concurrency < 1 || config.max_concurrency > 1000 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 1000, got {}",
            config.max_concurrency
        )));
    }

    validate_rules(&config.default_rules)?;
    for source in &config.sources {
        validate_source(source)?;
    }

    Ok(())
}

/// Validates one source entry
fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if source.seed_urls.is_empty() {
        return Err(ConfigError::Validation(format!(
            "source '{}' has no seed URLs",
            source.name
        )));
    }

    for seed in &source.seed_urls {
        if !is_valid_http_url(seed) {
            return Err(ConfigError::InvalidUrl(seed.clone()));
        }
    }

    validate_rules(&source.rules)
}

/// Validates extraction rules
///
/// XPath selectors fail fast here; the engine would only warn-and-skip
/// them at crawl time. Regex patterns and CSS queries must compile, and
/// post-processor patterns are checked the same way.
fn validate_rules(rules: &[ExtractionRule]) -> Result<(), ConfigError> {
    for rule in rules {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extraction rule name cannot be empty".to_string(),
            ));
        }

        match &rule.selector {
            Selector::XPath { query } => {
                return Err(ConfigError::Validation(format!(
                    "rule '{}' uses an XPath selector ('{}'), which is not supported",
                    rule.name, query
                )));
            }
            Selector::Css { query } => {
                if scraper::Selector::parse(query).is_err() {
                    return Err(ConfigError::Validation(format!(
                        "rule '{}' has an invalid CSS selector: '{}'",
                        rule.name, query
                    )));
                }
            }
            Selector::Regex { pattern, .. } => {
                if let Err(e) = regex::Regex::new(pattern) {
                    return Err(ConfigError::Validation(format!(
                        "rule '{}' has an invalid regex: {}",
                        rule.name, e
                    )));
                }
            }
            Selector::JsonPath { path } => {
                if path.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "rule '{}' has an empty JSON path",
                        rule.name
                    )));
                }
            }
        }

        for processor in &rule.post_processors {
            validate_processor(&rule.name, processor)?;
        }
    }

    Ok(())
}

/// Validates one post-processor entry
fn validate_processor(rule_name: &str, processor: &PostProcessor) -> Result<(), ConfigError> {
    match processor {
        PostProcessor::Replace { pattern, .. } | PostProcessor::Extract { pattern, .. } => {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "rule '{}' has a post-processor with an invalid regex: {}",
                    rule_name, e
                )));
            }
        }
        PostProcessor::Substring { start, end } => {
            if let Some(end) = end {
                if end < start {
                    return Err(ConfigError::Validation(format!(
                        "rule '{}' has a substring with end {} before start {}",
                        rule_name, end, start
                    )));
                }
            }
        }
        _ => {}
    }
    Ok(())
}
