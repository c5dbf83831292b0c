use crate::config::types::CrawlerConfig;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(CrawlerConfig)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to read, parse, or validate
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use inkcrawl::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Sources: {}", config.sources.len());
/// ```
pub fn load_config(path: &Path) -> Result<CrawlerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: CrawlerConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Parses a configuration from a TOML string
pub fn parse_config(content: &str) -> Result<CrawlerConfig, ConfigError> {
    let config: CrawlerConfig = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}
