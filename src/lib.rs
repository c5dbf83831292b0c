//! Inkcrawl: a declarative concurrent web crawler library
//!
//! This crate implements a crawl engine that accepts a declarative
//! configuration (sources, seed URLs, extraction rules, crawl policies),
//! fetches pages while respecting robots.txt and per-domain politeness,
//! extracts structured fields from each page, discovers further links up to
//! a configured depth, and streams results to the caller as they complete.

pub mod config;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod limiter;
pub mod model;
pub mod pipeline;
pub mod robots;
pub mod sink;
pub mod url;

use thiserror::Error;

/// Main error type for inkcrawl operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Engine is not running")]
    NotRunning,

    #[error("Engine has been stopped; create a new instance to crawl again")]
    Stopped,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for inkcrawl operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{CrawlerConfig, SourceConfig};
pub use engine::{CrawlEngine, EngineConfig, EngineStatsSnapshot};
pub use extract::{ExtractionRule, ExtractionType, PostProcessor, Selector};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use model::{
    CrawlMetrics, CrawlPolicy, CrawlRequest, CrawlResult, CrawlStatus, ExtractedValue, Priority,
    WebPage,
};
pub use sink::{MemorySink, ResultSink};
