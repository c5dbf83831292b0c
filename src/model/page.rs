use crate::model::ExtractedValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// An image discovered on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Absolute image URL
    pub url: String,
    /// Alternative text, if present
    pub alt: Option<String>,
    /// Declared width, if present
    pub width: Option<u32>,
    /// Declared height, if present
    pub height: Option<u32>,
}

/// Response-level metadata for a fetched page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    /// HTTP status code of the final response
    pub status_code: Option<u16>,

    /// The `content-type` header value
    pub content_type: Option<String>,

    /// Body size in bytes
    pub content_length: usize,

    /// Response headers with lower-cased names
    pub headers: HashMap<String, Vec<String>>,

    /// Character set declared by the document, if any
    pub charset: Option<String>,

    /// Language declared by the document, if any
    pub language: Option<String>,
}

/// The structured product of a successfully crawled page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPage {
    /// Final URL after redirects
    pub url: String,

    /// Page title, if one was found
    pub title: Option<String>,

    /// Raw HTML body
    pub content: String,

    /// Extracted fields, keyed by rule name
    pub extracted_data: HashMap<String, ExtractedValue>,

    /// Outbound links: deduped, absolute, HTTP(S), asset-filtered
    pub links: BTreeSet<String>,

    /// Images discovered on the page
    pub images: Vec<ImageRef>,

    /// Response metadata
    pub metadata: PageMetadata,

    /// Identity of the request that produced this page
    pub request_id: String,

    /// Depth of the request that produced this page
    pub depth: u32,

    /// Source name of the request that produced this page, if any
    pub source: Option<String>,

    /// Download duration in milliseconds
    pub response_time_ms: u64,

    /// When the crawl of this page completed
    pub fetched_at: DateTime<Utc>,
}
