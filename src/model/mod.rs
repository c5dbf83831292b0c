//! Core data model
//!
//! This module defines the types that flow through the crawl engine:
//! - [`CrawlRequest`] and [`CrawlPolicy`] describe what to crawl and how
//! - [`WebPage`] is the structured product of a successful crawl
//! - [`CrawlResult`] wraps a request's outcome, status, and metrics
//! - [`ExtractedValue`] is the value type of the extracted field map

mod page;
mod request;
mod result;
mod value;

pub use page::{ImageRef, PageMetadata, WebPage};
pub use request::{
    CrawlPolicy, CrawlRequest, Priority, META_RETRY_AFTER, META_RETRY_COUNT, META_SOURCE,
};
pub use result::{CrawlMetrics, CrawlResult, CrawlStatus};
pub use value::ExtractedValue;
