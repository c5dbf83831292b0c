//! URL utilities
//!
//! This module provides the small URL helpers the crawl pipeline relies on:
//! - Extracting the lower-cased host and path from a URL
//! - Testing whether two URLs share the same host
//! - Testing whether a string is a valid HTTP(S) URL

mod host;

pub use host::{authority_of, host_of, is_valid_http_url, path_of, same_host};
