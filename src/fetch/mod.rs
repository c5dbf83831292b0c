//! HTTP fetching
//!
//! The engine consumes fetching through the [`Fetcher`] trait so tests can
//! substitute doubles. [`HttpFetcher`] is the reqwest-backed implementation.
//! Redirects are followed manually so each request's own policy controls
//! `follow_redirects` and `max_redirects`, the same way user agent, extra
//! headers, and the timeout come from the request's policy.

use crate::model::CrawlRequest;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

/// The outcome of fetching one URL
///
/// Header names are normalised to lower case. `error` is set for transport
/// failures; `timed_out` distinguishes deadline expiry from other network
/// errors.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code, when a response was received
    pub status_code: Option<u16>,

    /// Response body, when one was read
    pub body: Option<String>,

    /// Response headers with lower-cased names
    pub headers: HashMap<String, Vec<String>>,

    /// Whether the response had a 2xx status
    pub is_successful: bool,

    /// Transport error description, if the fetch failed
    pub error: Option<String>,

    /// Whether the failure was a timeout
    pub timed_out: bool,
}

impl FetchResponse {
    /// Returns the first value of a header, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Builds a transport-failure response
    fn failure(url: String, error: String) -> Self {
        Self {
            url,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// HTTP fetching seam consumed by the page pipeline
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the request's URL under its policy
    async fn fetch(&self, request: &CrawlRequest) -> FetchResponse;
}

/// Tracks the URLs visited while following redirects manually
///
/// Detects loops through the visited set and enforces the per-request
/// redirect cap.
#[derive(Debug)]
struct RedirectChain {
    max_redirects: u32,
    visited: HashSet<String>,
}

impl RedirectChain {
    fn new(max_redirects: u32) -> Self {
        Self {
            max_redirects,
            visited: HashSet::new(),
        }
    }

    /// Adds a URL to the chain; `false` means it was already visited
    fn add_url(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Checks whether following one more redirect would exceed the cap
    fn is_too_long(&self) -> bool {
        self.visited.len() > self.max_redirects as usize
    }
}

/// Reqwest-backed fetcher
///
/// The client is built with automatic redirects disabled; redirect
/// following happens in [`Fetcher::fetch`] under each request's policy.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher
    pub fn new() -> crate::Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &CrawlRequest) -> FetchResponse {
        let policy = &request.policy;
        let mut chain = RedirectChain::new(policy.max_redirects);
        let mut url = request.url.clone();

        loop {
            if !chain.add_url(&url) {
                return FetchResponse::failure(
                    url.clone(),
                    format!("Redirect loop detected at {}", url),
                );
            }

            let mut builder = self
                .client
                .get(&url)
                .header(reqwest::header::USER_AGENT, policy.user_agent.clone())
                .timeout(Duration::from_millis(policy.timeout_ms));
            for (name, value) in &policy.headers {
                builder = builder.header(name, value);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_redirection() && policy.follow_redirects {
                        if chain.is_too_long() {
                            return FetchResponse::failure(
                                url,
                                format!("Too many redirects (max {})", policy.max_redirects),
                            );
                        }
                        match redirect_target(&response, &url) {
                            Some(next) => {
                                tracing::debug!("Following redirect from {} to {}", url, next);
                                url = next;
                                continue;
                            }
                            None => {
                                return FetchResponse::failure(
                                    url,
                                    "Redirect response without a usable Location header"
                                        .to_string(),
                                );
                            }
                        }
                    }

                    // A 3xx with redirects disabled falls through here and
                    // surfaces as an unsuccessful response.
                    return read_response(response).await;
                }
                Err(e) => {
                    tracing::debug!("Fetch failed for {}: {}", url, e);
                    return FetchResponse {
                        url,
                        status_code: e.status().map(|s| s.as_u16()),
                        body: None,
                        headers: HashMap::new(),
                        is_successful: false,
                        error: Some(e.to_string()),
                        timed_out: e.is_timeout(),
                    };
                }
            }
        }
    }
}

/// Resolves the `Location` header of a redirect response against its URL
fn redirect_target(response: &reqwest::Response, current_url: &str) -> Option<String> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?
        .trim();
    if location.is_empty() {
        return None;
    }

    let next = if location.starts_with("http://") || location.starts_with("https://") {
        Url::parse(location).ok()?
    } else {
        Url::parse(current_url).ok()?.join(location).ok()?
    };

    if next.scheme() == "http" || next.scheme() == "https" {
        Some(next.to_string())
    } else {
        None
    }
}

/// Collects a terminal response into the fetch contract shape
async fn read_response(response: reqwest::Response) -> FetchResponse {
    let status = response.status();
    let final_url = response.url().to_string();

    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_lowercase())
                .or_default()
                .push(value.to_string());
        }
    }

    match response.text().await {
        Ok(body) => FetchResponse {
            url: final_url,
            status_code: Some(status.as_u16()),
            body: Some(body),
            headers,
            is_successful: status.is_success(),
            error: None,
            timed_out: false,
        },
        Err(e) => FetchResponse {
            url: final_url,
            status_code: Some(status.as_u16()),
            body: None,
            headers,
            is_successful: false,
            error: Some(format!("Failed to read response body: {}", e)),
            timed_out: e.is_timeout(),
        },
    }
}
