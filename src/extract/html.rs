//! HTML extraction
//!
//! This module applies extraction rules to parsed HTML documents and
//! provides the page-level extractors the pipeline uses directly:
//! - Outbound link extraction with an asset denylist
//! - Image extraction including `srcset` entries
//! - Metadata extraction (title, meta tags, charset, language)

use crate::extract::post::apply_chain;
use crate::extract::{ExtractionRule, ExtractionType, Selector};
use crate::model::{ExtractedValue, ImageRef};
use regex::Regex;
use scraper::{ElementRef, Html, Selector as CssSelector};
use std::collections::{BTreeSet, HashMap};
use url::Url;

/// Substrings that mark a link as an asset rather than a crawlable page
const ASSET_DENYLIST: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".woff", ".woff2",
    ".ttf", ".eot", ".otf", ".pdf", ".zip", ".mp3", ".mp4", ".avi", ".mov", ".webm", "/static/",
    "/assets/", "/images/", "/_static/", "javascript:", "mailto:", "#",
];

/// Applies one rule to a parsed HTML document
///
/// # Arguments
///
/// * `document` - The parsed document
/// * `rendered_text` - The document's text content, for regex rules
/// * `rule` - The rule to apply
/// * `base_url` - Base URL for resolving `Link`/`ImageSrc` values
///
/// # Returns
///
/// * `Some(value)` - The extracted field value
/// * `None` - No match and the rule is not required
pub fn apply_rule(
    document: &Html,
    rendered_text: &str,
    rule: &ExtractionRule,
    base_url: &Url,
) -> Option<ExtractedValue> {
    match &rule.selector {
        Selector::Css { query } => apply_css_rule(document, query, rule, base_url),
        Selector::Regex { pattern, group } => {
            apply_regex_rule(rendered_text, pattern, *group, rule)
        }
        Selector::XPath { .. } => {
            tracing::warn!("XPath selectors are not supported; skipping rule '{}'", rule.name);
            None
        }
        Selector::JsonPath { .. } => {
            tracing::warn!(
                "JSON path selector on HTML content; skipping rule '{}'",
                rule.name
            );
            None
        }
    }
}

/// The empty value a required rule yields on zero matches
pub fn empty_value(rule: &ExtractionRule) -> ExtractedValue {
    if rule.multiple {
        ExtractedValue::List(Vec::new())
    } else {
        ExtractedValue::Text(String::new())
    }
}

fn apply_css_rule(
    document: &Html,
    query: &str,
    rule: &ExtractionRule,
    base_url: &Url,
) -> Option<ExtractedValue> {
    let selector = match CssSelector::parse(query) {
        Ok(selector) => selector,
        Err(_) => {
            tracing::warn!("Invalid CSS selector '{}' in rule '{}'", query, rule.name);
            return rule.required.then(|| empty_value(rule));
        }
    };

    let mut values = Vec::new();
    for element in document.select(&selector) {
        let raw = match element_value(&element, rule.extraction_type, base_url) {
            Some(raw) => raw,
            None => continue,
        };
        if raw.trim().is_empty() {
            continue;
        }
        values.push(apply_chain(&rule.post_processors, &raw));
        if !rule.multiple {
            break;
        }
    }

    wrap_values(values, rule)
}

pub(crate) fn apply_regex_rule(
    text: &str,
    pattern: &str,
    group: usize,
    rule: &ExtractionRule,
) -> Option<ExtractedValue> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("Invalid regex '{}' in rule '{}': {}", pattern, rule.name, e);
            return rule.required.then(|| empty_value(rule));
        }
    };

    let mut values = Vec::new();
    for caps in re.captures_iter(text) {
        let matched = if group > 0 {
            caps.get(group).or_else(|| caps.get(0))
        } else {
            caps.get(0)
        };
        if let Some(m) = matched {
            values.push(apply_chain(&rule.post_processors, m.as_str()));
        }
        if !rule.multiple {
            break;
        }
    }

    wrap_values(values, rule)
}

/// Wraps the collected strings per the rule's `multiple`/`required` flags
pub fn wrap_values(values: Vec<String>, rule: &ExtractionRule) -> Option<ExtractedValue> {
    if values.is_empty() {
        return rule.required.then(|| empty_value(rule));
    }
    if rule.multiple {
        Some(ExtractedValue::List(
            values.into_iter().map(ExtractedValue::Text).collect(),
        ))
    } else {
        Some(ExtractedValue::Text(values.into_iter().next().unwrap()))
    }
}

fn element_value(
    element: &ElementRef,
    extraction_type: ExtractionType,
    base_url: &Url,
) -> Option<String> {
    match extraction_type {
        ExtractionType::Text | ExtractionType::Json => {
            Some(element.text().collect::<String>().trim().to_string())
        }
        ExtractionType::Html => Some(element.inner_html()),
        ExtractionType::Attribute => element.value().attr("href").map(str::to_string),
        ExtractionType::Link => element
            .value()
            .attr("href")
            .and_then(|href| resolve(href, base_url)),
        ExtractionType::ImageSrc => element
            .value()
            .attr("src")
            .and_then(|src| resolve(src, base_url)),
    }
}

fn resolve(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

/// Checks a URL against the asset denylist
fn is_asset_url(url: &str) -> bool {
    let lowered = url.to_lowercase();
    ASSET_DENYLIST.iter().any(|token| lowered.contains(token))
}

/// Extracts outbound links from a document
///
/// Selects `a[href]`, resolves to absolute, and keeps HTTP(S) URLs that do
/// not match the asset denylist. The result is deduped.
pub fn extract_links(document: &Html, base_url: &Url) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    let selector = CssSelector::parse("a[href]").expect("static selector");

    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute) = resolve(href, base_url) {
                if !is_asset_url(&absolute) {
                    links.insert(absolute);
                }
            }
        }
    }

    links
}

/// Extracts images from a document
///
/// Selects `img[src]` with absolute resolution, carrying `alt` and declared
/// dimensions where present. `srcset` entries contribute additional URLs
/// (the first whitespace-delimited token of each comma-separated entry).
pub fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageRef> {
    let mut images = Vec::new();
    let mut seen = BTreeSet::new();
    let selector = CssSelector::parse("img").expect("static selector");

    for element in document.select(&selector) {
        let alt = element
            .value()
            .attr("alt")
            .map(str::to_string)
            .filter(|a| !a.is_empty());
        let width = element.value().attr("width").and_then(|w| w.parse().ok());
        let height = element.value().attr("height").and_then(|h| h.parse().ok());

        if let Some(src) = element.value().attr("src") {
            if let Some(url) = resolve(src, base_url) {
                if seen.insert(url.clone()) {
                    images.push(ImageRef {
                        url,
                        alt: alt.clone(),
                        width,
                        height,
                    });
                }
            }
        }

        if let Some(srcset) = element.value().attr("srcset") {
            for entry in srcset.split(',') {
                let candidate = entry.trim().split_whitespace().next().unwrap_or("");
                if let Some(url) = resolve(candidate, base_url) {
                    if seen.insert(url.clone()) {
                        images.push(ImageRef {
                            url,
                            alt: None,
                            width: None,
                            height: None,
                        });
                    }
                }
            }
        }
    }

    images
}

/// Extracts document metadata as a flat map
///
/// Contributes `title`, each `<meta>` with a non-blank `name` (falling back
/// to `property`) and non-blank `content`, `charset` from `<meta charset>`,
/// and `language` from `<html lang>`.
pub fn extract_metadata(document: &Html) -> HashMap<String, String> {
    let mut metadata = HashMap::new();

    let title_selector = CssSelector::parse("title").expect("static selector");
    if let Some(title) = document.select(&title_selector).next() {
        let text = title.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            metadata.insert("title".to_string(), text);
        }
    }

    let meta_selector = CssSelector::parse("meta").expect("static selector");
    for element in document.select(&meta_selector) {
        let attrs = element.value();

        if let Some(charset) = attrs.attr("charset") {
            if !charset.trim().is_empty() {
                metadata.insert("charset".to_string(), charset.trim().to_string());
            }
            continue;
        }

        let key = attrs
            .attr("name")
            .filter(|n| !n.trim().is_empty())
            .or_else(|| attrs.attr("property").filter(|p| !p.trim().is_empty()));
        let content = attrs.attr("content").filter(|c| !c.trim().is_empty());

        if let (Some(key), Some(content)) = (key, content) {
            metadata.insert(key.trim().to_string(), content.trim().to_string());
        }
    }

    let html_selector = CssSelector::parse("html").expect("static selector");
    if let Some(html) = document.select(&html_selector).next() {
        if let Some(lang) = html.value().attr("lang") {
            if !lang.trim().is_empty() {
                metadata.insert("language".to_string(), lang.trim().to_string());
            }
        }
    }

    metadata
}

/// Collects the document's rendered text for regex rules
pub fn rendered_text(document: &Html) -> String {
    document.root_element().text().collect::<Vec<_>>().join(" ")
}
