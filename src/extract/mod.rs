//! Extraction engine
//!
//! Turns fetched content plus a list of extraction rules into a structured
//! field map, and provides the page-level extractors for links, images,
//! and metadata. Content is routed by content type:
//! - contains `"html"` → parsed as HTML, all selector kinds dispatch
//! - contains `"json"` → parsed as JSON, dotted-path and regex rules fire
//! - anything else → treated as text, only regex rules fire

pub(crate) mod custom;
pub(crate) mod html;
pub(crate) mod json;
mod post;
mod rule;

pub use post::{apply_chain, PostProcessor};
pub use rule::{ExtractionRule, ExtractionType, Selector};

use crate::model::{ExtractedValue, ImageRef};
use scraper::Html;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use url::Url;

/// Hard extraction failures
///
/// Per-rule problems degrade to empty or skipped fields; only a document
/// that cannot be parsed at all surfaces as an error.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Applies a list of extraction rules to fetched content
///
/// # Arguments
///
/// * `content` - The response body
/// * `content_type` - The response `content-type`, used for routing
/// * `rules` - The rules to apply
/// * `base_url` - Base URL for resolving relative links
///
/// # Returns
///
/// * `Ok(map)` - Field name to extracted value; optional rules with no
///   match are absent, required rules are always present
/// * `Err(ExtractError)` - The document could not be parsed at all
pub fn extract_data(
    content: &str,
    content_type: &str,
    rules: &[ExtractionRule],
    base_url: &Url,
) -> Result<HashMap<String, ExtractedValue>, ExtractError> {
    if rules.is_empty() {
        return Ok(HashMap::new());
    }

    let lowered = content_type.to_lowercase();
    if lowered.contains("html") {
        Ok(extract_from_html(content, rules, base_url))
    } else if lowered.contains("json") {
        extract_from_json(content, rules)
    } else {
        Ok(extract_from_text(content, rules))
    }
}

fn extract_from_html(
    content: &str,
    rules: &[ExtractionRule],
    base_url: &Url,
) -> HashMap<String, ExtractedValue> {
    let document = Html::parse_document(content);
    let text = html::rendered_text(&document);

    let mut fields = HashMap::new();
    for rule in rules {
        if let Some(value) = html::apply_rule(&document, &text, rule, base_url) {
            fields.insert(rule.name.clone(), value);
        }
    }
    fields
}

fn extract_from_json(
    content: &str,
    rules: &[ExtractionRule],
) -> Result<HashMap<String, ExtractedValue>, ExtractError> {
    let root: serde_json::Value = serde_json::from_str(content)?;

    let mut fields = HashMap::new();
    for rule in rules {
        let value = match &rule.selector {
            Selector::JsonPath { .. } => json::apply_rule(&root, rule),
            Selector::Regex { pattern, group } => {
                html::apply_regex_rule(content, pattern, *group, rule)
            }
            _ => {
                tracing::warn!(
                    "Selector {:?} is not applicable to JSON content; skipping rule '{}'",
                    rule.selector,
                    rule.name
                );
                rule.required.then(|| html::empty_value(rule))
            }
        };
        if let Some(value) = value {
            fields.insert(rule.name.clone(), value);
        }
    }
    Ok(fields)
}

fn extract_from_text(content: &str, rules: &[ExtractionRule]) -> HashMap<String, ExtractedValue> {
    let mut fields = HashMap::new();
    for rule in rules {
        let value = match &rule.selector {
            Selector::Regex { pattern, group } => {
                html::apply_regex_rule(content, pattern, *group, rule)
            }
            _ => rule.required.then(|| html::empty_value(rule)),
        };
        if let Some(value) = value {
            fields.insert(rule.name.clone(), value);
        }
    }
    fields
}

/// Extracts outbound links from HTML content
///
/// Returns deduped absolute HTTP(S) URLs that pass the asset denylist.
pub fn extract_links(content: &str, base_url: &Url) -> BTreeSet<String> {
    let document = Html::parse_document(content);
    html::extract_links(&document, base_url)
}

/// Extracts images from HTML content
pub fn extract_images(content: &str, base_url: &Url) -> Vec<ImageRef> {
    let document = Html::parse_document(content);
    html::extract_images(&document, base_url)
}

/// Extracts document metadata (title, meta tags, charset, language)
pub fn extract_metadata(content: &str) -> HashMap<String, String> {
    let document = Html::parse_document(content);
    html::extract_metadata(&document)
}
