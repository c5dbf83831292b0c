//! Built-in custom post-processors
//!
//! Custom processors are looked up by id and receive the current value plus
//! the rule's configuration map. The built-ins cover the common cleanups:
//! URL stripping, whitespace and typography normalisation, number
//! extraction, and tag removal.

use regex::Regex;
use std::collections::HashMap;
use url::Url;

/// Dispatches to a built-in custom processor by id
///
/// # Returns
///
/// * `Ok(String)` - The transformed value
/// * `Err(String)` - Unknown id or a processor-level failure
pub fn dispatch(id: &str, input: &str, config: &HashMap<String, String>) -> Result<String, String> {
    match id {
        "clean_url" => clean_url(input, config),
        "normalize_text" => Ok(normalize_text(input)),
        "extract_number" => extract_number(input, config),
        "strip_html" => Ok(strip_html(input)),
        "normalize_whitespace" => Ok(normalize_whitespace(input)),
        other => Err(format!("unknown custom processor '{}'", other)),
    }
}

/// Strips the query string except for the keys listed in `config["keep"]`
/// (comma-separated); also drops the fragment
fn clean_url(input: &str, config: &HashMap<String, String>) -> Result<String, String> {
    let mut parsed = Url::parse(input).map_err(|e| format!("not a URL: {}", e))?;

    let keep: Vec<String> = config
        .get("keep")
        .map(|v| v.split(',').map(|k| k.trim().to_string()).collect())
        .unwrap_or_default();

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| keep.iter().any(|allowed| allowed == k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed.set_fragment(None);
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query: Vec<String> = kept.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        parsed.set_query(Some(&query.join("&")));
    }

    Ok(parsed.to_string())
}

/// Collapses whitespace and normalises smart quotes and ellipsis
fn normalize_text(input: &str) -> String {
    let collapsed = normalize_whitespace(input);
    collapsed
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2026}', "...")
}

/// Returns the first number matched in the value
///
/// The pattern defaults to `\d+(\.\d+)?` and can be overridden through
/// `config["pattern"]`.
fn extract_number(input: &str, config: &HashMap<String, String>) -> Result<String, String> {
    let pattern = config
        .get("pattern")
        .map(String::as_str)
        .unwrap_or(r"\d+(\.\d+)?");
    let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {}", e))?;
    Ok(re
        .find(input)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| input.to_string()))
}

/// Removes HTML tags from the value
fn strip_html(input: &str) -> String {
    // Tags only; entities are left alone.
    let re = Regex::new(r"<[^>]*>").expect("static pattern");
    re.replace_all(input, "").into_owned()
}

/// Collapses runs of whitespace into single spaces and trims
fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
