//! JSON extraction
//!
//! Rules with a dotted-path selector descend into a parsed JSON document:
//! trim a leading `$`, split on `.`, and at each step descend into an
//! object key or array index, aborting on a miss.

use crate::extract::html::wrap_values;
use crate::extract::post::apply_chain;
use crate::extract::{ExtractionRule, Selector};
use crate::model::ExtractedValue;
use serde_json::Value;

/// Applies one dotted-path rule to a parsed JSON document
///
/// # Returns
///
/// * `Some(value)` - The extracted field value
/// * `None` - Path miss on a non-required rule
pub fn apply_rule(root: &Value, rule: &ExtractionRule) -> Option<ExtractedValue> {
    let path = match &rule.selector {
        Selector::JsonPath { path } => path,
        _ => return None,
    };

    match descend(root, path) {
        Some(node) => Some(convert(node, rule)),
        None => rule.required.then(|| super::html::empty_value(rule)),
    }
}

/// Walks the dotted path from the root, returning the target node
fn descend<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.trim_start_matches('$').trim_start_matches('.');
    if trimmed.is_empty() {
        return Some(root);
    }

    let mut current = root;
    for step in trimmed.split('.') {
        current = match current {
            Value::Object(map) => map.get(step)?,
            Value::Array(items) => {
                let index: usize = step.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Converts a JSON node into an [`ExtractedValue`] per the rule's flags
fn convert(node: &Value, rule: &ExtractionRule) -> ExtractedValue {
    match node {
        Value::Null => ExtractedValue::Null,
        Value::Array(items) => {
            if rule.multiple {
                let values: Vec<String> = items.iter().map(stringify).collect();
                wrap_values(values, rule).unwrap_or(ExtractedValue::List(Vec::new()))
            } else {
                match items.first() {
                    Some(first) => convert(first, rule),
                    None => super::html::empty_value(rule),
                }
            }
        }
        Value::Object(_) => {
            let serialized = node.to_string();
            ExtractedValue::Text(apply_chain(&rule.post_processors, &serialized))
        }
        primitive => {
            let text = stringify(primitive);
            ExtractedValue::Text(apply_chain(&rule.post_processors, &text))
        }
    }
}

/// Stringifies a JSON node the way a template would render it
fn stringify(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
