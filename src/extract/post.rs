//! Post-processor pipeline
//!
//! Extracted strings are folded through an ordered list of transforms.
//! A failing transform logs a warning and passes the current value through
//! unchanged, so one bad pattern never destroys a field.

use crate::extract::custom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single text transform in a rule's post-processing chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostProcessor {
    Trim,
    UpperCase,
    LowerCase,
    /// Regex replacement of every match of `pattern` with `replacement`
    Replace { pattern: String, replacement: String },
    /// Keeps group `group` of the first match of `pattern`; the whole match
    /// when `group` is 0 or out of range; the input on no match
    Extract { pattern: String, group: usize },
    /// Character-indexed substring, clamped to the value's bounds
    Substring { start: usize, end: Option<usize> },
    /// Dispatches to a registered custom processor by id
    Custom {
        id: String,
        #[serde(default)]
        config: HashMap<String, String>,
    },
}

impl PostProcessor {
    /// Applies this transform to a value
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The transformed value
    /// * `Err(String)` - Why the transform failed; the caller keeps the
    ///   current value
    pub fn apply(&self, input: &str) -> Result<String, String> {
        match self {
            PostProcessor::Trim => Ok(input.trim().to_string()),
            PostProcessor::UpperCase => Ok(input.to_uppercase()),
            PostProcessor::LowerCase => Ok(input.to_lowercase()),
            PostProcessor::Replace {
                pattern,
                replacement,
            } => {
                let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {}", e))?;
                Ok(re.replace_all(input, replacement.as_str()).into_owned())
            }
            PostProcessor::Extract { pattern, group } => {
                let re = Regex::new(pattern).map_err(|e| format!("invalid pattern: {}", e))?;
                match re.captures(input) {
                    Some(caps) => {
                        let matched = if *group > 0 {
                            caps.get(*group).or_else(|| caps.get(0))
                        } else {
                            caps.get(0)
                        };
                        Ok(matched
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_else(|| input.to_string()))
                    }
                    None => Ok(input.to_string()),
                }
            }
            PostProcessor::Substring { start, end } => {
                let chars: Vec<char> = input.chars().collect();
                let len = chars.len();
                let from = (*start).min(len);
                let to = end.unwrap_or(len).min(len);
                if from >= to {
                    return Ok(String::new());
                }
                Ok(chars[from..to].iter().collect())
            }
            PostProcessor::Custom { id, config } => custom::dispatch(id, input, config),
        }
    }
}

/// Folds a processor chain left-to-right over a value
///
/// Failures are logged and leave the value as it was before the failing
/// step.
pub fn apply_chain(processors: &[PostProcessor], input: &str) -> String {
    let mut value = input.to_string();
    for processor in processors {
        match processor.apply(&value) {
            Ok(next) => value = next,
            Err(reason) => {
                tracing::warn!("Post-processor {:?} failed: {}", processor, reason);
            }
        }
    }
    value
}
