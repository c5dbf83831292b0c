use crate::extract::PostProcessor;
use serde::{Deserialize, Serialize};

/// How a rule locates content within a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector, e.g. `article h1`
    Css { query: String },
    /// XPath expression; declared but unsupported (rejected at validation)
    XPath { query: String },
    /// Regular expression over the document text
    Regex { pattern: String, group: usize },
    /// Dotted-path descent into a JSON document, e.g. `$.items.0.name`
    JsonPath { path: String },
}

/// What a rule pulls out of a matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionType {
    Text,
    Html,
    Attribute,
    Link,
    ImageSrc,
    Json,
}

/// A named extraction rule
///
/// A rule pairs a selector with an extraction type and an ordered chain of
/// post-processors. `required` rules always produce a field (empty on zero
/// matches); `multiple` rules collect every match into a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Field name in the extracted data map
    pub name: String,

    /// Where to look
    pub selector: Selector,

    /// What to pull out
    pub extraction_type: ExtractionType,

    /// Transforms applied left-to-right to each extracted string
    #[serde(default)]
    pub post_processors: Vec<PostProcessor>,

    /// Whether the field is always present in the output map
    #[serde(default)]
    pub required: bool,

    /// Whether every match is collected instead of just the first
    #[serde(default)]
    pub multiple: bool,
}

impl ExtractionRule {
    /// Creates a CSS text-extraction rule
    pub fn text(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: Selector::Css {
                query: query.into(),
            },
            extraction_type: ExtractionType::Text,
            post_processors: Vec::new(),
            required: false,
            multiple: false,
        }
    }

    /// Creates a CSS link-extraction rule (resolved absolute `href`)
    pub fn link(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: Selector::Css {
                query: query.into(),
            },
            extraction_type: ExtractionType::Link,
            post_processors: Vec::new(),
            required: false,
            multiple: false,
        }
    }

    /// Creates a regex rule over the document text
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>, group: usize) -> Self {
        Self {
            name: name.into(),
            selector: Selector::Regex {
                pattern: pattern.into(),
                group,
            },
            extraction_type: ExtractionType::Text,
            post_processors: Vec::new(),
            required: false,
            multiple: false,
        }
    }

    /// Creates a JSON dotted-path rule
    pub fn json_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: Selector::JsonPath { path: path.into() },
            extraction_type: ExtractionType::Json,
            post_processors: Vec::new(),
            required: false,
            multiple: false,
        }
    }

    /// Marks the rule as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the rule as collecting every match
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Appends a post-processor to the chain
    pub fn with_processor(mut self, processor: PostProcessor) -> Self {
        self.post_processors.push(processor);
        self
    }
}
