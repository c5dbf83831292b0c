use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value extracted from a page
///
/// Serialises as a plain JSON value: `Text` as a string, `List` as an
/// array, `Map` as an object, and `Null` as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ExtractedValue>),
    Map(HashMap<String, ExtractedValue>),
}

impl ExtractedValue {
    /// Returns the contained text, if this is a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExtractedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the contained list, if this is a `List` value
    pub fn as_list(&self) -> Option<&[ExtractedValue]> {
        match self {
            ExtractedValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for `Null`, empty `Text`, and empty `List`
    pub fn is_empty(&self) -> bool {
        match self {
            ExtractedValue::Null => true,
            ExtractedValue::Text(s) => s.is_empty(),
            ExtractedValue::List(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl From<String> for ExtractedValue {
    fn from(s: String) -> Self {
        ExtractedValue::Text(s)
    }
}

impl From<&str> for ExtractedValue {
    fn from(s: &str) -> Self {
        ExtractedValue::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_text() {
        assert_eq!(ExtractedValue::Text("hi".into()).as_text(), Some("hi"));
        assert_eq!(ExtractedValue::Number(1.0).as_text(), None);
    }

    #[test]
    fn test_is_empty() {
        assert!(ExtractedValue::Null.is_empty());
        assert!(ExtractedValue::Text(String::new()).is_empty());
        assert!(ExtractedValue::List(vec![]).is_empty());
        assert!(!ExtractedValue::Text("x".into()).is_empty());
        assert!(!ExtractedValue::Bool(false).is_empty());
    }

    #[test]
    fn test_serialises_as_plain_json() {
        let value = ExtractedValue::List(vec![
            ExtractedValue::Text("a".into()),
            ExtractedValue::Number(2.5),
            ExtractedValue::Null,
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["a",2.5,null]"#);
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut map = HashMap::new();
        map.insert("title".to_string(), ExtractedValue::Text("Hi".into()));
        let value = ExtractedValue::Map(map);

        let json = serde_json::to_string(&value).unwrap();
        let back: ExtractedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
