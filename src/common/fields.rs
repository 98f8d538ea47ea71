//! # Field Normalization
//!
//! The API is inconsistent about multi-value profile fields: `hobbies` and
//! `languages` arrive either as one comma-joined string or as a list of strings.
//! Everything downstream sees the list form. Any other shape reads as an empty
//! list so one odd field never fails the whole profile.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A multi-value field as it may appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ListValue {
    Items(Vec<String>),
    Text(String),
    /// Numbers, objects, lists holding non-strings
    Other(Value),
}

impl From<Vec<String>> for ListValue {
    fn from(items: Vec<String>) -> Self {
        ListValue::Items(items)
    }
}

impl From<&str> for ListValue {
    fn from(text: &str) -> Self {
        ListValue::Text(text.to_string())
    }
}

/// Normalize a multi-value field into an ordered list of strings.
///
/// - absent → empty list
/// - list → returned as-is
/// - string → split on `,`, each element trimmed; order and empty elements are
///   kept, no deduplication, no case folding
///
/// An empty string counts as absent. Of any other shape only the string
/// elements of a list survive; everything else is empty.
///
/// # Example
/// ```
/// use datemate_client::common::fields::{normalize_list, ListValue};
///
/// let list = normalize_list(Some(ListValue::from("a, b ,c")));
/// assert_eq!(list, vec!["a", "b", "c"]);
/// assert_eq!(normalize_list(Some(ListValue::from(list.clone()))), list);
/// ```
pub fn normalize_list(value: Option<ListValue>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(ListValue::Items(items)) => items,
        Some(ListValue::Text(text)) if text.is_empty() => Vec::new(),
        Some(ListValue::Text(text)) => text.split(',').map(|s| s.trim().to_string()).collect(),
        Some(ListValue::Other(Value::Array(items))) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        Some(ListValue::Other(_)) => Vec::new(),
    }
}

/// Serde adapter: accepts any JSON value and yields the normalized list.
///
/// Use together with `#[serde(default)]` so a missing field also becomes `[]`.
pub fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<ListValue>::deserialize(deserializer)?;
    Ok(normalize_list(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_empty() {
        assert!(normalize_list(None).is_empty());
        assert!(normalize_list(Some(ListValue::from(""))).is_empty());
    }

    #[test]
    fn test_string_is_split_and_trimmed() {
        assert_eq!(
            normalize_list(Some(ListValue::from("a, b ,c"))),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            normalize_list(Some(ListValue::from("Reading,,  Music"))),
            vec!["Reading", "", "Music"]
        );
        assert_eq!(
            normalize_list(Some(ListValue::from("Hiking, hiking"))),
            vec!["Hiking", "hiking"]
        );
    }

    #[test]
    fn test_list_is_unchanged() {
        let items = vec![" spaced ".to_string(), "B".to_string()];
        assert_eq!(normalize_list(Some(ListValue::from(items.clone()))), items);
    }

    #[test]
    fn test_idempotent() {
        for input in ["a, b ,c", "x", " , ", "one,two,,three "] {
            let once = normalize_list(Some(ListValue::from(input)));
            let twice = normalize_list(Some(ListValue::from(once.clone())));
            assert_eq!(once, twice, "input {:?}", input);
        }
    }

    #[test]
    fn test_deserialize_list_accepts_both_shapes() {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default, deserialize_with = "deserialize_list")]
            hobbies: Vec<String>,
        }

        let from_text: Wire = serde_json::from_str(r#"{"hobbies": "Yoga, Art"}"#).unwrap();
        let from_list: Wire = serde_json::from_str(r#"{"hobbies": ["Yoga", "Art"]}"#).unwrap();
        let from_null: Wire = serde_json::from_str(r#"{"hobbies": null}"#).unwrap();
        let missing: Wire = serde_json::from_str("{}").unwrap();

        assert_eq!(from_text.hobbies, vec!["Yoga", "Art"]);
        assert_eq!(from_list.hobbies, from_text.hobbies);
        assert!(from_null.hobbies.is_empty());
        assert!(missing.hobbies.is_empty());
    }

    #[test]
    fn test_deserialize_list_tolerates_odd_shapes() {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default, deserialize_with = "deserialize_list")]
            hobbies: Vec<String>,
        }

        let number: Wire = serde_json::from_str(r#"{"hobbies": 5}"#).unwrap();
        let object: Wire = serde_json::from_str(r#"{"hobbies": {"k": 1}}"#).unwrap();
        let flag: Wire = serde_json::from_str(r#"{"hobbies": true}"#).unwrap();
        let mixed: Wire = serde_json::from_str(r#"{"hobbies": ["en", null, 3, "pt"]}"#).unwrap();

        assert!(number.hobbies.is_empty());
        assert!(object.hobbies.is_empty());
        assert!(flag.hobbies.is_empty());
        assert_eq!(mixed.hobbies, vec!["en", "pt"]);
    }
}
