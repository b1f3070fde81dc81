//! Core data models shared by the cache, checkpoint, and scheduler layers.

use serde::{Deserialize, Serialize};

/// One bibliographic record queued for extraction.
///
/// Callers assemble these from whatever source they search (PubMed exports,
/// DOI lists, plain files). The `id` must be unique across a collection and
/// stable across runs; it keys both the content cache and the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable unique identifier, e.g. "PM_12345" or a DOI.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: None,
            keywords: Vec::new(),
        }
    }
}

/// Structured output of one extraction call, keyed by the owning document id.
///
/// The list fields are sets in spirit: order carries no meaning and
/// duplicates are dropped when an entry is read back from disk. On disk each
/// list is stored as a single "; "-joined string, which keeps entries
/// greppable and diff-friendly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: String,
    #[serde(default, with = "joined_list")]
    pub fusarium_species: Vec<String>,
    #[serde(default, with = "joined_list")]
    pub crop: Vec<String>,
    #[serde(default, with = "joined_list")]
    pub abiotic_factors: Vec<String>,
    #[serde(default, with = "joined_list")]
    pub observed_effects: Vec<String>,
    #[serde(default, with = "joined_list")]
    pub agronomic_practices: Vec<String>,
    #[serde(default)]
    pub modeling: bool,
    #[serde(default)]
    pub summary: String,
}

impl ExtractionResult {
    /// An empty result owned by `id`; extraction fills in the rest.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fusarium_species: Vec::new(),
            crop: Vec::new(),
            abiotic_factors: Vec::new(),
            observed_effects: Vec::new(),
            agronomic_practices: Vec::new(),
            modeling: false,
            summary: String::new(),
        }
    }
}

/// Serialize a set-valued field as one "; "-joined string and read it back
/// by splitting on ';', trimming, dropping empties, and deduplicating in
/// first-seen order.
pub mod joined_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashSet;

    const SEPARATOR: &str = "; ";

    pub fn serialize<S>(values: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&values.join(SEPARATOR))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let joined = String::deserialize(deserializer)?;
        Ok(split_joined(&joined))
    }

    /// Split a joined field back into its set form.
    pub fn split_joined(joined: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for part in joined.split(';') {
            let part = part.trim();
            if part.is_empty() || !seen.insert(part) {
                continue;
            }
            values.push(part.to_string());
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_list_round_trip() {
        let mut result = ExtractionResult::empty("PM_1");
        result.fusarium_species = vec!["F. graminearum".to_string(), "F. culmorum".to_string()];
        result.summary = "Summary text".to_string();

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("F. graminearum; F. culmorum"));

        let back: ExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_split_joined_trims_and_dedups() {
        let values = joined_list::split_joined(" wheat ;; maize; wheat ;barley");
        assert_eq!(values, vec!["wheat", "maize", "barley"]);
    }

    #[test]
    fn test_split_joined_empty_string() {
        assert!(joined_list::split_joined("").is_empty());
        assert!(joined_list::split_joined(" ; ; ").is_empty());
    }

    #[test]
    fn test_result_missing_fields_default() {
        let json = r#"{"id": "PM_2"}"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.id, "PM_2");
        assert!(result.crop.is_empty());
        assert!(!result.modeling);
        assert!(result.summary.is_empty());
    }

    #[test]
    fn test_document_missing_fields_default() {
        let json = r#"{"id": "10.1002/ps.1234"}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, "10.1002/ps.1234");
        assert!(doc.title.is_empty());
        assert!(doc.abstract_text.is_none());
        assert!(doc.keywords.is_empty());
    }
}
