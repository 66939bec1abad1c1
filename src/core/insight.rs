//! Insight data model
//!
//! Insights are the stored knowledge units. Connections and search results
//! are computed on demand and never persisted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SOURCE_THREAD: &str = "thread";
pub const SOURCE_ARTICLE: &str = "article";
pub const SOURCE_NOTE: &str = "note";
pub const SOURCE_ANALYSIS: &str = "analysis";

/// Well-known source types. Any other string is accepted as well.
pub const KNOWN_SOURCE_TYPES: &[&str] = &[SOURCE_THREAD, SOURCE_ARTICLE, SOURCE_NOTE, SOURCE_ANALYSIS];

/// Scalar metadata value. Nested structures are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Convert a JSON value, returning `None` for null, arrays and objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Flat scalar metadata, ordered by key
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Keep only the scalar entries of a JSON object.
///
/// Nulls, arrays and nested objects are dropped without an error.
pub fn flatten_metadata(raw: &serde_json::Map<String, Value>) -> Metadata {
    raw.iter()
        .filter_map(|(key, value)| MetadataValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_citation_type() -> String {
    SOURCE_ARTICLE.to_string()
}

fn default_source_type() -> String {
    SOURCE_THREAD.to_string()
}

/// Reference to an external source cited by an insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub source_title: String,
    #[serde(default = "default_citation_type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Citation {
    pub fn new(source_title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            source_url: None,
            source_title: source_title.into(),
            source_type: default_citation_type(),
            excerpt: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// A stored knowledge unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_type: String,
    pub topics: BTreeSet<String>,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
}

/// How two insights are related.
///
/// Only `Semantic` is produced; `Citation` and `Topic` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Semantic,
    Citation,
    Topic,
}

/// Directed, computed relation from a source insight to a neighbor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightConnection {
    pub connected_insight_id: String,
    pub connected_insight_title: String,
    pub similarity_score: f32,
    pub shared_topics: BTreeSet<String>,
    pub connection_type: ConnectionType,
}

/// One ranked hit of a semantic search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub insight: Insight,
    pub similarity_score: f32,
    pub related_insights: Vec<InsightConnection>,
    pub suggested_topics: Vec<String>,
}

/// Input for ingesting a new insight
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    pub title: String,
    pub content: String,
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// Manual topics, merged with the extracted ones
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl IngestRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source_type: default_source_type(),
            ..Default::default()
        }
    }

    pub fn source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }

    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of a successful ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub id: String,
    pub message: String,
    /// Topics extracted from the content (not merged with manual ones)
    pub extracted_topics: Vec<String>,
    pub citation_count: usize,
}

/// Normalize manual topics: trim, lowercase, split on commas, drop empties
pub fn normalize_topics<'a, I>(topics: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    topics
        .into_iter()
        .flat_map(|t| t.split(','))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_drops_non_scalars() {
        let raw = json!({
            "author": "ana",
            "likes": 42,
            "ratio": 0.5,
            "pinned": true,
            "nested": {"a": 1},
            "list": [1, 2],
            "missing": null,
        });
        let flat = flatten_metadata(raw.as_object().unwrap());

        assert_eq!(flat.len(), 4);
        assert_eq!(flat["author"], MetadataValue::Text("ana".into()));
        assert_eq!(flat["likes"], MetadataValue::Integer(42));
        assert_eq!(flat["ratio"], MetadataValue::Float(0.5));
        assert_eq!(flat["pinned"], MetadataValue::Bool(true));
        assert!(!flat.contains_key("nested"));
        assert!(!flat.contains_key("list"));
    }

    #[test]
    fn test_metadata_value_json_shape() {
        let flat: Metadata = [
            ("a".to_string(), MetadataValue::Integer(3)),
            ("b".to_string(), MetadataValue::Text("x".into())),
        ]
        .into_iter()
        .collect();
        let encoded = serde_json::to_string(&flat).unwrap();
        assert_eq!(encoded, r#"{"a":3,"b":"x"}"#);

        let decoded: Metadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, flat);
    }

    #[test]
    fn test_normalize_topics() {
        let raw = vec![
            " AI ".to_string(),
            "rust, Systems".to_string(),
            "".to_string(),
            "ai".to_string(),
        ];
        let topics = normalize_topics(&raw);
        let expected: BTreeSet<String> =
            ["ai", "rust", "systems"].iter().map(|s| s.to_string()).collect();
        assert_eq!(topics, expected);
    }

    #[test]
    fn test_citation_defaults() {
        let citation: Citation = serde_json::from_str(r#"{"source_title": "Paper"}"#).unwrap();
        assert_eq!(citation.source_type, "article");
        assert!(citation.source_url.is_none());
        assert!(!citation.id.is_empty());
    }

    #[test]
    fn test_ingest_request_defaults() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"title": "T", "content": "C"}"#).unwrap();
        assert_eq!(req.source_type, "thread");
        assert!(req.topics.is_empty());
        assert!(req.metadata.is_empty());
    }

    #[test]
    fn test_connection_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConnectionType::Semantic).unwrap(),
            "\"semantic\""
        );
    }
}
