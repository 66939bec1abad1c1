//! Mapping between insights and flat index records
//!
//! The index only stores scalar metadata, so structured fields are encoded:
//! topics as a comma-joined string, citations as a JSON array, user metadata
//! under a `meta_` prefix.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::Result;
use super::insight::{Citation, Insight, Metadata, MetadataValue};

pub const KEY_TITLE: &str = "title";
pub const KEY_SOURCE_TYPE: &str = "source_type";
pub const KEY_TOPICS: &str = "topics";
pub const KEY_CITATION_COUNT: &str = "citation_count";
pub const KEY_CITATIONS: &str = "citations_json";
pub const KEY_CREATED_AT: &str = "created_at";
pub const KEY_UPDATED_AT: &str = "updated_at";
pub const META_PREFIX: &str = "meta_";

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_SOURCE_TYPE: &str = "unknown";

/// Flatten an insight into index metadata. The content is stored separately
/// as the record's document.
pub fn encode_metadata(insight: &Insight) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    metadata.insert(KEY_TITLE.into(), insight.title.clone().into());
    metadata.insert(KEY_SOURCE_TYPE.into(), insight.source_type.clone().into());
    metadata.insert(KEY_TOPICS.into(), join_topics(&insight.topics).into());
    metadata.insert(
        KEY_CITATION_COUNT.into(),
        MetadataValue::Integer(insight.citations.len() as i64),
    );
    metadata.insert(KEY_CREATED_AT.into(), insight.created_at.to_rfc3339().into());
    metadata.insert(KEY_UPDATED_AT.into(), insight.updated_at.to_rfc3339().into());

    if !insight.citations.is_empty() {
        metadata.insert(
            KEY_CITATIONS.into(),
            serde_json::to_string(&insight.citations)?.into(),
        );
    }

    for (key, value) in &insight.metadata {
        metadata.insert(format!("{}{}", META_PREFIX, key), value.clone());
    }

    Ok(metadata)
}

/// Rebuild an insight from a stored record.
///
/// Missing or malformed fields fall back to defaults instead of failing.
pub fn decode_insight(id: &str, document: &str, metadata: &Metadata) -> Insight {
    let created_at = timestamp_of(metadata, KEY_CREATED_AT);
    let updated_at = timestamp_of(metadata, KEY_UPDATED_AT);
    let (created_at, updated_at) = match (created_at, updated_at) {
        (Some(c), Some(u)) => (c, u),
        (Some(c), None) => (c, c),
        (None, Some(u)) => (u, u),
        (None, None) => {
            debug!("Record {} has no timestamps", id);
            let now = Utc::now();
            (now, now)
        }
    };

    Insight {
        id: id.to_string(),
        title: title_of(metadata),
        content: document.to_string(),
        source_type: source_type_of(metadata),
        topics: topics_of(metadata),
        citations: citations_of(id, metadata),
        created_at,
        updated_at,
        metadata: user_metadata_of(metadata),
    }
}

pub fn join_topics(topics: &BTreeSet<String>) -> String {
    topics.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

pub fn topics_of(metadata: &Metadata) -> BTreeSet<String> {
    metadata
        .get(KEY_TOPICS)
        .and_then(MetadataValue::as_str)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn title_of(metadata: &Metadata) -> String {
    metadata
        .get(KEY_TITLE)
        .and_then(MetadataValue::as_str)
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

pub fn source_type_of(metadata: &Metadata) -> String {
    metadata
        .get(KEY_SOURCE_TYPE)
        .and_then(MetadataValue::as_str)
        .unwrap_or(DEFAULT_SOURCE_TYPE)
        .to_string()
}

fn citations_of(id: &str, metadata: &Metadata) -> Vec<Citation> {
    let Some(raw) = metadata.get(KEY_CITATIONS).and_then(MetadataValue::as_str) else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Unreadable citations on record {}: {}", id, e);
        Vec::new()
    })
}

fn timestamp_of(metadata: &Metadata, key: &str) -> Option<DateTime<Utc>> {
    let raw = metadata.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

fn user_metadata_of(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(META_PREFIX)
                .map(|k| (k.to_string(), value.clone()))
        })
        .collect()
}
