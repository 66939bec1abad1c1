//! Corpus statistics

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::vectordb::ScanEntry;
use crate::core::record::{source_type_of, topics_of};

const TOP_TOPICS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeBaseStats {
    pub total_insights: usize,
    pub source_types: BTreeMap<String, usize>,
    pub unique_topics: usize,
    /// Ten most frequent topics, ties by name
    pub top_topics: Vec<TopicCount>,
}

impl KnowledgeBaseStats {
    pub fn from_entries(entries: &[ScanEntry]) -> Self {
        let mut source_types: BTreeMap<String, usize> = BTreeMap::new();
        let mut topic_counts: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            *source_types.entry(source_type_of(&entry.metadata)).or_insert(0) += 1;
            for topic in topics_of(&entry.metadata) {
                *topic_counts.entry(topic).or_insert(0) += 1;
            }
        }

        let unique_topics = topic_counts.len();
        let mut top_topics: Vec<TopicCount> = topic_counts
            .into_iter()
            .map(|(topic, count)| TopicCount { topic, count })
            .collect();
        top_topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.topic.cmp(&b.topic)));
        top_topics.truncate(TOP_TOPICS);

        Self {
            total_insights: entries.len(),
            source_types,
            unique_topics,
            top_topics,
        }
    }
}
