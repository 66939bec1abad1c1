//! Topic co-occurrence over the corpus
//!
//! `TopicCorpus` is a snapshot of every record's topic set taken from one
//! index scan. A search builds it once and reuses it for all of its hits.

use std::collections::{BTreeSet, HashMap};

use super::vectordb::ScanEntry;
use crate::core::record::topics_of;

/// Default number of suggestions returned
pub const DEFAULT_MAX_SUGGESTIONS: usize = 3;

pub struct TopicCorpus {
    topic_sets: Vec<BTreeSet<String>>,
}

impl TopicCorpus {
    pub fn from_entries(entries: &[ScanEntry]) -> Self {
        Self {
            topic_sets: entries.iter().map(|e| topics_of(&e.metadata)).collect(),
        }
    }

    /// Topics that co-occur with `current`, most frequent first.
    ///
    /// Each record sharing at least one topic with `current` adds one to
    /// every other topic it carries. Ties break by topic name. Topics already
    /// in `current` are never suggested.
    pub fn suggest(&self, current: &BTreeSet<String>, max_suggestions: usize) -> Vec<String> {
        if current.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for topics in &self.topic_sets {
            if topics.is_disjoint(current) {
                continue;
            }
            for topic in topics.difference(current) {
                *counts.entry(topic.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(max_suggestions)
            .map(|(topic, _)| topic.to_string())
            .collect()
    }

    /// Every distinct topic, sorted
    pub fn all_topics(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.topic_sets.iter().flatten().collect();
        all.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::insight::{Metadata, MetadataValue};

    fn corpus(sets: &[&str]) -> TopicCorpus {
        let entries: Vec<ScanEntry> = sets
            .iter()
            .enumerate()
            .map(|(i, topics)| {
                let mut metadata = Metadata::new();
                metadata.insert("topics".into(), MetadataValue::from(*topics));
                ScanEntry {
                    id: i.to_string(),
                    metadata,
                }
            })
            .collect();
        TopicCorpus::from_entries(&entries)
    }

    fn set(topics: &[&str]) -> BTreeSet<String> {
        topics.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_counts_co_occurring_topics() {
        let corpus = corpus(&[
            "rust,async,tokio",
            "rust,async",
            "rust,wasm",
            "python,async",
            "cooking,bread",
        ]);
        let suggestions = corpus.suggest(&set(&["rust"]), 3);
        assert_eq!(suggestions, vec!["async", "tokio", "wasm"]);
    }

    #[test]
    fn test_record_counts_once_even_with_several_matches() {
        let corpus = corpus(&["a,b,x", "a,y", "b,y"]);
        // x: 1 record, y: 2 records
        assert_eq!(corpus.suggest(&set(&["a", "b"]), 5), vec!["y", "x"]);
    }

    #[test]
    fn test_never_suggests_current_topics() {
        let corpus = corpus(&["a,b,c", "a,b"]);
        let suggestions = corpus.suggest(&set(&["a", "b"]), 10);
        assert_eq!(suggestions, vec!["c"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let corpus = corpus(&["k,zeta", "k,alpha", "k,mid"]);
        assert_eq!(corpus.suggest(&set(&["k"]), 2), vec!["alpha", "mid"]);
    }

    #[test]
    fn test_empty_inputs() {
        let corpus = corpus(&["a,b"]);
        assert!(corpus.suggest(&BTreeSet::new(), 3).is_empty());
        assert!(corpus.suggest(&set(&["a"]), 0).is_empty());
        assert!(TopicCorpus::from_entries(&[]).suggest(&set(&["x"]), 3).is_empty());
    }

    #[test]
    fn test_all_topics_sorted_unique() {
        let corpus = corpus(&["b,a", "c,a", ""]);
        assert_eq!(corpus.all_topics(), vec!["a", "b", "c"]);
    }
}
