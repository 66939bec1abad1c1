//! Knowledge base engine - combines embedder and vector index
//!
//! One `KnowledgeBase` serves the whole process. It holds no mutable state of
//! its own, so it can be shared behind an `Arc` without locking.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::connections;
use super::cooccurrence::{TopicCorpus, DEFAULT_MAX_SUGGESTIONS};
use super::embedding::{Embedder, HtpEmbedder};
use super::stats::KnowledgeBaseStats;
use super::vectordb::{IndexRecord, MetadataFilter, SqliteIndex, VectorIndex};
use crate::core::config::KbConfig;
use crate::core::error::{KbError, Result};
use crate::core::insight::{
    flatten_metadata, normalize_topics, IngestRequest, IngestResponse, Insight,
    InsightConnection, SearchResult, KNOWN_SOURCE_TYPES,
};
use crate::core::paths::KbPaths;
use crate::core::record::{decode_insight, encode_metadata, KEY_SOURCE_TYPE, KEY_TOPICS};
use crate::core::topics::{self, DEFAULT_TOP_N};

/// Optional search filters; both set means both must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub source_type: Option<String>,
    pub topic: Option<String>,
}

impl SearchFilters {
    pub fn source_type(source_type: impl Into<String>) -> Self {
        Self {
            source_type: Some(source_type.into()),
            topic: None,
        }
    }

    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            source_type: None,
            topic: Some(topic.into()),
        }
    }

    /// Index filter, `None` when no field is set. Empty strings count as unset.
    pub fn to_filter(&self) -> Option<MetadataFilter> {
        let mut conditions = Vec::new();
        if let Some(st) = self.source_type.as_deref().filter(|s| !s.is_empty()) {
            conditions.push(MetadataFilter::equals(KEY_SOURCE_TYPE, st));
        }
        // Stored topics are lowercase
        if let Some(topic) = self.topic.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push(MetadataFilter::list_contains(
                KEY_TOPICS,
                topic.to_lowercase(),
            ));
        }
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(MetadataFilter::And(conditions)),
        }
    }
}

/// Per-hit enrichment sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub related_per_result: usize,
    pub suggestions_per_result: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            related_per_result: 3,
            suggestions_per_result: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

/// Semantic knowledge base over an embedder and a vector index
pub struct KnowledgeBase {
    embedder: Box<dyn Embedder>,
    index: Box<dyn VectorIndex>,
    settings: EngineSettings,
}

impl KnowledgeBase {
    /// Fails when the index already holds vectors of another dimension than
    /// the embedder produces.
    pub fn new(embedder: Box<dyn Embedder>, index: Box<dyn VectorIndex>) -> Result<Self> {
        if let Some(stored) = index.dimension()? {
            if stored != embedder.dimension() {
                return Err(KbError::DimensionMismatch {
                    expected: stored,
                    actual: embedder.dimension(),
                });
            }
        }

        Ok(Self {
            embedder,
            index,
            settings: EngineSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Open the on-disk knowledge base described by `paths` and `config`
    pub fn open(paths: &KbPaths, config: &KbConfig) -> Result<Self> {
        paths.ensure_root()?;
        let db_path = paths.db_path(&config.db_file);
        let index = SqliteIndex::open(&db_path, config.metric)?;
        info!(
            "Knowledge base opened at {} ({} insights)",
            db_path.display(),
            index.count()?
        );

        Ok(Self::new(Box::new(HtpEmbedder::new()), Box::new(index))?.with_settings(
            EngineSettings {
                related_per_result: config.search.related_per_result,
                suggestions_per_result: config.search.suggestions_per_result,
            },
        ))
    }

    /// In-memory knowledge base (for testing)
    pub fn in_memory() -> Result<Self> {
        let index = SqliteIndex::open_in_memory(Default::default())?;
        Self::new(Box::new(HtpEmbedder::new()), Box::new(index))
    }

    /// Store a new insight.
    ///
    /// Topics are the union of the normalized manual topics and those
    /// extracted from the content. Embedder or index failures propagate.
    pub fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        if !KNOWN_SOURCE_TYPES.contains(&request.source_type.as_str()) {
            warn!(
                "Unrecognized source type '{}', storing as given",
                request.source_type
            );
        }

        let id = uuid::Uuid::new_v4().to_string();
        let extracted_topics = topics::extract_topics(&request.content, DEFAULT_TOP_N);

        let mut all_topics = normalize_topics(&request.topics);
        all_topics.extend(extracted_topics.iter().cloned());

        let embedding = self
            .embedder
            .embed(&format!("{}\n\n{}", request.title, request.content))?;

        let now = Utc::now();
        let citation_count = request.citations.len();
        let insight = Insight {
            id: id.clone(),
            title: request.title,
            content: request.content,
            source_type: request.source_type,
            topics: all_topics,
            citations: request.citations,
            created_at: now,
            updated_at: now,
            metadata: flatten_metadata(&request.metadata),
        };

        let metadata = encode_metadata(&insight)?;
        self.index.upsert(IndexRecord {
            id: id.clone(),
            embedding,
            document: insight.content,
            metadata,
        })?;

        info!(
            "Ingested insight {} ({} topics, {} citations)",
            id,
            insight.topics.len(),
            citation_count
        );

        Ok(IngestResponse {
            id,
            message: "Insight ingested successfully".to_string(),
            extracted_topics,
            citation_count,
        })
    }

    /// Semantic search, nearest first.
    ///
    /// The ranking is the index's own order. Each hit carries its related
    /// insights and topic suggestions; suggestions for all hits share one
    /// corpus scan.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(query)?;
        let filter = filters.and_then(SearchFilters::to_filter);
        let hits = self.index.query(&query_embedding, top_k, filter.as_ref())?;
        debug!("Search '{}' matched {} insights", query, hits.len());

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let corpus = self.topic_corpus()?;
        let metric = self.index.metric();

        hits.into_iter()
            .map(|hit| -> Result<SearchResult> {
                let insight = decode_insight(&hit.id, &hit.document, &hit.metadata);
                let related_insights = self.find_connections(
                    &hit.id,
                    self.settings.related_per_result,
                    true,
                )?;
                let suggested_topics =
                    corpus.suggest(&insight.topics, self.settings.suggestions_per_result);

                Ok(SearchResult {
                    similarity_score: metric.similarity(hit.distance),
                    insight,
                    related_insights,
                    suggested_topics,
                })
            })
            .collect()
    }

    /// Nearest neighbors of a stored insight. Unknown ids yield an empty list.
    pub fn find_connections(
        &self,
        insight_id: &str,
        top_k: usize,
        exclude_self: bool,
    ) -> Result<Vec<InsightConnection>> {
        connections::find_connections(self.index.as_ref(), insight_id, top_k, exclude_self)
    }

    /// Topics co-occurring with `current_topics` across the corpus
    pub fn suggest_related_topics(
        &self,
        current_topics: &[String],
        max_suggestions: usize,
    ) -> Result<Vec<String>> {
        let current = normalize_topics(current_topics);
        if current.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.topic_corpus()?.suggest(&current, max_suggestions))
    }

    pub fn get_stats(&self) -> Result<KnowledgeBaseStats> {
        Ok(KnowledgeBaseStats::from_entries(&self.index.scan_all()?))
    }

    pub fn get_insight(&self, insight_id: &str) -> Result<Option<Insight>> {
        Ok(self
            .index
            .get(insight_id)?
            .map(|r| decode_insight(&r.id, &r.document, &r.metadata)))
    }

    /// Returns `false` when no such insight exists
    pub fn delete_insight(&self, insight_id: &str) -> Result<bool> {
        let removed = self.index.delete(insight_id)?;
        if removed {
            info!("Deleted insight {}", insight_id);
        }
        Ok(removed)
    }

    /// Every distinct topic in the corpus, sorted
    pub fn get_all_topics(&self) -> Result<Vec<String>> {
        Ok(self.topic_corpus()?.all_topics())
    }

    /// Keyword topics for arbitrary text, without storing anything
    pub fn extract_topics(&self, content: &str, top_n: usize) -> Vec<String> {
        topics::extract_topics(content, top_n)
    }

    fn topic_corpus(&self) -> Result<TopicCorpus> {
        Ok(TopicCorpus::from_entries(&self.index.scan_all()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::core::insight::{Citation, MetadataValue};
    use serde_json::json;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::in_memory().unwrap()
    }

    struct OfflineEmbedder;

    impl Embedder for OfflineEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(KbError::Embedding("embedding service unreachable".into()))
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_round_trip() {
        let kb = kb();
        let req = IngestRequest::new("Yield curves", "Inverted yield curves precede recessions.")
            .source_type("analysis")
            .citations(vec![Citation::new("NBER paper").with_url("https://nber.org/x")])
            .metadata(
                json!({"author": "sam", "score": 4, "tags": ["a"], "extra": {"k": 1}})
                    .as_object()
                    .unwrap()
                    .clone(),
            );
        let citations = req.citations.clone();
        let resp = kb.ingest(req).unwrap();
        assert_eq!(resp.citation_count, 1);

        let insight = kb.get_insight(&resp.id).unwrap().unwrap();
        assert_eq!(insight.id, resp.id);
        assert_eq!(insight.title, "Yield curves");
        assert_eq!(insight.content, "Inverted yield curves precede recessions.");
        assert_eq!(insight.source_type, "analysis");
        assert_eq!(insight.citations, citations);
        assert_eq!(insight.created_at, insight.updated_at);
        assert_eq!(insight.metadata.len(), 2);
        assert_eq!(insight.metadata["author"], MetadataValue::from("sam"));
        assert_eq!(insight.metadata["score"], MetadataValue::Integer(4));
    }

    #[test]
    fn test_ids_are_unique() {
        let kb = kb();
        let a = kb.ingest(IngestRequest::new("same", "same content")).unwrap();
        let b = kb.ingest(IngestRequest::new("same", "same content")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(kb.get_stats().unwrap().total_insights, 2);
    }

    #[test]
    fn test_manual_and_extracted_topics_merge_once() {
        let kb = kb();
        let resp = kb
            .ingest(
                IngestRequest::new("Ownership", "Rust ownership makes rust code safe.")
                    .topics(["Rust", "memory"]),
            )
            .unwrap();
        assert!(resp.extracted_topics.contains(&"rust".to_string()));

        let insight = kb.get_insight(&resp.id).unwrap().unwrap();
        assert_eq!(insight.topics.iter().filter(|t| *t == "rust").count(), 1);
        assert!(insight.topics.contains("memory"));
        for t in &resp.extracted_topics {
            assert!(insight.topics.contains(t));
        }
        // extracted_topics excludes manual-only topics
        assert!(!resp.extracted_topics.contains(&"memory".to_string()));
    }

    #[test]
    fn test_finance_scenario_connections() {
        let kb = kb();
        let a = kb
            .ingest(IngestRequest::new("A", "finance finance apples orchards"))
            .unwrap();
        let b = kb
            .ingest(IngestRequest::new("B", "finance finance bananas plantations"))
            .unwrap();
        let c = kb
            .ingest(IngestRequest::new("C", "finance finance cherries blossoms"))
            .unwrap();

        let conns = kb.find_connections(&a.id, 2, true).unwrap();
        assert_eq!(conns.len(), 2);

        let ids: BTreeSet<_> = conns.iter().map(|c| c.connected_insight_id.clone()).collect();
        let expected: BTreeSet<_> = [b.id.clone(), c.id.clone()].into_iter().collect();
        assert_eq!(ids, expected);

        assert!(conns[0].similarity_score >= conns[1].similarity_score);
        for conn in &conns {
            assert_eq!(conn.shared_topics.iter().collect::<Vec<_>>(), vec!["finance"]);
        }
    }

    #[test]
    fn test_connections_never_include_self() {
        let kb = kb();
        let ids: Vec<String> = (0..5)
            .map(|i| {
                kb.ingest(IngestRequest::new(format!("note {}", i), format!("content item{}", i)))
                    .unwrap()
                    .id
            })
            .collect();

        for id in &ids {
            for k in 0..7 {
                let conns = kb.find_connections(id, k, true).unwrap();
                assert_eq!(conns.len(), k.min(ids.len() - 1));
                assert!(conns.iter().all(|c| &c.connected_insight_id != id));
                assert!(conns
                    .iter()
                    .all(|c| c.similarity_score > 0.0 && c.similarity_score <= 1.0));
            }
        }
    }

    #[test]
    fn test_unknown_id_looks_like_no_connections() {
        let kb = kb();
        let lonely = kb.ingest(IngestRequest::new("only", "solitary content")).unwrap();
        assert_eq!(
            kb.find_connections("missing", 5, true).unwrap(),
            kb.find_connections(&lonely.id, 5, true).unwrap()
        );
        assert!(kb.get_insight("missing").unwrap().is_none());
    }

    #[test]
    fn test_empty_corpus() {
        let kb = kb();
        assert!(kb.suggest_related_topics(&["x".to_string()], 3).unwrap().is_empty());
        assert_eq!(kb.get_stats().unwrap().total_insights, 0);
        assert!(kb.search("anything", 5, None).unwrap().is_empty());
        assert!(kb.get_all_topics().unwrap().is_empty());
    }

    #[test]
    fn test_delete_then_get() {
        let kb = kb();
        let resp = kb.ingest(IngestRequest::new("gone", "temporary thought")).unwrap();
        assert!(kb.delete_insight(&resp.id).unwrap());
        assert!(kb.get_insight(&resp.id).unwrap().is_none());
        assert!(!kb.delete_insight(&resp.id).unwrap());
        assert!(kb.find_connections(&resp.id, 3, true).unwrap().is_empty());
    }

    #[test]
    fn test_search_source_type_filter() {
        let kb = kb();
        kb.ingest(IngestRequest::new("t1", "markets rally on earnings").source_type("thread"))
            .unwrap();
        kb.ingest(IngestRequest::new("a1", "markets fall on earnings").source_type("article"))
            .unwrap();
        kb.ingest(IngestRequest::new("a2", "earnings season recap").source_type("article"))
            .unwrap();

        let results = kb
            .search("markets earnings", 10, Some(&SearchFilters::source_type("article")))
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.insight.source_type == "article"));

        let none = kb
            .search("markets", 10, Some(&SearchFilters::source_type("podcast")))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_search_topic_filter_and_combination() {
        let kb = kb();
        kb.ingest(IngestRequest::new("x", "bitcoin halving cycle").source_type("thread"))
            .unwrap();
        kb.ingest(IngestRequest::new("y", "bitcoin custody risks").source_type("article"))
            .unwrap();
        kb.ingest(IngestRequest::new("z", "gold custody vaults").source_type("article"))
            .unwrap();

        let bitcoin = kb.search("crypto", 10, Some(&SearchFilters::topic("bitcoin"))).unwrap();
        assert_eq!(bitcoin.len(), 2);
        assert!(bitcoin.iter().all(|r| r.insight.topics.contains("bitcoin")));

        // Exact entries only
        assert!(kb.search("crypto", 10, Some(&SearchFilters::topic("bit"))).unwrap().is_empty());

        let both = SearchFilters {
            source_type: Some("article".into()),
            topic: Some("custody".into()),
        };
        let results = kb.search("custody", 10, Some(&both)).unwrap();
        assert_eq!(results.len(), 2);

        let narrow = SearchFilters {
            source_type: Some("thread".into()),
            topic: Some("custody".into()),
        };
        assert!(kb.search("custody", 10, Some(&narrow)).unwrap().is_empty());

        // Empty strings are ignored
        let blank = SearchFilters {
            source_type: Some(String::new()),
            topic: Some(String::new()),
        };
        assert_eq!(kb.search("custody", 10, Some(&blank)).unwrap().len(), 3);
    }

    #[test]
    fn test_search_results_are_enriched() {
        let kb = kb();
        let first = kb
            .ingest(IngestRequest::new("Fed", "rates inflation rates inflation"))
            .unwrap();
        kb.ingest(IngestRequest::new("ECB", "rates euro euro")).unwrap();
        kb.ingest(IngestRequest::new("BoJ", "rates yen")).unwrap();
        kb.ingest(IngestRequest::new("BoE", "rates pound")).unwrap();
        kb.ingest(IngestRequest::new("Bake", "bread flour")).unwrap();

        let results = kb.search("rates inflation", 5, None).unwrap();
        assert_eq!(results.len(), 5);

        let mut previous = f32::INFINITY;
        for r in &results {
            assert!(r.similarity_score > 0.0 && r.similarity_score <= 1.0);
            assert!(r.similarity_score <= previous);
            previous = r.similarity_score;

            assert!(r.related_insights.len() <= 3);
            assert!(r
                .related_insights
                .iter()
                .all(|c| c.connected_insight_id != r.insight.id));
            assert!(r.suggested_topics.iter().all(|t| !r.insight.topics.contains(t)));
        }

        let fed = results.iter().find(|r| r.insight.id == first.id).unwrap();
        assert_eq!(fed.related_insights.len(), 3);
        // euro, pound, yen each co-occur once with "rates"; ties by name
        assert_eq!(fed.suggested_topics, vec!["euro", "pound", "yen"]);
    }

    #[test]
    fn test_suggest_related_topics() {
        let kb = kb();
        kb.ingest(IngestRequest::new("1", "rust async tokio")).unwrap();
        kb.ingest(IngestRequest::new("2", "rust async")).unwrap();
        kb.ingest(IngestRequest::new("3", "python async")).unwrap();

        let suggestions = kb.suggest_related_topics(&["rust".to_string()], 3).unwrap();
        assert_eq!(suggestions, vec!["async", "tokio"]);
        assert!(kb.suggest_related_topics(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn test_stats_and_topics() {
        let kb = kb();
        kb.ingest(IngestRequest::new("1", "rust rust").source_type("note"))
            .unwrap();
        kb.ingest(IngestRequest::new("2", "rust python").source_type("note"))
            .unwrap();
        kb.ingest(IngestRequest::new("3", "python").source_type("article"))
            .unwrap();

        let stats = kb.get_stats().unwrap();
        assert_eq!(stats.total_insights, 3);
        assert_eq!(stats.source_types["note"], 2);
        assert_eq!(stats.source_types["article"], 1);
        assert_eq!(stats.unique_topics, 2);
        assert_eq!(stats.top_topics[0].count, 2);

        assert_eq!(kb.get_all_topics().unwrap(), vec!["python", "rust"]);
    }

    #[test]
    fn test_collaborator_failure_propagates() {
        let index = SqliteIndex::open_in_memory(Default::default()).unwrap();
        let kb = KnowledgeBase::new(Box::new(OfflineEmbedder), Box::new(index)).unwrap();

        let err = kb.ingest(IngestRequest::new("t", "c")).unwrap_err();
        assert!(matches!(err, KbError::Embedding(_)));
        assert_eq!(kb.get_stats().unwrap().total_insights, 0);
        assert!(kb.search("q", 3, None).is_err());
    }

    #[test]
    fn test_mixed_case_topics_are_found() {
        let kb = kb();
        kb.ingest(IngestRequest::new("x", "halving cycle notes").topics(["Bitcoin"]))
            .unwrap();
        kb.ingest(IngestRequest::new("y", "halving miners").topics(["bitcoin", "Mining"]))
            .unwrap();

        let hits = kb
            .search("halving", 5, Some(&SearchFilters::topic(" Bitcoin ")))
            .unwrap();
        assert_eq!(hits.len(), 2);

        let suggestions = kb
            .suggest_related_topics(&["Bitcoin".to_string()], 10)
            .unwrap();
        assert!(suggestions.contains(&"halving".to_string()));
        assert!(suggestions.contains(&"mining".to_string()));
        assert!(!suggestions.contains(&"bitcoin".to_string()));
    }

    #[test]
    fn test_embedder_must_match_index_dimension() {
        let index = SqliteIndex::open_in_memory(Default::default()).unwrap();
        index
            .upsert(IndexRecord {
                id: "old".into(),
                embedding: vec![0.0; 8],
                document: String::new(),
                metadata: Default::default(),
            })
            .unwrap();

        let err = KnowledgeBase::new(Box::new(HtpEmbedder::new()), Box::new(index))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            KbError::DimensionMismatch { expected: 8, actual: 384 }
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let kb = std::sync::Arc::new(kb());
        let seed = kb.ingest(IngestRequest::new("seed", "shared finance seed")).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let kb = std::sync::Arc::clone(&kb);
                scope.spawn(move || {
                    for i in 0..5 {
                        let resp = kb
                            .ingest(IngestRequest::new(
                                format!("w{} n{}", worker, i),
                                format!("finance worker{} item{}", worker, i),
                            ))
                            .unwrap();
                        assert!(!kb.search("finance", 3, None).unwrap().is_empty());
                        if i % 2 == 0 {
                            assert!(kb.delete_insight(&resp.id).unwrap());
                        }
                    }
                });
            }
        });

        // 4 workers keep items 1 and 3
        assert_eq!(kb.get_stats().unwrap().total_insights, 1 + 4 * 2);
        assert!(kb.get_insight(&seed.id).unwrap().is_some());
        assert_eq!(kb.find_connections(&seed.id, 20, true).unwrap().len(), 8);
    }

    #[test]
    fn test_settings_limit_enrichment() {
        let kb = kb().with_settings(EngineSettings {
            related_per_result: 1,
            suggestions_per_result: 1,
        });
        kb.ingest(IngestRequest::new("1", "alpha beta gamma")).unwrap();
        kb.ingest(IngestRequest::new("2", "alpha delta")).unwrap();
        kb.ingest(IngestRequest::new("3", "alpha epsilon")).unwrap();

        for r in kb.search("alpha", 3, None).unwrap() {
            assert_eq!(r.related_insights.len(), 1);
            assert!(r.suggested_topics.len() <= 1);
        }
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths = KbPaths::from_root(dir.path().join("kb"));
        let config = KbConfig::default();

        let id = {
            let kb = KnowledgeBase::open(&paths, &config).unwrap();
            kb.ingest(IngestRequest::new("persisted", "durable insight")).unwrap().id
        };

        let kb = KnowledgeBase::open(&paths, &config).unwrap();
        assert_eq!(kb.get_insight(&id).unwrap().unwrap().title, "persisted");
    }
}
