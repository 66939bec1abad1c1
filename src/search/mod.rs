//! Semantic search engine for the knowledge base
//!
//! Embedding, vector index, connection discovery, topic co-occurrence and
//! corpus statistics, tied together by `KnowledgeBase`.

pub mod connections;
pub mod cooccurrence;
pub mod distance;
pub mod embedding;
pub mod engine;
pub mod stats;
pub mod vectordb;

pub use distance::DistanceMetric;
pub use embedding::{Embedder, HtpEmbedder};
pub use engine::{EngineSettings, KnowledgeBase, SearchFilters};
pub use stats::{KnowledgeBaseStats, TopicCount};
pub use vectordb::{MetadataFilter, SqliteIndex, VectorIndex};
