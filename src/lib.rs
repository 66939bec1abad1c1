//! insight-kb library
//!
//! Semantic knowledge base for short insights (threads, articles, notes,
//! analyses).
//!
//! # Modules
//!
//! - `core`: Data model, topic extraction, configuration, errors
//! - `search`: Embedding, vector index and the `KnowledgeBase` engine
//! - `mcp`: MCP server exposing the knowledge base as tools

pub mod core;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::KbConfig;
pub use crate::core::error::{KbError, Result};
pub use crate::core::insight::{
    Citation, ConnectionType, IngestRequest, IngestResponse, Insight, InsightConnection,
    MetadataValue, SearchResult,
};
pub use crate::core::paths::KbPaths;
pub use crate::core::topics::extract_topics;
pub use crate::search::{KnowledgeBase, SearchFilters};
