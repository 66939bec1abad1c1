//! Knowledge base MCP server implementation

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::config::KbConfig;
use crate::core::insight::{Citation, IngestRequest};
use crate::search::cooccurrence::DEFAULT_MAX_SUGGESTIONS;
use crate::search::engine::{KnowledgeBase, SearchFilters};

/// Parameters for kb_ingest tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestParams {
    #[schemars(description = "Insight title")]
    pub title: String,
    #[schemars(description = "Full text of the insight")]
    pub content: String,
    #[schemars(description = "Source type: thread, article, note, analysis (default: thread)")]
    #[serde(default)]
    pub source_type: Option<String>,
    #[schemars(description = "Manual topics, merged with auto-extracted ones")]
    #[serde(default)]
    pub topics: Vec<String>,
    #[schemars(description = "Referenced sources")]
    #[serde(default)]
    pub citations: Vec<CitationParams>,
    #[schemars(description = "Flat metadata (author, platform, ...); nested values are dropped")]
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CitationParams {
    pub source_title: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[schemars(description = "research, regulation, article, tweet (default: article)")]
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
}

impl From<CitationParams> for Citation {
    fn from(p: CitationParams) -> Self {
        let mut citation = Citation::new(p.source_title);
        citation.source_url = p.source_url;
        if let Some(st) = p.source_type {
            citation.source_type = st;
        }
        citation.excerpt = p.excerpt;
        citation
    }
}

/// Parameters for kb_search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Natural language search query")]
    pub query: String,
    #[schemars(description = "Number of results, 1-50 (default from config, usually 10)")]
    #[serde(default)]
    pub top_k: Option<usize>,
    #[schemars(description = "Only insights of this source type")]
    #[serde(default)]
    pub source_type: Option<String>,
    #[schemars(description = "Only insights carrying this topic")]
    #[serde(default)]
    pub topic: Option<String>,
}

/// Parameters for kb_connections tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConnectionsParams {
    #[schemars(description = "ID of the source insight")]
    pub insight_id: String,
    #[schemars(description = "Number of connections, 1-20 (default from config, usually 5)")]
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InsightIdParams {
    #[schemars(description = "Insight ID")]
    pub insight_id: String,
}

/// Parameters for kb_extract_topics tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractParams {
    #[schemars(description = "Content to extract topics from")]
    pub content: String,
    #[schemars(description = "Number of topics, 1-10 (default from config, usually 5)")]
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// Parameters for kb_suggest_topics tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestParams {
    #[schemars(description = "Topics to find related topics for")]
    pub topics: Vec<String>,
    #[schemars(description = "Maximum suggestions (default: 3)")]
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_max_suggestions() -> usize {
    DEFAULT_MAX_SUGGESTIONS
}

#[derive(Debug, Serialize)]
struct TopicsJson {
    topics: Vec<String>,
}

/// Knowledge base MCP service
#[derive(Clone)]
pub struct KbService {
    kb: Arc<KnowledgeBase>,
    config: Arc<KbConfig>,
    tool_router: ToolRouter<Self>,
}

impl KbService {
    pub fn new(kb: Arc<KnowledgeBase>, config: Arc<KbConfig>) -> Self {
        Self {
            kb,
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn search_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.search.default_top_k)
            .clamp(1, 50)
    }

    fn connections_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.connections.default_top_k)
            .clamp(1, 20)
    }

    fn extract_top_n(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.topics.default_top_n)
            .clamp(1, 10)
    }

    /// Run a knowledge base call off the async executor
    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T, McpError>
    where
        F: FnOnce(&KnowledgeBase) -> crate::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let kb = Arc::clone(&self.kb);
        tokio::task::spawn_blocking(move || f(&kb))
            .await
            .map_err(|e| McpError::internal_error(format!("{} task failed: {}", op, e), None))?
            .map_err(|e| McpError::internal_error(format!("{} failed: {}", op, e), None))
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

#[tool_router]
impl KbService {
    #[tool(description = "Ingest a thread, article, note or analysis into the knowledge base. Topics are auto-extracted and merged with the given ones.")]
    async fn kb_ingest(&self, params: Parameters<IngestParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let mut request = IngestRequest::new(p.title, p.content)
            .topics(p.topics)
            .citations(p.citations.into_iter().map(Citation::from).collect())
            .metadata(p.metadata.into_iter().collect());
        if let Some(st) = p.source_type.filter(|s| !s.is_empty()) {
            request = request.source_type(st);
        }

        let response = self.blocking("Ingest", move |kb| kb.ingest(request)).await?;
        json_result(&response)
    }

    #[tool(description = "Semantic search across insights. Each result includes related insights and suggested topics for further exploration.")]
    async fn kb_search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let top_k = self.search_top_k(p.top_k);
        let filters = SearchFilters {
            source_type: p.source_type,
            topic: p.topic,
        };

        let results = self
            .blocking("Search", move |kb| kb.search(&p.query, top_k, Some(&filters)))
            .await?;
        json_result(&results)
    }

    #[tool(description = "Find insights semantically related to the given insight, with shared topics.")]
    async fn kb_connections(&self, params: Parameters<ConnectionsParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let top_k = self.connections_top_k(p.top_k);

        let connections = self
            .blocking("Connection lookup", move |kb| kb.find_connections(&p.insight_id, top_k, true))
            .await?;
        json_result(&connections)
    }

    #[tool(description = "Get a single insight with its topics, citations and metadata.")]
    async fn kb_get_insight(&self, params: Parameters<InsightIdParams>) -> Result<CallToolResult, McpError> {
        let id = params.0.insight_id;
        let lookup = id.clone();

        match self.blocking("Lookup", move |kb| kb.get_insight(&lookup)).await? {
            Some(insight) => json_result(&insight),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "Insight not found: {}",
                id
            ))])),
        }
    }

    #[tool(description = "Delete an insight from the knowledge base.")]
    async fn kb_delete_insight(&self, params: Parameters<InsightIdParams>) -> Result<CallToolResult, McpError> {
        let id = params.0.insight_id;
        let target = id.clone();

        let deleted = self.blocking("Delete", move |kb| kb.delete_insight(&target)).await?;
        let message = if deleted {
            format!("Insight deleted: {}", id)
        } else {
            format!("Insight not found: {}", id)
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    #[tool(description = "List every topic in the knowledge base.")]
    async fn kb_topics(&self) -> Result<CallToolResult, McpError> {
        let topics = self.blocking("Topic listing", |kb| kb.get_all_topics()).await?;
        json_result(&TopicsJson { topics })
    }

    #[tool(description = "Extract keyword topics from draft content without storing it.")]
    async fn kb_extract_topics(&self, params: Parameters<ExtractParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let topics = self.kb.extract_topics(&p.content, self.extract_top_n(p.top_n));
        json_result(&TopicsJson { topics })
    }

    #[tool(description = "Suggest topics that co-occur with the given topics across the knowledge base.")]
    async fn kb_suggest_topics(&self, params: Parameters<SuggestParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let topics = self
            .blocking("Topic suggestion", move |kb| {
                kb.suggest_related_topics(&p.topics, p.max_suggestions)
            })
            .await?;
        json_result(&TopicsJson { topics })
    }

    #[tool(description = "Knowledge base statistics: insight count, source types, top topics.")]
    async fn kb_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.blocking("Stats", |kb| kb.get_stats()).await?;
        json_result(&stats)
    }
}

#[tool_handler]
impl ServerHandler for KbService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Insight knowledge base MCP server. Ingest insights, search them by meaning, and explore connections and topics.".to_string()
            ),
            ..Default::default()
        }
    }
}

/// Run the MCP server on stdio
pub async fn run_mcp_server(kb: Arc<KnowledgeBase>, config: KbConfig) -> Result<()> {
    use tokio::io::{stdin, stdout};

    info!("Starting MCP server on stdio");
    let service = KbService::new(kb, Arc::new(config));
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_defaults() {
        let p: SearchParams = serde_json::from_str(r#"{"query": "rates"}"#).unwrap();
        assert!(p.top_k.is_none());
        assert!(p.source_type.is_none());

        let p: SuggestParams = serde_json::from_str(r#"{"topics": ["macro"]}"#).unwrap();
        assert_eq!(p.max_suggestions, DEFAULT_MAX_SUGGESTIONS);

        let p: IngestParams =
            serde_json::from_str(r#"{"title": "t", "content": "c"}"#).unwrap();
        assert!(p.topics.is_empty() && p.citations.is_empty() && p.metadata.is_empty());
    }

    #[test]
    fn test_citation_params_conversion() {
        let p: CitationParams =
            serde_json::from_str(r#"{"source_title": "Report", "excerpt": "q"}"#).unwrap();
        let c = Citation::from(p);
        assert_eq!(c.source_title, "Report");
        assert_eq!(c.source_type, "article");
        assert_eq!(c.excerpt.as_deref(), Some("q"));
    }

    #[tokio::test]
    async fn test_tools_round_trip() {
        let kb = Arc::new(KnowledgeBase::in_memory().unwrap());
        let service = KbService::new(Arc::clone(&kb), Arc::new(KbConfig::default()));

        let ingest = IngestParams {
            title: "Stablecoins".into(),
            content: "stablecoins reserves audits".into(),
            source_type: Some("note".into()),
            topics: vec!["crypto".into()],
            citations: vec![],
            metadata: HashMap::new(),
        };
        service.kb_ingest(Parameters(ingest)).await.unwrap();

        let stats = kb.get_stats().unwrap();
        assert_eq!(stats.total_insights, 1);
        assert_eq!(stats.source_types["note"], 1);

        let result = service
            .kb_search(Parameters(SearchParams {
                query: "stablecoins".into(),
                top_k: Some(0),
                source_type: None,
                topic: Some("crypto".into()),
            }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
    }

    #[test]
    fn test_defaults_follow_config() {
        let kb = Arc::new(KnowledgeBase::in_memory().unwrap());
        let mut config = KbConfig::default();
        config.search.default_top_k = 7;
        config.connections.default_top_k = 2;
        config.topics.default_top_n = 3;
        let service = KbService::new(kb, Arc::new(config));

        assert_eq!(service.search_top_k(None), 7);
        assert_eq!(service.connections_top_k(None), 2);
        assert_eq!(service.extract_top_n(None), 3);

        // Explicit values win but stay clamped
        assert_eq!(service.search_top_k(Some(200)), 50);
        assert_eq!(service.search_top_k(Some(0)), 1);
        assert_eq!(service.connections_top_k(Some(30)), 20);
        assert_eq!(service.extract_top_n(Some(4)), 4);
    }
}
