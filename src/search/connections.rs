//! Connection discovery: nearest neighbors of a stored insight

use std::collections::BTreeSet;

use tracing::debug;

use super::vectordb::VectorIndex;
use crate::core::error::Result;
use crate::core::insight::{ConnectionType, InsightConnection};
use crate::core::record::{title_of, topics_of};

/// Find up to `top_k` insights closest to `insight_id`, nearest first.
///
/// An unknown id yields an empty list, same as an insight with no
/// neighbors. With `exclude_self` the query asks for one extra neighbor since
/// the source normally comes back as its own nearest hit.
pub fn find_connections(
    index: &dyn VectorIndex,
    insight_id: &str,
    top_k: usize,
    exclude_self: bool,
) -> Result<Vec<InsightConnection>> {
    let Some(source) = index.get(insight_id)? else {
        debug!("Insight {} not found, no connections", insight_id);
        return Ok(Vec::new());
    };
    let source_topics = topics_of(&source.metadata);

    let query_k = if exclude_self { top_k + 1 } else { top_k };
    let hits = index.query(&source.embedding, query_k, None)?;
    let metric = index.metric();

    let mut connections = Vec::with_capacity(top_k);
    for hit in hits {
        if connections.len() >= top_k {
            break;
        }
        if exclude_self && hit.id == insight_id {
            continue;
        }

        let shared_topics: BTreeSet<String> = topics_of(&hit.metadata)
            .intersection(&source_topics)
            .cloned()
            .collect();

        connections.push(InsightConnection {
            connected_insight_title: title_of(&hit.metadata),
            connected_insight_id: hit.id,
            similarity_score: metric.similarity(hit.distance),
            shared_topics,
            connection_type: ConnectionType::Semantic,
        });
    }

    Ok(connections)
}
