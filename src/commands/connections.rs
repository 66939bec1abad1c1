//! Connections command - insights related to a stored insight

use anyhow::Result;
use colored::Colorize;

use insight_kb::KnowledgeBase;

use super::colored_score;

pub fn run(kb: &KnowledgeBase, insight_id: &str, top_k: usize, json: bool) -> Result<()> {
    let connections = kb.find_connections(insight_id, top_k, true)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&connections)?);
        return Ok(());
    }

    if connections.is_empty() {
        println!("{} No connections for: {}", "→".dimmed(), insight_id.cyan());
        return Ok(());
    }

    println!("{}", "Connections".bold());
    println!("{}", "=".repeat(60));
    for conn in &connections {
        println!(
            "[{}] {} {}",
            colored_score(conn.similarity_score),
            conn.connected_insight_title.cyan(),
            conn.connected_insight_id.dimmed()
        );
        if !conn.shared_topics.is_empty() {
            let shared: Vec<&str> = conn.shared_topics.iter().map(String::as_str).collect();
            println!("   {} {}", "shared:".dimmed(), shared.join(", "));
        }
    }

    Ok(())
}
