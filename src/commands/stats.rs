use anyhow::Result;
use colored::Colorize;

use insight_kb::KnowledgeBase;

pub fn run(kb: &KnowledgeBase, json: bool) -> Result<()> {
    let stats = kb.get_stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Knowledge Base Stats".bold());
    println!("{}", "=".repeat(60));
    println!("Insights: {}", stats.total_insights.to_string().cyan());
    println!("Unique topics: {}", stats.unique_topics.to_string().cyan());

    if !stats.source_types.is_empty() {
        println!();
        println!("{}", "Source types".bold());
        for (source_type, count) in &stats.source_types {
            println!("  {:<12} {}", source_type, count);
        }
    }

    if !stats.top_topics.is_empty() {
        println!();
        println!("{}", "Top topics".bold());
        for tc in &stats.top_topics {
            println!("  {:<20} {}", tc.topic.green(), tc.count);
        }
    }

    Ok(())
}
