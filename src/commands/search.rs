//! Search command - semantic search with related insights

use anyhow::Result;
use colored::Colorize;

use insight_kb::{KnowledgeBase, SearchFilters};

use super::{colored_score, truncate};

pub fn run(
    kb: &KnowledgeBase,
    query: &str,
    top_k: usize,
    filters: SearchFilters,
    json: bool,
) -> Result<()> {
    let results = kb.search(query, top_k, Some(&filters))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        query.cyan()
    );
    println!();

    for (i, result) in results.iter().enumerate() {
        let insight = &result.insight;
        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            colored_score(result.similarity_score),
            insight.title.cyan(),
            format!("({})", insight.source_type).dimmed()
        );
        println!("   {}", truncate(&insight.content.replace('\n', " "), 100).dimmed());
        println!("   {} {}", "id:".dimmed(), insight.id);

        if !insight.topics.is_empty() {
            let topics: Vec<&str> = insight.topics.iter().map(String::as_str).collect();
            println!("   {} {}", "topics:".dimmed(), topics.join(", "));
        }
        for related in &result.related_insights {
            println!(
                "   {} [{}] {}",
                "↳".dimmed(),
                colored_score(related.similarity_score),
                related.connected_insight_title
            );
        }
        if !result.suggested_topics.is_empty() {
            println!(
                "   {} {}",
                "explore:".dimmed(),
                result.suggested_topics.join(", ").yellow()
            );
        }
        println!();
    }

    Ok(())
}
