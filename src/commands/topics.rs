//! Topic commands: list, extract, suggest

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use insight_kb::KnowledgeBase;

#[derive(Serialize)]
struct TopicsOutput<'a> {
    topics: &'a [String],
}

pub fn list(kb: &KnowledgeBase, json: bool) -> Result<()> {
    let topics = kb.get_all_topics()?;
    print_topics("Topics", &topics, json)
}

pub fn extract(kb: &KnowledgeBase, text: &str, top_n: usize, json: bool) -> Result<()> {
    let topics = kb.extract_topics(text, top_n);
    print_topics("Extracted topics", &topics, json)
}

pub fn suggest(kb: &KnowledgeBase, current: &[String], max: usize, json: bool) -> Result<()> {
    let topics = kb.suggest_related_topics(current, max)?;
    print_topics("Suggested topics", &topics, json)
}

fn print_topics(heading: &str, topics: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&TopicsOutput { topics })?);
        return Ok(());
    }

    if topics.is_empty() {
        println!("{} No topics", "→".dimmed());
        return Ok(());
    }

    println!("{} ({})", heading.bold(), topics.len());
    for topic in topics {
        println!("  • {}", topic.green());
    }
    Ok(())
}
