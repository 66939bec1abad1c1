//! Get and delete single insights

use anyhow::{bail, Result};
use colored::Colorize;

use insight_kb::KnowledgeBase;

pub fn get(kb: &KnowledgeBase, insight_id: &str, json: bool) -> Result<()> {
    let Some(insight) = kb.get_insight(insight_id)? else {
        bail!("Insight not found: {}", insight_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&insight)?);
        return Ok(());
    }

    println!("{}", insight.title.bold().cyan());
    println!("{}", "=".repeat(60));
    println!("{} {}", "ID:".dimmed(), insight.id);
    println!("{} {}", "Source:".dimmed(), insight.source_type);
    println!(
        "{} {}",
        "Created:".dimmed(),
        insight.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !insight.topics.is_empty() {
        let topics: Vec<&str> = insight.topics.iter().map(String::as_str).collect();
        println!("{} {}", "Topics:".dimmed(), topics.join(", "));
    }
    for (key, value) in &insight.metadata {
        println!("{} {}", format!("{}:", key).dimmed(), value);
    }
    println!();
    println!("{}", insight.content);

    if !insight.citations.is_empty() {
        println!();
        println!("{}", "Citations".bold());
        for citation in &insight.citations {
            print!("  • {} [{}]", citation.source_title, citation.source_type);
            match citation.source_url {
                Some(ref url) => println!(" {}", url.dimmed()),
                None => println!(),
            }
            if let Some(ref excerpt) = citation.excerpt {
                println!("    \"{}\"", excerpt.dimmed());
            }
        }
    }

    Ok(())
}

pub fn delete(kb: &KnowledgeBase, insight_id: &str, json: bool) -> Result<()> {
    let deleted = kb.delete_insight(insight_id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": insight_id,
                "deleted": deleted,
            }))?
        );
    } else if deleted {
        println!("{} Deleted insight {}", "✓".green(), insight_id.cyan());
    } else {
        println!("{} Insight not found: {}", "!".yellow(), insight_id);
    }

    Ok(())
}
