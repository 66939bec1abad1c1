//! Ingest command - store a new insight

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::Value;

use insight_kb::{Citation, IngestRequest, KnowledgeBase};

pub struct IngestArgs {
    pub title: Option<String>,
    pub content: Option<String>,
    pub file: Option<PathBuf>,
    pub source_type: Option<String>,
    pub topics: Vec<String>,
    pub citations: Option<PathBuf>,
    pub meta: Vec<String>,
    /// Complete JSON request, `-` for stdin
    pub request: Option<PathBuf>,
}

pub fn run(kb: &KnowledgeBase, args: IngestArgs, json: bool) -> Result<()> {
    let request = build_request(args)?;
    let title = request.title.clone();
    let response = kb.ingest(request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{} {}", "✓".green(), response.message);
    println!("  {} {}", "ID:".dimmed(), response.id.cyan());
    println!("  {} {}", "Title:".dimmed(), title);
    if response.extracted_topics.is_empty() {
        println!("  {} {}", "Topics:".dimmed(), "(none extracted)".dimmed());
    } else {
        println!(
            "  {} {}",
            "Topics:".dimmed(),
            response.extracted_topics.join(", ")
        );
    }
    println!("  {} {}", "Citations:".dimmed(), response.citation_count);

    Ok(())
}

fn build_request(args: IngestArgs) -> Result<IngestRequest> {
    if let Some(ref path) = args.request {
        let raw = read_input(path)?;
        return serde_json::from_str(&raw).context("Invalid ingest request JSON");
    }

    let Some(title) = args.title else {
        bail!("--title is required unless --request is given");
    };
    let content = match (args.content, args.file) {
        (Some(content), _) => content,
        (None, Some(path)) => read_input(&path)?,
        (None, None) => bail!("Provide insight content with --content or --file"),
    };

    let citations: Vec<Citation> = match args.citations {
        Some(ref path) => {
            serde_json::from_str(&read_input(path)?).context("Invalid citations JSON")?
        }
        None => Vec::new(),
    };

    let mut metadata = serde_json::Map::new();
    for pair in &args.meta {
        let (key, value) = parse_meta(pair)?;
        metadata.insert(key, value);
    }

    let mut request = IngestRequest::new(title, content)
        .topics(args.topics)
        .citations(citations)
        .metadata(metadata);
    if let Some(source_type) = args.source_type {
        request = request.source_type(source_type);
    }
    Ok(request)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// `key=value`; numbers and booleans keep their type
fn parse_meta(pair: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("Metadata must be key=value, got '{}'", pair);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Metadata key is empty in '{}'", pair);
    }

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}
