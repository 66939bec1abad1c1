mod commands;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use insight_kb::search::cooccurrence::DEFAULT_MAX_SUGGESTIONS;
use insight_kb::{KbConfig, KbPaths, KnowledgeBase, SearchFilters};

/// Log filter override, e.g. `KB_LOG=insight_kb=debug`
const LOG_ENV: &str = "KB_LOG";

#[derive(Parser)]
#[command(name = "kb")]
#[command(about = "Semantic knowledge base for insights", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Data directory (default: $KB_DATA_DIR or ./.insight-kb)")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database and a default config.yaml
    Init,
    /// Store a new insight
    Ingest {
        #[arg(long, short, help = "Insight title")]
        title: Option<String>,
        #[arg(long, short, help = "Insight content", conflicts_with = "file")]
        content: Option<String>,
        #[arg(long, short, help = "Read content from a file ('-' for stdin)")]
        file: Option<PathBuf>,
        #[arg(long, short, help = "thread, article, note or analysis (default: thread)")]
        source_type: Option<String>,
        #[arg(long = "topic", help = "Manual topic (repeatable, comma-separated allowed)")]
        topics: Vec<String>,
        #[arg(long, help = "JSON file with a list of citations")]
        citations: Option<PathBuf>,
        #[arg(long, help = "Metadata as key=value (repeatable)")]
        meta: Vec<String>,
        #[arg(
            long,
            help = "Complete ingest request as JSON file ('-' for stdin)",
            conflicts_with_all = ["title", "content", "file", "source_type", "topics", "citations", "meta"]
        )]
        request: Option<PathBuf>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Semantic search with related insights and topic suggestions
    Search {
        query: String,
        #[arg(long, short = 'k', help = "Number of results (1-50)")]
        top_k: Option<usize>,
        #[arg(long, short, help = "Only this source type")]
        source_type: Option<String>,
        #[arg(long, help = "Only insights with this topic")]
        topic: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Insights related to a stored insight
    Connections {
        id: String,
        #[arg(long, short = 'k', help = "Number of connections (1-20)")]
        top_k: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show a single insight
    Get {
        id: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Delete an insight
    Delete {
        id: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List, extract and suggest topics
    Topics {
        #[command(subcommand)]
        action: TopicsAction,
    },
    /// Knowledge base statistics
    Stats {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server on stdio
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

#[derive(Subcommand)]
enum TopicsAction {
    /// Every topic in the knowledge base
    List {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Extract topics from text without storing it
    Extract {
        text: Option<String>,
        #[arg(long, short, help = "Read text from a file", conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long, short = 'n', help = "Number of topics (1-10)")]
        top_n: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Topics that co-occur with the given ones
    Suggest {
        #[arg(required = true)]
        topics: Vec<String>,
        #[arg(long, short, default_value_t = DEFAULT_MAX_SUGGESTIONS, help = "Maximum suggestions")]
        max: usize,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = KbPaths::resolve(cli.data_dir);

    // Logging depends on the config, so a load failure is reported after init
    let (config, config_error) = match KbConfig::load_or_default(&paths.config) {
        Ok(config) => (config, None),
        Err(e) => (KbConfig::default(), Some(e)),
    };
    init_logging(&config.log_level);
    if let Some(e) = config_error {
        warn!(
            "Failed to load config from {}: {}. Using defaults.",
            paths.config.display(),
            e
        );
    }

    match cli.command {
        #[cfg(feature = "mcp")]
        Commands::Mcp { install: true } => {
            print_mcp_install_instructions(&paths);
            Ok(())
        }
        command => {
            let kb = KnowledgeBase::open(&paths, &config)?;
            dispatch(kb, &paths, &config, command)
        }
    }
}

fn dispatch(
    kb: KnowledgeBase,
    paths: &KbPaths,
    config: &KbConfig,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => init(paths, config),
        Commands::Ingest {
            title,
            content,
            file,
            source_type,
            topics,
            citations,
            meta,
            request,
            json,
        } => commands::ingest::run(
            &kb,
            commands::ingest::IngestArgs {
                title,
                content,
                file,
                source_type,
                topics,
                citations,
                meta,
                request,
            },
            json,
        ),
        Commands::Search {
            query,
            top_k,
            source_type,
            topic,
            json,
        } => {
            let top_k = top_k.unwrap_or(config.search.default_top_k).clamp(1, 50);
            let filters = SearchFilters { source_type, topic };
            commands::search::run(&kb, &query, top_k, filters, json)
        }
        Commands::Connections { id, top_k, json } => {
            let top_k = top_k.unwrap_or(config.connections.default_top_k).clamp(1, 20);
            commands::connections::run(&kb, &id, top_k, json)
        }
        Commands::Get { id, json } => commands::insight::get(&kb, &id, json),
        Commands::Delete { id, json } => commands::insight::delete(&kb, &id, json),
        Commands::Topics { action } => match action {
            TopicsAction::List { json } => commands::topics::list(&kb, json),
            TopicsAction::Extract {
                text,
                file,
                top_n,
                json,
            } => {
                let text = match (text, file) {
                    (Some(text), _) => text,
                    (None, Some(path)) => std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    (None, None) => bail!("Provide text or --file"),
                };
                let top_n = top_n.unwrap_or(config.topics.default_top_n).clamp(1, 10);
                commands::topics::extract(&kb, &text, top_n, json)
            }
            TopicsAction::Suggest { topics, max, json } => {
                commands::topics::suggest(&kb, &topics, max, json)
            }
        },
        Commands::Stats { json } => commands::stats::run(&kb, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { .. } => run_mcp_server(kb, config.clone()),
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to command output and the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn init(paths: &KbPaths, config: &KbConfig) -> anyhow::Result<()> {
    if paths.config.exists() {
        println!(
            "{} Config already exists: {}",
            "→".dimmed(),
            paths.config.display()
        );
    } else {
        config.save(&paths.config)?;
        println!("{} Created {}", "✓".green(), paths.config.display());
    }
    println!(
        "  {} {}",
        "Database:".dimmed(),
        paths.db_path(&config.db_file).display()
    );
    Ok(())
}

#[cfg(feature = "mcp")]
fn run_mcp_server(kb: KnowledgeBase, config: KbConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(insight_kb::mcp::run_mcp_server(std::sync::Arc::new(kb), config))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(paths: &KbPaths) {
    let data_dir = paths.root.to_string_lossy().to_string();
    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "kb".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "insight-kb": {{
      "command": "{}",
      "args": ["mcp", "--data-dir", "{}"]
    }}
  }}
}}"#, binary_path, data_dir);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Store a new insight", "kb_ingest".green());
    println!("  • {} - Semantic search with related insights", "kb_search".green());
    println!("  • {} - Insights related to a given insight", "kb_connections".green());
    println!("  • {} - Get a single insight", "kb_get_insight".green());
    println!("  • {} - Delete an insight", "kb_delete_insight".green());
    println!("  • {} - List all topics", "kb_topics".green());
    println!("  • {} - Extract topics from text", "kb_extract_topics".green());
    println!("  • {} - Suggest co-occurring topics", "kb_suggest_topics".green());
    println!("  • {} - Knowledge base statistics", "kb_stats".green());
}
